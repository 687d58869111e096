//! Conversions between discrete crowd levels and occupancy fractions.

/// Lowest valid crowd level ("not busy").
pub const MIN_LEVEL: u8 = 1;
/// Highest valid crowd level ("packed").
pub const MAX_LEVEL: u8 = 4;

/// Maps a crowd level to its canonical occupancy fraction.
///
/// | Level | Fraction |
/// |-------|----------|
/// | 1     | 0.15     |
/// | 2     | 0.35     |
/// | 3     | 0.65     |
/// | 4     | 0.90     |
///
/// Out-of-range levels resolve to the nearest valid level.
pub fn level_to_fraction(level: i64) -> f64 {
    match level.clamp(MIN_LEVEL as i64, MAX_LEVEL as i64) {
        1 => 0.15,
        2 => 0.35,
        3 => 0.65,
        _ => 0.90,
    }
}

/// Maps an occupancy fraction back onto a crowd level.
///
/// | Range        | Level |
/// |--------------|-------|
/// | < 0.25       | 1     |
/// | < 0.50       | 2     |
/// | < 0.75       | 3     |
/// | >= 0.75      | 4     |
pub fn fraction_to_level(mu: f64) -> u8 {
    match mu {
        mu if mu < 0.25 => 1,
        mu if mu < 0.5 => 2,
        mu if mu < 0.75 => 3,
        _ => 4,
    }
}

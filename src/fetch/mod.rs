//! Minimal HTTP plumbing for remote report stores.

mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;

/// Issues a GET for `url` through `client` and decodes the JSON body.
///
/// # Errors
///
/// Returns an error on transport failure, a non-success status, or a body
/// that does not decode as `T`.
pub async fn fetch_json<C, T>(client: &C, url: reqwest::Url) -> Result<T>
where
    C: HttpClient + ?Sized,
    T: DeserializeOwned,
{
    let mut req = reqwest::Request::new(reqwest::Method::GET, url);
    req.headers_mut().insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("store returned status {}: {}", status, body));
    }

    Ok(resp.json().await?)
}

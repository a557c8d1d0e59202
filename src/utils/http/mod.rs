use anyhow::{Context, Result, bail};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Largest JSON document accepted from a content source (8 MB).
pub const MAX_JSON_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Build a `reqwest::Client` with a 10 s connect timeout and the given overall timeout.
///
/// Falls back to the default client if the builder fails.
pub fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Read a response body with a size cap, rejecting oversized bodies.
///
/// Checks `Content-Length` first, then counts streamed chunks.
pub async fn limited_body(resp: Response, max_bytes: usize) -> Result<Vec<u8>> {
    if let Some(cl) = resp.content_length()
        && cl as usize > max_bytes
    {
        bail!(
            "response body too large: Content-Length {} exceeds limit {}",
            cl,
            max_bytes
        );
    }

    let mut buf = Vec::new();
    let mut stream = resp;
    while let Some(chunk) = stream.chunk().await? {
        if buf.len() + chunk.len() > max_bytes {
            bail!("response body exceeds limit {}", max_bytes);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Check the status, then decode a size-capped JSON body.
pub async fn read_json<T: DeserializeOwned>(resp: Response, max_bytes: usize) -> Result<T> {
    let status = resp.status();
    let url = resp.url().clone();
    if !status.is_success() {
        bail!("GET {} returned HTTP {}", url, status);
    }
    let bytes = limited_body(resp, max_bytes).await?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to decode JSON from {}", url))
}

#[cfg(test)]
mod tests;

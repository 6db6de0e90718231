use super::utils::truncate;
use crate::error::{Error, Result};
use log::warn;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::{future::Future, time::Duration};

/// Fixed-delay retry: no backoff, no jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Runs `op` until it succeeds or `policy.attempts` is exhausted, returning the last error.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    "{label} failed (attempt {attempt}/{attempts}): {}",
                    truncate(&e.to_string(), 120)
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Turns a non-2xx response into [`Error::Status`], keeping the body for inspection.
pub async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Status { status, body })
}

pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = ensure_success(response).await?.text().await?;
    Ok(serde_json::from_str(&body)?)
}

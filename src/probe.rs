//! Health probing: one bounded-time `GET {base}/health` per candidate.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::HEALTH_PATH;
use crate::error::Result;
use crate::url::BaseUrl;

/// Answers "is this candidate a live backend right now?".
///
/// Implementations never fail: DNS and connect errors, timeouts, non-2xx statuses
/// and unexpected bodies are all `false`. No retries inside a single call.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, candidate: &BaseUrl, timeout: Duration) -> bool;
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(default)]
    ok: bool,
}

/// Probes over HTTP with a shared connection pool.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self> {
        // LAN hosts must be reached directly, never through a system proxy.
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(HttpProbe { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        HttpProbe { client }
    }

    async fn check(&self, url: &str) -> std::result::Result<bool, reqwest::Error> {
        let r = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        if !r.status().is_success() {
            log::debug!("{} answered {}", url, r.status());
            return Ok(false);
        }
        match r.json::<HealthResponse>().await {
            Ok(body) => Ok(body.ok),
            Err(e) => {
                log::debug!("{} sent an unexpected health body: {}", url, e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, candidate: &BaseUrl, timeout: Duration) -> bool {
        let url = candidate.join(HEALTH_PATH);
        // The deadline covers connect, headers and body. On expiry the request
        // future is dropped, which tears down its connection.
        match tokio::time::timeout(timeout, self.check(&url)).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                log::debug!("{} unreachable: {}", url, e);
                false
            }
            Err(_) => {
                log::debug!("{} timed out after {:?}", url, timeout);
                false
            }
        }
    }
}

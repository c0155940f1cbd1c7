//! HTTP client for the DrinkMaster backend. Every request path is resolved against
//! the discovered base URL; when the backend cannot be reached, discovery is
//! forced once and the request retried against the new URL.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::discovery::Discovery;
use crate::error::{DiscoveryError, Result};

#[derive(Clone)]
pub struct ApiClient {
    discovery: Arc<Discovery>,
    http: reqwest::Client,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(discovery: Arc<Discovery>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(ApiClient::with_client(discovery, http))
    }

    pub fn with_client(discovery: Arc<Discovery>, http: reqwest::Client) -> Self {
        ApiClient {
            discovery,
            http,
            access_token: None,
        }
    }

    pub fn set_access_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    pub fn discovery(&self) -> &Arc<Discovery> {
        &self.discovery
    }

    fn headers(&self) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(t) = &self.access_token {
            match HeaderValue::from_str(&format!("Bearer {}", t)) {
                Ok(v) => {
                    h.insert(AUTHORIZATION, v);
                }
                Err(_) => log::warn!("Access token contains invalid header characters, sending without it"),
            }
        }
        h
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let r = self.send(Method::GET, path, |req| req).await?;
        Ok(r.json().await?)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let r = self.send(Method::POST, path, |req| req.json(body)).await?;
        Ok(r.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, |req| req).await?;
        Ok(())
    }

    /// Sends one request, rediscovering and retrying once if the host is gone.
    async fn send<F>(&self, method: Method, path: &str, with_body: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        self.discovery.ensure_base_url(false).await?;
        let request = |url: String| with_body(self.http.request(method.clone(), url).headers(self.headers()));

        let r = match request(self.discovery.build_url(path)).send().await {
            Ok(r) => r,
            Err(e) if e.is_connect() || e.is_timeout() => {
                log::warn!("Backend unreachable ({}), rediscovering", e);
                self.discovery.ensure_base_url(true).await?;
                request(self.discovery.build_url(path)).send().await?
            }
            Err(e) => return Err(e.into()),
        };
        check_status(r).await
    }
}

async fn check_status(r: Response) -> Result<Response> {
    if r.status().is_success() {
        return Ok(r);
    }
    let status = r.status().as_u16();
    let body = r.text().await.unwrap_or_default();
    Err(DiscoveryError::Status {
        status,
        body: body.trim().to_string(),
    })
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, blocking};
use tracing::trace;

use super::{AsyncHttpExecutor, HttpExecutor, HttpRequest, RawResponse};
use crate::config::PoolLimits;
use crate::error::TransportError;

fn join_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// `reqwest`-backed executor for the async client
#[derive(Debug, Clone)]
pub struct ReqwestExecutor {
    base_url: String,
    client: Client,
}

impl ReqwestExecutor {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        pool: PoolLimits,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .build()?;

        Ok(Self::from_client(base_url, client))
    }

    pub fn from_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl AsyncHttpExecutor for ReqwestExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let url = join_url(&self.base_url, &request.path);
        trace!(method = %request.method, %url, "sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// `reqwest::blocking`-backed executor for the blocking client.
///
/// Must not be created or dropped from inside an async runtime.
#[derive(Debug, Clone)]
pub struct BlockingReqwestExecutor {
    base_url: String,
    client: blocking::Client,
}

impl BlockingReqwestExecutor {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        pool: PoolLimits,
    ) -> Result<Self, TransportError> {
        let client = blocking::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool.max_idle_per_host)
            .pool_idle_timeout(pool.idle_timeout)
            .build()?;

        Ok(Self::from_client(base_url, client))
    }

    pub fn from_client(base_url: impl Into<String>, client: blocking::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl HttpExecutor for BlockingReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let url = join_url(&self.base_url, &request.path);
        trace!(method = %request.method, %url, "sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

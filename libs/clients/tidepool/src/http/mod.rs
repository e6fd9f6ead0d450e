mod reqwest_executor;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;

use crate::error::TransportError;

pub use reqwest_executor::{BlockingReqwestExecutor, ReqwestExecutor};

/// One HTTP exchange, relative to an executor's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Status, headers and raw body of a reply
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string().into_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking HTTP transport bound to one service.
///
/// Implementations must be safe to share between threads; the client issues
/// concurrent calls through the same executor.
#[cfg_attr(test, mockall::automock)]
pub trait HttpExecutor: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

/// Non-blocking HTTP transport bound to one service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AsyncHttpExecutor: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

//! Tidepool Client Library
//!
//! Typed clients for a Tidepool vector database deployment, which exposes a
//! query service (search, namespace metadata) and an ingest service (upsert,
//! delete, compaction, pipeline status).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌───────────────────────┐
//! │  TidepoolClient  │   │  AsyncTidepoolClient  │  ← public operations
//! └────────┬─────────┘   └───────────┬───────────┘
//!          │                         │
//! ┌────────▼─────────────────────────▼──────────┐
//! │ operations / validation / parsing / retry   │  ← shared, transport-free
//! └────────┬─────────────────────────┬──────────┘
//!          │                         │
//! ┌────────▼─────────┐   ┌───────────▼───────────┐
//! │   HttpExecutor   │   │   AsyncHttpExecutor   │  ← transport seam
//! │ (reqwest blocking)│  │      (reqwest)        │
//! └──────────────────┘   └───────────────────────┘
//! ```
//!
//! Both clients validate input before any network traffic, retry transport
//! failures and HTTP 503 with exponential backoff, and map error replies to
//! [`TidepoolError`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use tidepool_client::{AsyncTidepoolClient, ClientConfig, Document, QueryRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AsyncTidepoolClient::new(ClientConfig::from_env()?)?;
//!
//! client
//!     .upsert(&[Document::new("doc-1", vec![0.1, 0.2, 0.3])], Some("docs"))
//!     .await?;
//!
//! let response = client
//!     .query(QueryRequest::vector(vec![0.1, 0.2, 0.3]).with_namespace("docs").with_top_k(5))
//!     .await?;
//! for result in response.results {
//!     println!("{} {}", result.id, result.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod models;
mod operations;
pub mod parsing;
pub mod retry;
#[cfg(test)]
mod testing;
pub mod validation;

// Re-export commonly used types
pub use client::{AsyncTidepoolClient, TidepoolClient};
pub use config::{ClientConfig, ConfigError, PoolLimits, RetryPolicy};
pub use error::{TidepoolError, TidepoolResult, TransportError};
pub use http::{
    AsyncHttpExecutor, BlockingReqwestExecutor, HttpExecutor, HttpRequest, RawResponse,
    ReqwestExecutor,
};
pub use models::{
    Attributes, AttrValue, DistanceMetric, Document, EnumArg, FusionMode, IngestStatus,
    NamespaceInfo, NamespaceStatus, QueryMode, QueryRequest, QueryResponse, Service, Vector,
    VectorResult,
};
pub use retry::{Sleeper, ThreadSleeper};

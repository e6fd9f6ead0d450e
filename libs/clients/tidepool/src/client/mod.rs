mod async_client;
mod blocking;

pub use async_client::AsyncTidepoolClient;
pub use blocking::TidepoolClient;

use crate::error::{TidepoolError, TransportError};

pub(crate) const CLIENT_CLOSED: &str = "client is closed";

fn executor_error(err: TransportError) -> TidepoolError {
    TidepoolError::service(format!("failed to build HTTP client: {}", err))
}

//! Scripted transport shared by the client integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tidepool_client::{
    AsyncHttpExecutor, HttpExecutor, HttpRequest, RawResponse, Sleeper, TransportError,
};

type Reply = Result<RawResponse, TransportError>;

#[derive(Default)]
struct Script {
    replies: VecDeque<Reply>,
    requests: Vec<HttpRequest>,
}

/// Replays queued replies in order and records every request it sees.
///
/// Clones share the same script, so a test keeps one handle while the client
/// owns another.
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    script: Arc<Mutex<Script>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(RawResponse::json(status, &body)))
    }

    pub fn reply_raw(&self, status: u16, body: &str) -> &Self {
        self.push(Ok(RawResponse::new(status, body.as_bytes().to_vec())))
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.push(Err(TransportError::new(message)))
    }

    fn push(&self, reply: Reply) -> &Self {
        self.script.lock().unwrap().replies.push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests().pop().expect("no request was sent")
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().requests.len()
    }

    fn next(&self, request: &HttpRequest) -> Reply {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request to {}", request.path))
    }
}

impl HttpExecutor for ScriptedExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        self.next(request)
    }
}

#[async_trait]
impl AsyncHttpExecutor for ScriptedExecutor {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        self.next(request)
    }
}

/// Records backoff delays instead of sleeping
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn body(request: &HttpRequest) -> Value {
    request.body.clone().unwrap_or(Value::Null)
}

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::instrument;

use super::{CLIENT_CLOSED, executor_error};
use crate::config::{ClientConfig, DEFAULT_NAMESPACE, RetryPolicy};
use crate::error::{TidepoolError, TidepoolResult};
use crate::http::{AsyncHttpExecutor, ReqwestExecutor};
use crate::models::{
    DistanceMetric, Document, EnumArg, IngestStatus, NamespaceInfo, NamespaceStatus,
    QueryRequest, QueryResponse, Service,
};
use crate::operations::{Call, expect_object};
use crate::parsing::{
    parse_health, parse_ingest_status, parse_namespace_info, parse_namespace_status,
    parse_namespaces, parse_query_response,
};
use crate::retry::{decode_response, send_async};
use crate::validation::{normalize_namespace, normalize_service};

/// Async Tidepool client.
///
/// Mirrors [`TidepoolClient`](super::TidepoolClient) call for call. Backoff
/// yields to the runtime, and dropping a pending call abandons it.
pub struct AsyncTidepoolClient<E = ReqwestExecutor> {
    query: Option<E>,
    ingest: Option<E>,
    default_namespace: String,
    timeout: Duration,
    retry: RetryPolicy,
    call_deadline: Option<Duration>,
}

impl AsyncTidepoolClient<ReqwestExecutor> {
    pub fn new(config: ClientConfig) -> TidepoolResult<Self> {
        let query = ReqwestExecutor::new(&config.query_url, config.timeout, config.pool)
            .map_err(executor_error)?;
        let ingest = ReqwestExecutor::new(&config.ingest_url, config.timeout, config.pool)
            .map_err(executor_error)?;
        Self::with_executors(config, query, ingest)
    }
}

impl<E: AsyncHttpExecutor> AsyncTidepoolClient<E> {
    pub fn with_executors(config: ClientConfig, query: E, ingest: E) -> TidepoolResult<Self> {
        let default_namespace =
            normalize_namespace(Some(&config.default_namespace), DEFAULT_NAMESPACE)?;

        Ok(Self {
            query: Some(query),
            ingest: Some(ingest),
            default_namespace,
            timeout: config.timeout,
            retry: config.retry,
            call_deadline: config.call_deadline,
        })
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn retry_policy_mut(&mut self) -> &mut RetryPolicy {
        &mut self.retry
    }

    /// Release both executors. Safe to call more than once.
    pub fn close(&mut self) {
        self.query.take();
        self.ingest.take();
    }

    pub fn is_closed(&self) -> bool {
        self.query.is_none() && self.ingest.is_none()
    }

    fn executor(&self, service: Service) -> TidepoolResult<&E> {
        let executor = match service {
            Service::Query => self.query.as_ref(),
            Service::Ingest => self.ingest.as_ref(),
        };
        executor.ok_or_else(|| TidepoolError::service(CLIENT_CLOSED))
    }

    async fn request_json(&self, call: Call) -> TidepoolResult<Option<Value>> {
        let executor = self.executor(call.service)?;
        let request = call.into_request(self.timeout);
        let response = send_async(executor, &request, &self.retry, self.call_deadline).await?;
        decode_response(&response)
    }

    #[instrument(skip_all)]
    pub async fn health(
        &self,
        service: impl Into<EnumArg<Service>>,
    ) -> TidepoolResult<Map<String, Value>> {
        let service = normalize_service(service.into())?;
        let data = self.request_json(Call::health(service)).await?;
        parse_health(&data.unwrap_or(Value::Null))
    }

    pub async fn upsert(
        &self,
        documents: &[Document],
        namespace: Option<&str>,
    ) -> TidepoolResult<()> {
        self.upsert_with_metric(documents, namespace, Some(DistanceMetric::Cosine.into()))
            .await
    }

    #[instrument(skip(self, documents, distance_metric), fields(count = documents.len()))]
    pub async fn upsert_with_metric(
        &self,
        documents: &[Document],
        namespace: Option<&str>,
        distance_metric: Option<EnumArg<DistanceMetric>>,
    ) -> TidepoolResult<()> {
        let call = Call::upsert(documents, namespace, distance_metric, &self.default_namespace)?;
        self.request_json(call).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(namespace = ?request.namespace, top_k = request.top_k))]
    pub async fn query(&self, request: QueryRequest) -> TidepoolResult<QueryResponse> {
        let (call, namespace) = Call::query(request, &self.default_namespace)?;
        let data = self.request_json(call).await?;
        parse_query_response(&data.unwrap_or(Value::Null), &namespace)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete<S: AsRef<str> + Sync>(
        &self,
        ids: &[S],
        namespace: Option<&str>,
    ) -> TidepoolResult<()> {
        let call = Call::delete(ids, namespace, &self.default_namespace)?;
        self.request_json(call).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_namespace(&self, namespace: Option<&str>) -> TidepoolResult<NamespaceInfo> {
        let (call, namespace) = Call::get_namespace(namespace, &self.default_namespace)?;
        let data = self.request_json(call).await?;
        parse_namespace_info(&expect_object(data, "namespace")?, &namespace)
    }

    #[instrument(skip(self))]
    pub async fn get_namespace_status(
        &self,
        namespace: Option<&str>,
    ) -> TidepoolResult<NamespaceStatus> {
        let call = Call::get_namespace_status(namespace, &self.default_namespace)?;
        let data = self.request_json(call).await?;
        parse_namespace_status(&expect_object(data, "namespace status")?)
    }

    #[instrument(skip(self))]
    pub async fn list_namespaces(&self) -> TidepoolResult<Vec<NamespaceInfo>> {
        let data = self.request_json(Call::list_namespaces()).await?;
        parse_namespaces(&data.unwrap_or(Value::Null))
    }

    #[instrument(skip(self))]
    pub async fn status(&self) -> TidepoolResult<IngestStatus> {
        let data = self.request_json(Call::status()).await?;
        parse_ingest_status(&expect_object(data, "status")?)
    }

    #[instrument(skip(self))]
    pub async fn compact(&self, namespace: Option<&str>) -> TidepoolResult<()> {
        let call = Call::compact(namespace, &self.default_namespace)?;
        self.request_json(call).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::http::{MockAsyncHttpExecutor, RawResponse};

    fn client(
        query: MockAsyncHttpExecutor,
        ingest: MockAsyncHttpExecutor,
    ) -> AsyncTidepoolClient<MockAsyncHttpExecutor> {
        AsyncTidepoolClient::with_executors(ClientConfig::default(), query, ingest).unwrap()
    }

    #[tokio::test]
    async fn test_text_query_omits_vector() {
        let mut query = MockAsyncHttpExecutor::new();
        query
            .expect_execute()
            .withf(|req| {
                let body = req.body.clone().unwrap_or(Value::Null);
                req.path == "/v1/vectors/docs"
                    && body["mode"] == "text"
                    && body["text"] == "hello"
                    && body.get("vector").is_none()
            })
            .times(1)
            .returning(|_| {
                Ok(RawResponse::json(
                    200,
                    &json!({"namespace": "docs", "vectors": [{"id": 7, "dist": 0.25}]}),
                ))
            });

        let response = client(query, MockAsyncHttpExecutor::new())
            .query(QueryRequest::text("hello").with_namespace("docs"))
            .await
            .unwrap();

        assert_eq!(response.namespace, "docs");
        assert_eq!(response.results[0].id, "7");
        assert_eq!(response.results[0].score, 0.25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_on_503_with_backoff() {
        let calls = AtomicU32::new(0);
        let mut ingest = MockAsyncHttpExecutor::new();
        ingest.expect_execute().times(3).returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(RawResponse::json(503, &json!({"error": "busy"})))
            } else {
                Ok(RawResponse::json(200, &json!({"total_vecs": 12, "segments": 2})))
            }
        });

        let started = tokio::time::Instant::now();
        let status = client(MockAsyncHttpExecutor::new(), ingest)
            .status()
            .await
            .unwrap();

        assert_eq!(status.total_vecs, 12);
        assert_eq!(status.segments, 2);
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let mut query = MockAsyncHttpExecutor::new();
        query
            .expect_execute()
            .times(1)
            .returning(|_| Ok(RawResponse::json(404, &json!({"message": "no such namespace"}))));

        let err = client(query, MockAsyncHttpExecutor::new())
            .get_namespace(Some("ghost"))
            .await
            .unwrap_err();

        assert!(matches!(err, TidepoolError::NotFound { .. }));
        assert_eq!(err.message(), "no such namespace");
    }

    #[tokio::test]
    async fn test_namespace_status_requires_object() {
        let mut ingest = MockAsyncHttpExecutor::new();
        ingest
            .expect_execute()
            .withf(|req| req.path == "/v1/namespaces/default/status")
            .returning(|_| Ok(RawResponse::json(200, &json!([1, 2, 3]))));

        let err = client(MockAsyncHttpExecutor::new(), ingest)
            .get_namespace_status(None)
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Invalid namespace status response");
    }

    #[tokio::test]
    async fn test_delete_routes_to_ingest() {
        let mut ingest = MockAsyncHttpExecutor::new();
        ingest
            .expect_execute()
            .withf(|req| {
                req.method == reqwest::Method::DELETE
                    && req.body == Some(json!({"ids": ["a", "b"]}))
            })
            .times(1)
            .returning(|_| Ok(RawResponse::empty(204)));

        client(MockAsyncHttpExecutor::new(), ingest)
            .delete(&["a", "b"], None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_rejects_later_calls() {
        let mut client = client(MockAsyncHttpExecutor::new(), MockAsyncHttpExecutor::new());
        client.close();
        client.close();

        let err = client.compact(None).await.unwrap_err();
        assert!(matches!(err, TidepoolError::Service { .. }));
        assert_eq!(err.message(), "client is closed");
    }
}

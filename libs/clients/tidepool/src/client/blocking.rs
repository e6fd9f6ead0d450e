use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::instrument;

use super::{CLIENT_CLOSED, executor_error};
use crate::config::{ClientConfig, DEFAULT_NAMESPACE, RetryPolicy};
use crate::error::{TidepoolError, TidepoolResult};
use crate::http::{BlockingReqwestExecutor, HttpExecutor};
use crate::models::{
    DistanceMetric, Document, EnumArg, IngestStatus, NamespaceInfo, NamespaceStatus,
    QueryRequest, QueryResponse, Service,
};
use crate::operations::{Call, expect_object};
use crate::parsing::{
    parse_health, parse_ingest_status, parse_namespace_info, parse_namespace_status,
    parse_namespaces, parse_query_response,
};
use crate::retry::{Sleeper, ThreadSleeper, decode_response, send_blocking};
use crate::validation::{normalize_namespace, normalize_service};

/// Blocking Tidepool client.
///
/// Every call runs to completion on the calling thread, including backoff
/// between retries. The client is `Sync`; share it behind an `Arc` to issue
/// calls from several threads at once.
pub struct TidepoolClient<E = BlockingReqwestExecutor> {
    query: Option<E>,
    ingest: Option<E>,
    default_namespace: String,
    timeout: Duration,
    retry: RetryPolicy,
    call_deadline: Option<Duration>,
    sleeper: Arc<dyn Sleeper>,
}

impl TidepoolClient<BlockingReqwestExecutor> {
    /// Connect to the query and ingest services named in `config`
    pub fn new(config: ClientConfig) -> TidepoolResult<Self> {
        let query = BlockingReqwestExecutor::new(&config.query_url, config.timeout, config.pool)
            .map_err(executor_error)?;
        let ingest = BlockingReqwestExecutor::new(&config.ingest_url, config.timeout, config.pool)
            .map_err(executor_error)?;
        Self::with_executors(config, query, ingest)
    }
}

impl<E: HttpExecutor> TidepoolClient<E> {
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
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    /// Replace how the client waits between retries
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
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

    fn request_json(&self, call: Call) -> TidepoolResult<Option<Value>> {
        let executor = self.executor(call.service)?;
        let request = call.into_request(self.timeout);
        let response = send_blocking(
            executor,
            &request,
            &self.retry,
            self.sleeper.as_ref(),
            self.call_deadline,
        )?;
        decode_response(&response)
    }

    /// Check a service's health; a reported status other than `healthy` fails.
    #[instrument(skip_all)]
    pub fn health(&self, service: impl Into<EnumArg<Service>>) -> TidepoolResult<Map<String, Value>> {
        let service = normalize_service(service.into())?;
        let data = self.request_json(Call::health(service))?;
        parse_health(&data.unwrap_or(Value::Null))
    }

    /// Upsert documents using the cosine distance metric
    pub fn upsert(&self, documents: &[Document], namespace: Option<&str>) -> TidepoolResult<()> {
        self.upsert_with_metric(documents, namespace, Some(DistanceMetric::Cosine.into()))
    }

    #[instrument(skip(self, documents, distance_metric), fields(count = documents.len()))]
    pub fn upsert_with_metric(
        &self,
        documents: &[Document],
        namespace: Option<&str>,
        distance_metric: Option<EnumArg<DistanceMetric>>,
    ) -> TidepoolResult<()> {
        let call = Call::upsert(documents, namespace, distance_metric, &self.default_namespace)?;
        self.request_json(call)?;
        Ok(())
    }

    #[instrument(skip_all, fields(namespace = ?request.namespace, top_k = request.top_k))]
    pub fn query(&self, request: QueryRequest) -> TidepoolResult<QueryResponse> {
        let (call, namespace) = Call::query(request, &self.default_namespace)?;
        let data = self.request_json(call)?;
        parse_query_response(&data.unwrap_or(Value::Null), &namespace)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn delete<S: AsRef<str>>(&self, ids: &[S], namespace: Option<&str>) -> TidepoolResult<()> {
        let call = Call::delete(ids, namespace, &self.default_namespace)?;
        self.request_json(call)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get_namespace(&self, namespace: Option<&str>) -> TidepoolResult<NamespaceInfo> {
        let (call, namespace) = Call::get_namespace(namespace, &self.default_namespace)?;
        let data = self.request_json(call)?;
        parse_namespace_info(&expect_object(data, "namespace")?, &namespace)
    }

    #[instrument(skip(self))]
    pub fn get_namespace_status(&self, namespace: Option<&str>) -> TidepoolResult<NamespaceStatus> {
        let call = Call::get_namespace_status(namespace, &self.default_namespace)?;
        let data = self.request_json(call)?;
        parse_namespace_status(&expect_object(data, "namespace status")?)
    }

    #[instrument(skip(self))]
    pub fn list_namespaces(&self) -> TidepoolResult<Vec<NamespaceInfo>> {
        let data = self.request_json(Call::list_namespaces())?;
        parse_namespaces(&data.unwrap_or(Value::Null))
    }

    /// Ingest pipeline status across all namespaces
    #[instrument(skip(self))]
    pub fn status(&self) -> TidepoolResult<IngestStatus> {
        let data = self.request_json(Call::status())?;
        parse_ingest_status(&expect_object(data, "status")?)
    }

    #[instrument(skip(self))]
    pub fn compact(&self, namespace: Option<&str>) -> TidepoolResult<()> {
        let call = Call::compact(namespace, &self.default_namespace)?;
        self.request_json(call)?;
        Ok(())
    }
}

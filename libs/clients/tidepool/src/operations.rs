//! Request construction shared by the blocking and async clients.
//!
//! Each public operation validates its input and resolves its namespace here,
//! producing a [`Call`] that either client can dispatch.

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{TidepoolError, TidepoolResult};
use crate::http::HttpRequest;
use crate::models::{
    Attributes, DistanceMetric, Document, EnumArg, QueryRequest, Service, Vector,
};
use crate::validation::{
    check_query_inputs, normalize_alpha, normalize_distance_metric, normalize_fusion_mode,
    normalize_namespace, normalize_query_mode, normalize_query_text, validate_documents,
    validate_filters, validate_ids, validate_positive_int, validate_top_k, validate_vector,
};

#[derive(Debug, Serialize)]
struct UpsertPayload {
    vectors: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_metric: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct QueryPayload {
    top_k: u64,
    include_vectors: bool,
    mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<Vector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_metric: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ef_search: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nprobe: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fusion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rrf_k: Option<u64>,
}

#[derive(Debug, Serialize)]
struct DeletePayload {
    ids: Vec<String>,
}

/// A validated request, addressed to one of the two services
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Call {
    pub service: Service,
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

/// Namespaces are percent-encoded as one path segment, so `/` is sent as `%2F`.
fn vectors_path(namespace: &str) -> String {
    format!("/v1/vectors/{}", urlencoding::encode(namespace))
}

fn namespace_path(namespace: &str) -> String {
    format!("/v1/namespaces/{}", urlencoding::encode(namespace))
}

impl Call {
    fn new(service: Service, method: Method, path: String) -> Self {
        Self {
            service,
            method,
            path,
            body: None,
        }
    }

    fn with_body(mut self, body: impl Serialize) -> TidepoolResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn health(service: Service) -> Self {
        Self::new(service, Method::GET, "/health".to_string())
    }

    pub fn upsert(
        documents: &[Document],
        namespace: Option<&str>,
        distance_metric: Option<EnumArg<DistanceMetric>>,
        default_namespace: &str,
    ) -> TidepoolResult<Self> {
        let documents = validate_documents(documents)?;
        let metric = normalize_distance_metric(distance_metric)?;
        let namespace = normalize_namespace(namespace, default_namespace)?;

        let payload = UpsertPayload {
            vectors: documents.iter().map(Document::to_payload).collect(),
            distance_metric: metric.map(|m| m.as_str()),
        };

        Self::new(Service::Ingest, Method::POST, vectors_path(&namespace)).with_body(payload)
    }

    /// Returns the call and the namespace it targets.
    pub fn query(request: QueryRequest, default_namespace: &str) -> TidepoolResult<(Self, String)> {
        let top_k = validate_top_k(request.top_k)?;
        validate_filters(request.filters.as_ref())?;
        let ef_search = validate_positive_int(request.ef_search, "ef_search")?;
        let nprobe = validate_positive_int(request.nprobe, "nprobe")?;
        let rrf_k = validate_positive_int(request.rrf_k, "rrf_k")?;
        let metric = normalize_distance_metric(request.distance_metric)?;

        let text = normalize_query_text(request.text.as_deref());
        let vector = request
            .vector
            .as_deref()
            .map(|v| validate_vector(v, None))
            .transpose()?;
        let (has_vector, has_text) = (vector.is_some(), text.is_some());

        let mode = normalize_query_mode(request.mode, has_vector, has_text)?;
        check_query_inputs(mode, has_vector, has_text)?;
        let fusion = normalize_fusion_mode(request.fusion)?;
        let alpha = normalize_alpha(request.alpha)?;

        let namespace = normalize_namespace(request.namespace.as_deref(), default_namespace)?;

        let payload = QueryPayload {
            top_k,
            include_vectors: request.include_vectors,
            mode: mode.as_str(),
            vector,
            text,
            distance_metric: metric.map(|m| m.as_str()),
            filters: request.filters,
            ef_search,
            nprobe,
            alpha,
            fusion: fusion.map(|f| f.as_str()),
            rrf_k,
        };

        let call =
            Self::new(Service::Query, Method::POST, vectors_path(&namespace)).with_body(payload)?;
        Ok((call, namespace))
    }

    pub fn delete<S: AsRef<str>>(
        ids: &[S],
        namespace: Option<&str>,
        default_namespace: &str,
    ) -> TidepoolResult<Self> {
        let ids = validate_ids(ids)?;
        let namespace = normalize_namespace(namespace, default_namespace)?;

        Self::new(Service::Ingest, Method::DELETE, vectors_path(&namespace))
            .with_body(DeletePayload { ids })
    }

    /// Returns the call and the namespace it targets.
    pub fn get_namespace(
        namespace: Option<&str>,
        default_namespace: &str,
    ) -> TidepoolResult<(Self, String)> {
        let namespace = normalize_namespace(namespace, default_namespace)?;
        let call = Self::new(Service::Query, Method::GET, namespace_path(&namespace));
        Ok((call, namespace))
    }

    pub fn get_namespace_status(
        namespace: Option<&str>,
        default_namespace: &str,
    ) -> TidepoolResult<Self> {
        let namespace = normalize_namespace(namespace, default_namespace)?;
        Ok(Self::new(
            Service::Ingest,
            Method::GET,
            format!("{}/status", namespace_path(&namespace)),
        ))
    }

    pub fn list_namespaces() -> Self {
        Self::new(Service::Query, Method::GET, "/v1/namespaces".to_string())
    }

    pub fn status() -> Self {
        Self::new(Service::Ingest, Method::GET, "/status".to_string())
    }

    pub fn compact(namespace: Option<&str>, default_namespace: &str) -> TidepoolResult<Self> {
        let namespace = normalize_namespace(namespace, default_namespace)?;
        Ok(Self::new(
            Service::Ingest,
            Method::POST,
            format!("{}/compact", namespace_path(&namespace)),
        ))
    }

    pub fn into_request(self, timeout: Duration) -> HttpRequest {
        HttpRequest {
            method: self.method,
            path: self.path,
            body: self.body,
            timeout,
        }
    }
}

/// Require a JSON object reply, naming `what` in the error otherwise
pub(crate) fn expect_object(data: Option<Value>, what: &str) -> TidepoolResult<Map<String, Value>> {
    match data {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(TidepoolError::service(format!("Invalid {} response", what))),
    }
}

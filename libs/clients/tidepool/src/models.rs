use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString, IntoStaticStr};

/// Embedding values, in dimension order.
pub type Vector = Vec<f32>;

/// String-keyed attribute map attached to documents and used as query filters.
pub type Attributes = BTreeMap<String, AttrValue>;

/// Attribute value accepted by the service.
///
/// Recursive: lists and maps nest further attribute values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttrValue>),
    Map(BTreeMap<String, AttrValue>),
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::String(value)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(values: Vec<T>) -> Self {
        AttrValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttrValue::Null, Into::into)
    }
}

/// Distance metric used by a namespace
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
    IntoStaticStr,
)]
pub enum DistanceMetric {
    #[default]
    #[serde(rename = "cosine_distance")]
    #[strum(serialize = "cosine_distance")]
    Cosine,
    #[serde(rename = "euclidean_squared")]
    #[strum(serialize = "euclidean_squared")]
    Euclidean,
    #[serde(rename = "dot_product")]
    #[strum(serialize = "dot_product")]
    DotProduct,
}

impl DistanceMetric {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// How a query is scored: by vector, by text, or both fused
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QueryMode {
    Vector,
    Text,
    Hybrid,
}

impl QueryMode {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// Score fusion strategy for hybrid queries
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FusionMode {
    /// Weighted average of vector and text scores
    Blend,
    /// Reciprocal rank fusion
    Rrf,
}

impl FusionMode {
    /// Wire tag
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// The two HTTP services a client talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Service {
    Query,
    Ingest,
}

/// A closed-set parameter given either as its typed variant or as its wire tag.
///
/// Tags are checked during validation, so an unknown string surfaces as a
/// validation error from the operation that received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumArg<T> {
    Typed(T),
    Tag(String),
}

macro_rules! enum_arg_conversions {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for EnumArg<$ty> {
                fn from(value: $ty) -> Self {
                    EnumArg::Typed(value)
                }
            }

            impl From<&str> for EnumArg<$ty> {
                fn from(value: &str) -> Self {
                    EnumArg::Tag(value.to_string())
                }
            }

            impl From<String> for EnumArg<$ty> {
                fn from(value: String) -> Self {
                    EnumArg::Tag(value)
                }
            }
        )+
    };
}

enum_arg_conversions!(DistanceMetric, QueryMode, FusionMode, Service);

/// A document to upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub vector: Vector,
    pub text: Option<String>,
    pub attributes: Option<Attributes>,
}

impl Document {
    pub fn new(id: impl Into<String>, vector: Vector) -> Self {
        Self {
            id: id.into(),
            vector,
            text: None,
            attributes: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Wire representation: `{id, vector, text?, attributes?}`.
    pub fn to_payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(self.id));
        payload.insert("vector".to_string(), json!(self.vector));
        if let Some(text) = &self.text {
            payload.insert("text".to_string(), json!(text));
        }
        if let Some(attributes) = &self.attributes {
            payload.insert("attributes".to_string(), json!(attributes));
        }
        Value::Object(payload)
    }
}

/// One query hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorResult {
    pub id: String,
    /// Score or distance as reported by the service
    pub score: f64,
    pub vector: Option<Vector>,
    pub attributes: Option<Attributes>,
}

/// Query outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<VectorResult>,
    pub namespace: String,
}

/// Namespace metadata from the query service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub namespace: String,
    pub approx_count: u64,
    pub dimensions: u64,
    /// `None` when the service did not report an actual boolean
    pub pending_compaction: Option<bool>,
}

impl NamespaceInfo {
    pub fn named(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            approx_count: 0,
            dimensions: 0,
            pending_compaction: None,
        }
    }
}

/// Ingest pipeline state for a single namespace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamespaceStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub wal_files: u64,
    pub wal_entries: u64,
    pub segments: u64,
    pub total_vecs: u64,
    pub dimensions: u64,
}

/// Ingest pipeline state across the whole service
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub wal_files: u64,
    pub wal_entries: u64,
    pub segments: u64,
    pub total_vecs: u64,
    pub dimensions: u64,
}

/// Parameters of a query.
///
/// Values are taken as given and checked when the query is issued, so
/// out-of-range numbers and unknown tags are reported as validation errors.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub vector: Option<Vector>,
    pub text: Option<String>,
    pub top_k: i64,
    pub namespace: Option<String>,
    pub distance_metric: Option<EnumArg<DistanceMetric>>,
    pub include_vectors: bool,
    pub filters: Option<Attributes>,
    pub ef_search: Option<i64>,
    pub nprobe: Option<i64>,
    pub mode: Option<EnumArg<QueryMode>>,
    pub alpha: Option<f64>,
    pub fusion: Option<EnumArg<FusionMode>>,
    pub rrf_k: Option<i64>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            vector: None,
            text: None,
            top_k: 10,
            namespace: None,
            distance_metric: Some(EnumArg::Typed(DistanceMetric::Cosine)),
            include_vectors: false,
            filters: None,
            ef_search: None,
            nprobe: None,
            mode: None,
            alpha: None,
            fusion: None,
            rrf_k: None,
        }
    }
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nearest-neighbour query for `vector`
    pub fn vector(vector: Vector) -> Self {
        Self::new().with_vector(vector)
    }

    /// Full-text query for `text`
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with_text(text)
    }

    pub fn with_vector(mut self, vector: Vector) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_distance_metric(mut self, metric: impl Into<EnumArg<DistanceMetric>>) -> Self {
        self.distance_metric = Some(metric.into());
        self
    }

    /// Let the service pick the namespace's own metric
    pub fn without_distance_metric(mut self) -> Self {
        self.distance_metric = None;
        self
    }

    pub fn with_include_vectors(mut self, include_vectors: bool) -> Self {
        self.include_vectors = include_vectors;
        self
    }

    pub fn with_filters(mut self, filters: Attributes) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_ef_search(mut self, ef_search: i64) -> Self {
        self.ef_search = Some(ef_search);
        self
    }

    pub fn with_nprobe(mut self, nprobe: i64) -> Self {
        self.nprobe = Some(nprobe);
        self
    }

    pub fn with_mode(mut self, mode: impl Into<EnumArg<QueryMode>>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn with_fusion(mut self, fusion: impl Into<EnumArg<FusionMode>>) -> Self {
        self.fusion = Some(fusion.into());
        self
    }

    pub fn with_rrf_k(mut self, rrf_k: i64) -> Self {
        self.rrf_k = Some(rrf_k);
        self
    }
}

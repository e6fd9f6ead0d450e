//! Decoders for service replies.
//!
//! The service has changed its JSON shapes over time, so each decoder tries the
//! known encodings in priority order and fails with a [`TidepoolError::Service`]
//! when none of them match.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{TidepoolError, TidepoolResult};
use crate::http::RawResponse;
use crate::models::{
    Attributes, IngestStatus, NamespaceInfo, NamespaceStatus, QueryResponse, Vector, VectorResult,
};

const INVALID_QUERY_RESPONSE: &str = "Invalid query response";
const INVALID_NAMESPACES_RESPONSE: &str = "Invalid namespaces response";

/// Best human-readable message for an error reply.
///
/// Preference: JSON `error`, JSON `message`, raw body text, `HTTP <status>`.
pub fn extract_error_message(response: &RawResponse) -> String {
    if let Ok(Value::Object(data)) = serde_json::from_slice::<Value>(&response.body) {
        let message = ["error", "message"]
            .iter()
            .filter_map(|key| data.get(*key))
            .find(|value| is_truthy(value));
        if let Some(Value::String(message)) = message {
            if !message.trim().is_empty() {
                return message.clone();
            }
        }
    }

    let text = response.text();
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    format!("HTTP {}", response.status)
}

/// Parse an ISO-8601 timestamp. A trailing `Z` is read as `+00:00`.
pub fn parse_datetime(value: Option<&str>) -> TidepoolResult<Option<DateTime<Utc>>> {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let normalized = match value.strip_suffix('Z') {
        Some(prefix) => format!("{}+00:00", prefix),
        None => value.to_string(),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    // Offset-less timestamps are taken as UTC
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(|_| TidepoolError::service(format!("Invalid timestamp: {}", value)))
}

pub fn parse_vector_results(data: &Value) -> TidepoolResult<Vec<VectorResult>> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(map) => match (map.get("results"), map.get("vectors")) {
            (Some(Value::Array(items)), _) => items,
            (_, Some(Value::Array(items))) => items,
            _ => return Err(TidepoolError::service(INVALID_QUERY_RESPONSE)),
        },
        _ => return Err(TidepoolError::service(INVALID_QUERY_RESPONSE)),
    };

    items.iter().map(parse_vector_result).collect()
}

fn parse_vector_result(item: &Value) -> TidepoolResult<VectorResult> {
    let Value::Object(item) = item else {
        return Err(TidepoolError::service(INVALID_QUERY_RESPONSE));
    };

    // Hits without a usable id are kept with an empty one
    let id = match item.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };

    // First key present wins; a falsy value reads as 0.0
    let score = ["score", "dist", "distance"]
        .iter()
        .find_map(|key| item.get(*key))
        .map(score_value)
        .transpose()?
        .unwrap_or(0.0);

    let vector = match item.get("vector") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<Vector>(value.clone())
                .map_err(|_| TidepoolError::service(INVALID_QUERY_RESPONSE))?,
        ),
    };

    let attributes = match item.get("attributes") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value::<Attributes>(value.clone())
                .map_err(|_| TidepoolError::service(INVALID_QUERY_RESPONSE))?,
        ),
    };

    Ok(VectorResult {
        id,
        score,
        vector,
        attributes,
    })
}

fn score_value(value: &Value) -> TidepoolResult<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| TidepoolError::service(INVALID_QUERY_RESPONSE)),
        Value::String(s) if s.is_empty() => Ok(0.0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| TidepoolError::service(INVALID_QUERY_RESPONSE)),
        _ => Err(TidepoolError::service(INVALID_QUERY_RESPONSE)),
    }
}

/// Decode namespace metadata. A reply that omits its name gets `fallback_namespace`.
pub fn parse_namespace_info(
    data: &Map<String, Value>,
    fallback_namespace: &str,
) -> TidepoolResult<NamespaceInfo> {
    let namespace = match data.get("namespace") {
        Some(Value::String(name)) => name.clone(),
        _ => fallback_namespace.to_string(),
    };

    let pending = match data.get("pending_compaction") {
        None | Some(Value::Null) => data.get("pendingCompaction"),
        found => found,
    };

    Ok(NamespaceInfo {
        namespace,
        approx_count: count_field(data, "approx_count")?,
        dimensions: count_field(data, "dimensions")?,
        pending_compaction: pending.and_then(Value::as_bool),
    })
}

pub fn parse_namespaces(data: &Value) -> TidepoolResult<Vec<NamespaceInfo>> {
    let items = match data {
        Value::Array(items) => items,
        Value::Object(map) => {
            let raw = match map.get("namespaces") {
                None | Some(Value::Null) => map.get("namespace_list"),
                found => found,
            };
            match raw {
                Some(Value::Array(items)) => items,
                _ => return Err(TidepoolError::service(INVALID_NAMESPACES_RESPONSE)),
            }
        }
        _ => return Err(TidepoolError::service(INVALID_NAMESPACES_RESPONSE)),
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(info) => parse_namespace_info(info, ""),
            Value::String(name) => Ok(NamespaceInfo::named(name.clone())),
            other => Ok(NamespaceInfo::named(other.to_string())),
        })
        .collect()
}

pub fn parse_ingest_status(data: &Map<String, Value>) -> TidepoolResult<IngestStatus> {
    Ok(IngestStatus {
        last_run: last_run_field(data)?,
        wal_files: count_field(data, "wal_files")?,
        wal_entries: count_field(data, "wal_entries")?,
        segments: count_field(data, "segments")?,
        total_vecs: count_field(data, "total_vecs")?,
        dimensions: count_field(data, "dimensions")?,
    })
}

pub fn parse_namespace_status(data: &Map<String, Value>) -> TidepoolResult<NamespaceStatus> {
    Ok(NamespaceStatus {
        last_run: last_run_field(data)?,
        wal_files: count_field(data, "wal_files")?,
        wal_entries: count_field(data, "wal_entries")?,
        segments: count_field(data, "segments")?,
        total_vecs: count_field(data, "total_vecs")?,
        dimensions: count_field(data, "dimensions")?,
    })
}

/// Decode a query reply. The namespace falls back to the one that was queried.
pub fn parse_query_response(data: &Value, fallback_namespace: &str) -> TidepoolResult<QueryResponse> {
    let mut namespace = fallback_namespace.to_string();
    if let Value::Object(map) = data {
        let raw = ["namespace", "ns"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|value| is_truthy(value));
        if let Some(Value::String(raw)) = raw {
            if !raw.trim().is_empty() {
                namespace = raw.clone();
            }
        }
    }

    Ok(QueryResponse {
        results: parse_vector_results(data)?,
        namespace,
    })
}

/// Check a `/health` reply. Any reported status other than `healthy` fails.
pub fn parse_health(data: &Value) -> TidepoolResult<Map<String, Value>> {
    let Value::Object(map) = data else {
        return Err(TidepoolError::service("Invalid health response"));
    };

    match map.get("status") {
        Some(Value::String(status)) if status == "healthy" => {}
        Some(status) if is_truthy(status) => {
            let status = status
                .as_str()
                .map_or_else(|| status.to_string(), str::to_string);
            return Err(TidepoolError::service(format!(
                "Service unhealthy: {}",
                status
            )));
        }
        _ => {}
    }

    Ok(map.clone())
}

fn last_run_field(data: &Map<String, Value>) -> TidepoolResult<Option<DateTime<Utc>>> {
    match data.get("last_run") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_datetime(Some(raw)),
        Some(_) => Err(TidepoolError::service("Invalid value for 'last_run'")),
    }
}

/// Read a non-negative count; absent and `null` read as 0.
fn count_field(data: &Map<String, Value>, key: &str) -> TidepoolResult<u64> {
    let invalid = || TidepoolError::service(format!("Invalid value for '{}'", key));
    match data.get(key) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => match (n.as_u64(), n.as_f64()) {
            (Some(v), _) => Ok(v),
            (None, Some(f)) if f >= 0.0 && f.is_finite() => Ok(f.trunc() as u64),
            _ => Err(invalid()),
        },
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;
    use crate::models::{AttrValue, Document};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {}", other),
        }
    }

    #[test]
    fn test_extract_error_message() {
        let response = RawResponse::json(400, &json!({"error": "bad"}));
        assert_eq!(extract_error_message(&response), "bad");

        let response = RawResponse::json(400, &json!({"message": "nope"}));
        assert_eq!(extract_error_message(&response), "nope");

        let response = RawResponse::json(400, &json!({"error": "", "message": "fallback"}));
        assert_eq!(extract_error_message(&response), "fallback");

        let response = RawResponse::new(500, b"oh no".to_vec());
        assert_eq!(extract_error_message(&response), "oh no");

        let response = RawResponse::new(500, Vec::new());
        assert_eq!(extract_error_message(&response), "HTTP 500");
    }

    #[test]
    fn test_extract_error_message_non_string_falls_back_to_body() {
        let response = RawResponse::json(422, &json!({"error": 42}));
        assert_eq!(extract_error_message(&response), r#"{"error":42}"#);
    }

    #[test]
    fn test_parse_datetime() {
        let parsed = parse_datetime(Some("2025-01-01T00:00:00Z")).unwrap().unwrap();
        assert_eq!(parsed.year(), 2025);
        assert_eq!(parsed.hour(), 0);

        let parsed = parse_datetime(Some("2025-01-01T02:00:00+02:00"))
            .unwrap()
            .unwrap();
        assert_eq!(parsed.hour(), 0);

        let parsed = parse_datetime(Some("2025-03-04T05:06:07")).unwrap().unwrap();
        assert_eq!(parsed.month(), 3);

        assert_eq!(parse_datetime(None).unwrap(), None);
        assert_eq!(parse_datetime(Some("")).unwrap(), None);
        assert!(parse_datetime(Some("yesterday")).is_err());
    }

    #[test]
    fn test_parse_vector_results_score_synonyms() {
        let results = parse_vector_results(&json!([
            {"id": "a", "score": 0.1},
            {"id": "b", "dist": 0.2},
            {"id": "c", "distance": 0.3},
            {"id": "d"},
            {"id": "e", "score": null, "dist": 0.9},
        ]))
        .unwrap();

        assert_eq!(results[0].score, 0.1);
        assert_eq!(results[1].score, 0.2);
        assert_eq!(results[2].score, 0.3);
        assert_eq!(results[3].score, 0.0);
        assert_eq!(results[4].score, 0.0);
    }

    #[test]
    fn test_parse_vector_results_envelopes() {
        let results = parse_vector_results(&json!({"results": [{"id": "a", "score": 0.4}]})).unwrap();
        assert_eq!(results[0].id, "a");

        let results = parse_vector_results(&json!({"vectors": [{"id": "b", "score": 0.5}]})).unwrap();
        assert_eq!(results[0].id, "b");

        let results = parse_vector_results(&json!({
            "results": [{
                "id": 7,
                "score": 0.5,
                "vector": [0.5, 0.25],
                "attributes": {"tag": "x"}
            }]
        }))
        .unwrap();
        assert_eq!(results[0].id, "7");
        assert_eq!(results[0].vector, Some(vec![0.5, 0.25]));
        assert_eq!(
            results[0].attributes.as_ref().unwrap()["tag"],
            AttrValue::String("x".to_string())
        );
    }

    #[test]
    fn test_parse_vector_results_rejects_unknown_shapes() {
        assert!(parse_vector_results(&json!({"bad": "shape"})).is_err());
        assert!(parse_vector_results(&json!(["bad"])).is_err());
        assert!(parse_vector_results(&json!("results")).is_err());
        assert!(parse_vector_results(&Value::Null).is_err());

        let err = parse_vector_results(&json!([{"id": "a"}, 3])).unwrap_err();
        assert!(matches!(err, TidepoolError::Service { .. }));
        assert_eq!(err.message(), "Invalid query response");
    }

    #[test]
    fn test_parse_vector_results_keeps_hits_without_id() {
        let results = parse_vector_results(&json!([
            {"score": 0.5},
            {"id": null, "score": 0.25},
            {"id": ["x"], "score": 0.125},
        ]))
        .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|hit| hit.id.is_empty()));
        assert_eq!(results[0].score, 0.5);
    }

    #[test]
    fn test_parse_namespace_info() {
        let data = object(json!({
            "namespace": "default",
            "approx_count": 10,
            "dimensions": 3,
            "pending_compaction": true,
        }));
        let info = parse_namespace_info(&data, "fallback").unwrap();
        assert_eq!(info.namespace, "default");
        assert_eq!(info.approx_count, 10);
        assert_eq!(info.dimensions, 3);
        assert_eq!(info.pending_compaction, Some(true));

        let data = object(json!({"namespace": "default", "pendingCompaction": false}));
        let info = parse_namespace_info(&data, "fallback").unwrap();
        assert_eq!(info.pending_compaction, Some(false));
        assert_eq!(info.approx_count, 0);

        let data = object(json!({"namespace": "default", "pending_compaction": "no"}));
        let info = parse_namespace_info(&data, "fallback").unwrap();
        assert_eq!(info.pending_compaction, None);
    }

    #[test]
    fn test_parse_namespace_info_without_name_uses_fallback() {
        let data = object(json!({"approx_count": 5, "dimensions": 3}));
        let info = parse_namespace_info(&data, "products").unwrap();

        assert_eq!(info.namespace, "products");
        assert_eq!(info.approx_count, 5);
        assert_eq!(info.dimensions, 3);
    }

    #[test]
    fn test_parse_namespaces() {
        let infos = parse_namespaces(&json!(["a", "b"])).unwrap();
        assert_eq!(infos[0].namespace, "a");
        assert_eq!(infos[1].pending_compaction, None);

        let infos = parse_namespaces(&json!({"namespaces": [{"namespace": "c"}]})).unwrap();
        assert_eq!(infos[0].namespace, "c");

        let infos = parse_namespaces(&json!({"namespace_list": ["d", "e"]})).unwrap();
        assert_eq!(infos[1].namespace, "e");

        let infos = parse_namespaces(&json!([{"approx_count": 3}])).unwrap();
        assert_eq!(infos[0].namespace, "");
        assert_eq!(infos[0].approx_count, 3);

        assert!(parse_namespaces(&json!({"bad": "shape"})).is_err());
        assert!(parse_namespaces(&json!({"namespaces": "a,b"})).is_err());
        assert!(parse_namespaces(&json!(5)).is_err());
    }

    #[test]
    fn test_parse_query_response_namespace() {
        let response = parse_query_response(
            &json!({"namespace": "ns", "results": [{"id": "a", "score": 0.1}]}),
            "fallback",
        )
        .unwrap();
        assert_eq!(response.namespace, "ns");
        assert_eq!(response.results[0].id, "a");

        let response = parse_query_response(&json!({"ns": "short", "results": []}), "fallback").unwrap();
        assert_eq!(response.namespace, "short");

        let response = parse_query_response(&json!({"results": []}), "fallback").unwrap();
        assert_eq!(response.namespace, "fallback");

        let response =
            parse_query_response(&json!({"namespace": "   ", "results": []}), "fallback").unwrap();
        assert_eq!(response.namespace, "fallback");

        let response = parse_query_response(&json!([{"id": "b", "score": 0.2}]), "fallback").unwrap();
        assert_eq!(response.namespace, "fallback");
    }

    #[test]
    fn test_parse_status() {
        let ingest = parse_ingest_status(&object(json!({
            "last_run": "2025-01-01T00:00:00Z",
            "wal_files": 1,
            "wal_entries": 2,
            "segments": 3,
            "total_vecs": 4,
            "dimensions": 5,
        })))
        .unwrap();
        assert_eq!(ingest.wal_files, 1);
        assert_eq!(ingest.total_vecs, 4);
        assert!(ingest.last_run.is_some());

        let namespace = parse_namespace_status(&object(json!({
            "last_run": "2025-01-01T00:00:00Z",
            "wal_files": 2,
            "wal_entries": 3,
            "segments": 4,
            "total_vecs": 5,
            "dimensions": 6,
        })))
        .unwrap();
        assert_eq!(namespace.dimensions, 6);
        assert_eq!(namespace.wal_entries, 3);
    }

    #[test]
    fn test_parse_status_defaults() {
        let status = parse_namespace_status(&Map::new()).unwrap();
        assert_eq!(status, NamespaceStatus::default());

        let status = parse_ingest_status(&object(json!({"segments": "7", "wal_files": 2.0}))).unwrap();
        assert_eq!(status.segments, 7);
        assert_eq!(status.wal_files, 2);
        assert_eq!(status.last_run, None);

        assert!(parse_ingest_status(&object(json!({"segments": [1]}))).is_err());

        let err = parse_ingest_status(&object(json!({"last_run": 1714564800}))).unwrap_err();
        assert_eq!(err.message(), "Invalid value for 'last_run'");
        let err = parse_namespace_status(&object(json!({"last_run": true}))).unwrap_err();
        assert_eq!(err.message(), "Invalid value for 'last_run'");
    }

    #[test]
    fn test_parse_health() {
        let data = parse_health(&json!({"service": "query", "status": "healthy"})).unwrap();
        assert_eq!(data["service"], "query");
        assert!(parse_health(&json!({"service": "query"})).is_ok());

        let err = parse_health(&json!({"status": "unhealthy"})).unwrap_err();
        assert_eq!(err.message(), "Service unhealthy: unhealthy");
        assert!(parse_health(&json!(["healthy"])).is_err());
    }

    #[test]
    fn test_document_payload_round_trip() {
        let doc = Document::new("doc-42", vec![0.5, 0.25]);
        let mut hit = doc.to_payload();
        hit["score"] = json!(0.75);

        let results = parse_vector_results(&json!([hit])).unwrap();
        assert_eq!(results[0].id, doc.id);
        assert_eq!(results[0].vector.as_ref(), Some(&doc.vector));
        assert_eq!(results[0].score, 0.75);
    }
}

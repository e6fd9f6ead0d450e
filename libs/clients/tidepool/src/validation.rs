//! Checks applied to caller input before anything reaches the network.
//!
//! Every failure is a [`TidepoolError::Validation`] without a status code.

use std::str::FromStr;

use crate::error::{TidepoolError, TidepoolResult};
use crate::models::{
    AttrValue, Attributes, DistanceMetric, Document, EnumArg, FusionMode, QueryMode, Service,
    Vector,
};

/// Resolve a namespace, falling back to `default` when none was given.
///
/// Whitespace-only names are rejected; accepted names are returned as given.
pub fn normalize_namespace(namespace: Option<&str>, default: &str) -> TidepoolResult<String> {
    let namespace = namespace.unwrap_or(default);
    if namespace.trim().is_empty() {
        return Err(TidepoolError::validation(
            "Namespace must be a non-empty string",
        ));
    }
    Ok(namespace.to_string())
}

fn resolve_tag<T: FromStr>(arg: EnumArg<T>, message: &str) -> TidepoolResult<T> {
    match arg {
        EnumArg::Typed(value) => Ok(value),
        EnumArg::Tag(tag) => T::from_str(&tag).map_err(|_| TidepoolError::validation(message)),
    }
}

pub fn normalize_distance_metric(
    metric: Option<EnumArg<DistanceMetric>>,
) -> TidepoolResult<Option<DistanceMetric>> {
    metric
        .map(|arg| {
            resolve_tag(
                arg,
                "Distance metric must be one of: cosine_distance, euclidean_squared, dot_product",
            )
        })
        .transpose()
}

/// Blank text counts as no text.
pub fn normalize_query_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Pick the query mode, inferring it from the inputs when not given.
pub fn normalize_query_mode(
    mode: Option<EnumArg<QueryMode>>,
    has_vector: bool,
    has_text: bool,
) -> TidepoolResult<QueryMode> {
    match mode {
        Some(arg) => resolve_tag(arg, "mode must be one of: vector, text, hybrid"),
        None if has_vector && has_text => Ok(QueryMode::Hybrid),
        None if has_text => Ok(QueryMode::Text),
        None => Ok(QueryMode::Vector),
    }
}

/// Check that the chosen mode has the inputs it needs.
pub fn check_query_inputs(mode: QueryMode, has_vector: bool, has_text: bool) -> TidepoolResult<()> {
    match mode {
        QueryMode::Vector if !has_vector => Err(TidepoolError::validation("vector is required")),
        QueryMode::Text if !has_text => Err(TidepoolError::validation("text is required")),
        QueryMode::Hybrid if !has_vector || !has_text => Err(TidepoolError::validation(
            "vector and text are required for hybrid",
        )),
        _ => Ok(()),
    }
}

pub fn normalize_fusion_mode(
    fusion: Option<EnumArg<FusionMode>>,
) -> TidepoolResult<Option<FusionMode>> {
    fusion
        .map(|arg| resolve_tag(arg, "fusion must be one of: blend, rrf"))
        .transpose()
}

pub fn normalize_service(service: EnumArg<Service>) -> TidepoolResult<Service> {
    resolve_tag(service, "Service must be 'query' or 'ingest'")
}

/// Clamp alpha into `[0, 1]`. Out-of-range values are clamped, not rejected.
pub fn normalize_alpha(alpha: Option<f64>) -> TidepoolResult<Option<f64>> {
    match alpha {
        None => Ok(None),
        Some(value) if !value.is_finite() => {
            Err(TidepoolError::validation("alpha must be a finite number"))
        }
        Some(value) => Ok(Some(value.clamp(0.0, 1.0))),
    }
}

pub fn validate_vector(vector: &[f32], expected_dims: Option<usize>) -> TidepoolResult<Vector> {
    if vector.is_empty() {
        return Err(TidepoolError::validation("Vector cannot be empty"));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(TidepoolError::validation(
            "Vector must contain only finite numbers",
        ));
    }
    match expected_dims {
        Some(expected) if vector.len() != expected => {
            return Err(TidepoolError::validation(format!(
                "Expected {} dimensions, got {}",
                expected,
                vector.len()
            )));
        }
        _ => {}
    }
    Ok(vector.to_vec())
}

fn is_attr_value(value: &AttrValue) -> bool {
    match value {
        AttrValue::Float(f) => f.is_finite(),
        AttrValue::List(items) => items.iter().all(is_attr_value),
        AttrValue::Map(map) => map.values().all(is_attr_value),
        AttrValue::Null | AttrValue::Bool(_) | AttrValue::Int(_) | AttrValue::String(_) => true,
    }
}

pub fn validate_attributes(attributes: Option<&Attributes>) -> TidepoolResult<()> {
    let Some(attributes) = attributes else {
        return Ok(());
    };
    for (key, value) in attributes {
        if !is_attr_value(value) {
            return Err(TidepoolError::validation(format!(
                "Invalid attribute value for key '{}'",
                key
            )));
        }
    }
    Ok(())
}

pub fn validate_filters(filters: Option<&Attributes>) -> TidepoolResult<()> {
    let Some(filters) = filters else {
        return Ok(());
    };
    for (key, value) in filters {
        if !is_attr_value(value) {
            return Err(TidepoolError::validation(format!(
                "Invalid filter value for key '{}'",
                key
            )));
        }
    }
    Ok(())
}

pub fn validate_ids<S: AsRef<str>>(ids: &[S]) -> TidepoolResult<Vec<String>> {
    if ids.is_empty() {
        return Err(TidepoolError::validation("Ids list cannot be empty"));
    }
    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            if id.trim().is_empty() {
                Err(TidepoolError::validation("Each id must be a non-empty string"))
            } else {
                Ok(id.to_string())
            }
        })
        .collect()
}

/// Validate an upsert batch.
///
/// The first document fixes the dimensionality every other document must match.
pub fn validate_documents(documents: &[Document]) -> TidepoolResult<Vec<Document>> {
    if documents.is_empty() {
        return Err(TidepoolError::validation("Vectors list cannot be empty"));
    }

    let mut expected_dims: Option<usize> = None;
    let mut normalized = Vec::with_capacity(documents.len());

    for doc in documents {
        if doc.id.trim().is_empty() {
            return Err(TidepoolError::validation(
                "Document id must be a non-empty string",
            ));
        }
        let vector = validate_vector(&doc.vector, expected_dims)?;
        expected_dims.get_or_insert(vector.len());
        validate_attributes(doc.attributes.as_ref())?;

        normalized.push(Document {
            id: doc.id.clone(),
            vector,
            text: doc.text.clone(),
            attributes: doc.attributes.clone(),
        });
    }

    Ok(normalized)
}

pub fn validate_positive_int(value: Option<i64>, name: &str) -> TidepoolResult<Option<u64>> {
    match value {
        None => Ok(None),
        Some(v) if v > 0 => Ok(Some(v as u64)),
        Some(_) => Err(TidepoolError::validation(format!(
            "{} must be a positive integer",
            name
        ))),
    }
}

pub fn validate_top_k(top_k: i64) -> TidepoolResult<u64> {
    match validate_positive_int(Some(top_k), "top_k")? {
        Some(top_k) => Ok(top_k),
        None => Err(TidepoolError::validation("top_k must be a positive integer")),
    }
}

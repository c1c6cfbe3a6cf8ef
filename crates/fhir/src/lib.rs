//! FHIR wire/boundary support for the patient chart.
//!
//! This crate provides **wire models** and **translation helpers** for FHIR R4 JSON returned by
//! the clinical-resource API:
//! - `AllergyIntolerance` resources and search bundles
//!
//! This crate focuses on:
//! - serialisation/deserialisation of the FHIR JSON shapes the chart consumes
//! - translation from nested wire structs into flat view models
//!
//! Wire structs here are deliberately lenient: servers add fields over time and legacy records
//! omit fields the current profile requires. Missing data becomes `None` in the view model,
//! never an error. Only structurally wrong JSON (wrong types, wrong `resourceType`) is rejected.

pub mod allergy_intolerance;
pub mod bundle;

// Re-export facades
pub use allergy_intolerance::AllergyIntolerance;

// Re-export public domain-level types
pub use allergy_intolerance::{sort_by_recency, AllergyData};

use serde::de::DeserializeOwned;

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Decode a JSON document into a wire struct.
///
/// This uses `serde_path_to_error` to surface a best-effort "path" (e.g. `entry[0].resource.note`)
/// to the failing field when the JSON does not match the wire schema.
pub(crate) fn decode<T: DeserializeOwned>(json: &[u8], what: &str) -> FhirResult<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(json);
    serde_path_to_error::deserialize::<_, T>(&mut deserializer)
        .map_err(|err| mismatch(err, what))
}

/// Decode an already-parsed JSON value, such as one bundle entry, into a wire struct.
pub(crate) fn decode_value<T: DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> FhirResult<T> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(|err| mismatch(err, what))
}

fn mismatch(err: serde_path_to_error::Error<serde_json::Error>, what: &str) -> FhirError {
    let path = err.path().to_string();
    let source = err.into_inner();
    let path = if path.is_empty() || path == "." {
        "<root>"
    } else {
        path.as_str()
    };
    FhirError::Translation(format!("{what} schema mismatch at {path}: {source}"))
}

/// Reject a resource whose declared `resourceType` differs from the expected one.
///
/// A missing `resourceType` is tolerated; some proxies strip it from nested resources.
pub(crate) fn check_resource_type(found: Option<&str>, expected: &str) -> FhirResult<()> {
    match found {
        Some(found) if found != expected => Err(FhirError::InvalidInput(format!(
            "Expected resourceType '{expected}', got '{found}'"
        ))),
        _ => Ok(()),
    }
}

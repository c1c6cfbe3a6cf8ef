//! OpenMRS REST wire/boundary support.
//!
//! This crate models the JSON shapes of the legacy `/ws/rest/v1` record API that the chart still
//! talks to alongside FHIR:
//! - patient allergies (full representation) and the allergy write payload
//! - concept sets (allergens, reactions)
//! - visit types
//! - program enrollments
//! - the current session
//!
//! Read models are lenient: the server adds fields between releases and only the fields the chart
//! reads are declared. Write models are strict and only constructed from validated values.

pub mod allergy;
pub mod concept;
pub mod datetime;
pub mod program;
pub mod session;
pub mod visit_type;

pub use allergy::{AllergenType, AllergyPayload, PatientAllergy};
pub use concept::{Concept, ConceptMember};
pub use program::{PatientProgram, Program, ProgramsFetchResponse};
pub use session::SessionData;
pub use visit_type::VisitType;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors returned by the `openmrs` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum OpenmrsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with an [`OpenmrsError`].
pub type OpenmrsResult<T> = Result<T, OpenmrsError>;

/// A hypermedia link attached to most REST representations.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub uri: String,
}

pub type Links = Vec<Link>;

/// The `{uuid, display, links}` triple the REST API uses for references to other resources.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DisplayMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,
}

/// Envelope of list endpoints such as `/visittype` and `/programenrollment`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Results<T> {
    pub results: Vec<T>,
}

/// Decode a REST response body into a wire struct.
///
/// This uses `serde_path_to_error` so a mismatch reports where it happened
/// (e.g. `results[3].dateEnrolled`).
pub fn decode<T: DeserializeOwned>(json: &[u8], what: &str) -> OpenmrsResult<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(json);

    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(OpenmrsError::Translation(format!(
                "{what} schema mismatch at {path}: {source}"
            )))
        }
    }
}

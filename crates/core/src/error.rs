use crate::transport::Method;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] chart_types::TextError),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
    #[error("{method} {path} returned status {status}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },
    #[error("failed to serialize request body: {0}")]
    Serialization(serde_json::Error),
    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
    #[error("OpenMRS error: {0}")]
    Openmrs(#[from] openmrs::OpenmrsError),
}

impl ChartError {
    /// HTTP status reported by the server, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChartError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the server or network.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            ChartError::InvalidInput(_) | ChartError::InvalidIdentifier(_)
        )
    }
}

pub type ChartResult<T> = std::result::Result<T, ChartError>;

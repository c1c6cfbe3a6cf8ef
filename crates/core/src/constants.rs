//! Constants used throughout the chart core crate.
//!
//! Paths are relative to the server root configured in [`crate::CoreConfig`].

/// Path of the FHIR R4 endpoint below the server root.
pub const FHIR_BASE_PATH: &str = "/ws/fhir2/R4";

/// Path of the legacy REST record API below the server root.
pub const REST_BASE_PATH: &str = "/ws/rest/v1";

/// Concept set whose members are the reactions offered when recording an allergy.
pub const ALLERGY_REACTION_CONCEPT: &str = "162555AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Visit types shown per page in the visit type picker.
pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Request timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Address the REST gateway binds when none is configured.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

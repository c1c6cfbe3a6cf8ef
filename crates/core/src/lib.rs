//! # Chart Core
//!
//! Data access for the patient chart.
//!
//! This crate talks to the clinical backend and hands callers ready-to-render values:
//! - allergy records (list, get, create, update, delete) and the concept sets behind the
//!   allergy form
//! - a live allergy feed for list views
//! - visit types, program enrollments and the current session
//!
//! Every operation takes a [`CancellationToken`] and resolves to an [`Outcome`], so a cancelled
//! call is neither a success nor an error.
//!
//! **No API concerns**: HTTP routing, OpenAPI and command-line handling belong in `api-rest`
//! and `cli`.

pub mod allergies;
pub mod cancellation;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod programs;
pub mod session;
pub mod transport;
pub mod visit_types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use allergies::{AllergyForm, AllergyInput, AllergyListing, AllergyService};
pub use cancellation::{run_cancellable, CancellationToken, DropGuard, Outcome};
pub use client::ChartClient;
pub use config::{config_from_env_values, CoreConfig, EnvValues};
pub use error::{ChartError, ChartResult};
pub use feed::AllergyFeed;
pub use pagination::{paginate, Page};
pub use programs::ProgramService;
pub use session::SessionService;
pub use transport::{Api, ApiRequest, ApiResponse, HttpTransport, Method, Transport};
pub use visit_types::{filter_visit_types, VisitTypeService};

pub use fhir::AllergyData;
pub use openmrs::{
    AllergenType, ConceptMember, PatientAllergy, PatientProgram, Program, SessionData, VisitType,
};

/// All services sharing one client.
#[derive(Clone, Debug)]
pub struct ChartServices {
    pub allergies: AllergyService,
    pub visit_types: VisitTypeService,
    pub programs: ProgramService,
    pub session: SessionService,
}

impl ChartServices {
    pub fn new(client: ChartClient) -> Self {
        Self {
            allergies: AllergyService::new(client.clone()),
            visit_types: VisitTypeService::new(client.clone()),
            programs: ProgramService::new(client.clone()),
            session: SessionService::new(client),
        }
    }
}

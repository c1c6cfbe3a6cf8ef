//! # API REST
//!
//! REST gateway for the patient chart.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON shapes, status codes, CORS)
//!
//! Each handler owns a [`CancellationToken`] guarded by a [`chart_core::DropGuard`]: when the
//! client disconnects axum drops the handler future, the guard cancels the token and the
//! backend request is abandoned.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chart_core::{
    AllergyData, AllergyForm, AllergyInput, CancellationToken, ChartError, ChartResult,
    ChartServices, ConceptMember, Outcome, PatientProgram, SessionData, VisitType,
};
use chart_types::ResourceId;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: ChartServices,
}

impl AppState {
    pub fn new(services: ChartServices) -> Self {
        Self { services }
    }
}

type ApiError = (StatusCode, &'static str);

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_allergies,
        get_allergy,
        get_patient_allergy,
        create_allergy,
        update_allergy,
        delete_allergy,
        allergen_concept_members,
        reaction_concepts,
        search_visit_types,
        patient_programs,
        current_session,
    ),
    components(schemas(
        HealthRes,
        AllergyRes,
        AllergyListRes,
        AllergyReq,
        PatientAllergyRes,
        ConceptMemberRes,
        VisitTypeRes,
        VisitTypePageRes,
        ProgramRes,
        SessionRes,
    ))
)]
pub struct ApiDoc;

/// Build the gateway router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/patients/:patient_id/allergies",
            get(list_allergies).post(create_allergy),
        )
        .route(
            "/patients/:patient_id/allergies/:allergy_id",
            get(get_patient_allergy)
                .post(update_allergy)
                .delete(delete_allergy),
        )
        .route("/allergies/:allergy_id", get(get_allergy))
        .route("/concepts/reactions", get(reaction_concepts))
        .route("/concepts/:concept_id/members", get(allergen_concept_members))
        .route("/visit-types", get(search_visit_types))
        .route("/patients/:patient_id/programs", get(patient_programs))
        .route("/session", get(current_session))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the gateway until the server fails.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ Chart REST listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Normalised allergy record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllergyRes {
    pub id: Option<String>,
    pub clinical_status: Option<String>,
    pub criticality: Option<String>,
    pub display: Option<String>,
    pub recorded_date: Option<String>,
    pub recorded_by: Option<String>,
    pub recorder_type: Option<String>,
    pub note: Option<String>,
    pub reaction_to_substance: Option<String>,
    pub reaction_manifestations: Option<Vec<String>>,
    pub reaction_severity: Option<String>,
    pub last_updated: Option<String>,
}

impl From<AllergyData> for AllergyRes {
    fn from(data: AllergyData) -> Self {
        Self {
            id: data.id,
            clinical_status: data.clinical_status,
            criticality: data.criticality,
            display: data.display,
            recorded_date: data.recorded_date,
            recorded_by: data.recorded_by,
            recorder_type: data.recorder_type,
            note: data.note,
            reaction_to_substance: data.reaction_to_substance,
            reaction_manifestations: data.reaction_manifestations,
            reaction_severity: data.reaction_severity,
            last_updated: data.last_updated,
        }
    }
}

/// Allergies of a patient, most recently updated first. `null` when the patient has none.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AllergyListRes {
    pub allergies: Option<Vec<AllergyRes>>,
}

/// Allergy form submitted to create or update an allergy.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllergyReq {
    /// `DRUG`, `FOOD`, `ENVIRONMENT` or `OTHER`.
    pub allergen_type: String,
    pub coded_allergen_uuid: String,
    pub severity_uuid: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reaction_uuids: Vec<String>,
}

impl From<AllergyReq> for AllergyForm {
    fn from(req: AllergyReq) -> Self {
        Self {
            allergen_type: req.allergen_type,
            coded_allergen_uuid: req.coded_allergen_uuid,
            severity_uuid: req.severity_uuid,
            comment: req.comment,
            reaction_uuids: req.reaction_uuids,
        }
    }
}

/// Allergy in the backend's own representation, passed through unchanged.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientAllergyRes {
    #[schema(value_type = Object)]
    pub allergy: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConceptMemberRes {
    pub uuid: String,
    pub display: Option<String>,
}

impl From<ConceptMember> for ConceptMemberRes {
    fn from(member: ConceptMember) -> Self {
        Self {
            uuid: member.uuid,
            display: member.display,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VisitTypeRes {
    pub uuid: String,
    pub display: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<VisitType> for VisitTypeRes {
    fn from(visit_type: VisitType) -> Self {
        Self {
            uuid: visit_type.uuid,
            display: visit_type.display,
            name: visit_type.name,
            description: visit_type.description,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitTypePageRes {
    pub results: Vec<VisitTypeRes>,
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VisitTypeQuery {
    /// Case-insensitive search term. Blank matches every visit type.
    pub q: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgramRes {
    pub uuid: String,
    pub display: String,
    pub program: String,
    pub date_enrolled: String,
    pub date_completed: Option<String>,
    pub active: bool,
}

impl From<PatientProgram> for ProgramRes {
    fn from(enrollment: PatientProgram) -> Self {
        Self {
            active: enrollment.is_active(),
            uuid: enrollment.uuid,
            display: enrollment.display,
            program: enrollment.program.name,
            date_enrolled: openmrs::datetime::format(&enrollment.date_enrolled),
            date_completed: enrollment
                .date_completed
                .as_ref()
                .map(openmrs::datetime::format),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionRes {
    pub authenticated: bool,
    pub locale: Option<String>,
    pub username: Option<String>,
    pub provider: Option<String>,
    pub location: Option<String>,
}

impl From<SessionData> for SessionRes {
    fn from(session: SessionData) -> Self {
        Self {
            authenticated: session.authenticated,
            locale: session.locale,
            username: session.user.map(|u| u.username),
            provider: session.current_provider.map(|p| p.display),
            location: session.session_location.map(|l| l.display),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks. Does not contact the backend.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Chart REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/allergies",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Allergies of the patient", body = AllergyListRes),
        (status = 400, description = "Invalid identifier"),
        (status = 502, description = "Backend request failed")
    )
)]
/// List a patient's allergies
///
/// Records are normalised and ordered most recently updated first.
#[axum::debug_handler]
async fn list_allergies(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> Result<Json<AllergyListRes>, ApiError> {
    let patient = parse_id(&patient_id)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let outcome = state
        .services
        .allergies
        .list_allergies(&patient, &token)
        .await;
    guard.disarm();

    let listing = outcome.completed().ok_or(cancelled())?;
    if let Some(err) = &listing.error {
        return Err(error_response("List allergies", err));
    }
    Ok(Json(AllergyListRes {
        allergies: listing
            .records
            .map(|records| records.into_iter().map(AllergyRes::from).collect()),
    }))
}

#[utoipa::path(
    get,
    path = "/allergies/{allergy_id}",
    params(("allergy_id" = String, Path, description = "Allergy identifier")),
    responses(
        (status = 200, description = "Normalised allergy", body = AllergyRes),
        (status = 400, description = "Invalid identifier"),
        (status = 404, description = "Allergy not found"),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn get_allergy(
    State(state): State<AppState>,
    AxumPath(allergy_id): AxumPath<String>,
) -> Result<Json<AllergyRes>, ApiError> {
    let allergy = parse_id(&allergy_id)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state.services.allergies.get_allergy(&allergy, &token).await;
    guard.disarm();

    let record = completed("Get allergy", result)?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/allergies/{allergy_id}",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("allergy_id" = String, Path, description = "Allergy identifier")
    ),
    responses(
        (status = 200, description = "Allergy in backend representation", body = PatientAllergyRes),
        (status = 400, description = "Invalid identifier"),
        (status = 404, description = "Allergy not found"),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn get_patient_allergy(
    State(state): State<AppState>,
    AxumPath((patient_id, allergy_id)): AxumPath<(String, String)>,
) -> Result<Json<PatientAllergyRes>, ApiError> {
    let patient = parse_id(&patient_id)?;
    let allergy = parse_id(&allergy_id)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .allergies
        .get_patient_allergy(&patient, &allergy, &token)
        .await;
    guard.disarm();

    let record = completed("Get patient allergy", result)?;
    passthrough(&record)
}

#[utoipa::path(
    post,
    path = "/patients/{patient_id}/allergies",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    request_body = AllergyReq,
    responses(
        (status = 201, description = "Allergy created", body = PatientAllergyRes),
        (status = 400, description = "Invalid allergy form"),
        (status = 502, description = "Backend request failed")
    )
)]
/// Record a new allergy for a patient
#[axum::debug_handler]
async fn create_allergy(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
    Json(req): Json<AllergyReq>,
) -> Result<(StatusCode, Json<PatientAllergyRes>), ApiError> {
    let patient = parse_id(&patient_id)?;
    let input = parse_form(req)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .allergies
        .create_allergy(&input, &patient, &token)
        .await;
    guard.disarm();

    let created = completed("Create allergy", result)?;
    Ok((StatusCode::CREATED, passthrough(&created)?))
}

#[utoipa::path(
    post,
    path = "/patients/{patient_id}/allergies/{allergy_id}",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("allergy_id" = String, Path, description = "Allergy identifier")
    ),
    request_body = AllergyReq,
    responses(
        (status = 200, description = "Allergy updated", body = PatientAllergyRes),
        (status = 400, description = "Invalid allergy form"),
        (status = 404, description = "Allergy not found"),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn update_allergy(
    State(state): State<AppState>,
    AxumPath((patient_id, allergy_id)): AxumPath<(String, String)>,
    Json(req): Json<AllergyReq>,
) -> Result<Json<PatientAllergyRes>, ApiError> {
    let patient = parse_id(&patient_id)?;
    let allergy = parse_id(&allergy_id)?;
    let input = parse_form(req)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .allergies
        .update_allergy(&input, &patient, &allergy, &token)
        .await;
    guard.disarm();

    let updated = completed("Update allergy", result)?;
    passthrough(&updated)
}

#[utoipa::path(
    delete,
    path = "/patients/{patient_id}/allergies/{allergy_id}",
    params(
        ("patient_id" = String, Path, description = "Patient identifier"),
        ("allergy_id" = String, Path, description = "Allergy identifier")
    ),
    responses(
        (status = 204, description = "Allergy deleted"),
        (status = 400, description = "Invalid identifier"),
        (status = 404, description = "Allergy not found"),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn delete_allergy(
    State(state): State<AppState>,
    AxumPath((patient_id, allergy_id)): AxumPath<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let patient = parse_id(&patient_id)?;
    let allergy = parse_id(&allergy_id)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .allergies
        .delete_allergy(&patient, &allergy, &token)
        .await;
    guard.disarm();

    completed("Delete allergy", result)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/concepts/{concept_id}/members",
    params(("concept_id" = String, Path, description = "Allergen concept set identifier")),
    responses(
        (status = 200, description = "Members of the concept set", body = [ConceptMemberRes]),
        (status = 400, description = "Invalid identifier"),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn allergen_concept_members(
    State(state): State<AppState>,
    AxumPath(concept_id): AxumPath<String>,
) -> Result<Json<Vec<ConceptMemberRes>>, ApiError> {
    let concept = parse_id(&concept_id)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .allergies
        .allergen_concept_members(&concept, &token)
        .await;
    guard.disarm();

    let members = completed("List concept members", result)?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/concepts/reactions",
    responses(
        (status = 200, description = "Reactions offered on the allergy form", body = [ConceptMemberRes]),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn reaction_concepts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConceptMemberRes>>, ApiError> {
    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state.services.allergies.reaction_concepts(&token).await;
    guard.disarm();

    let members = completed("List reaction concepts", result)?;
    Ok(Json(members.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/visit-types",
    params(VisitTypeQuery),
    responses(
        (status = 200, description = "One page of matching visit types", body = VisitTypePageRes),
        (status = 502, description = "Backend request failed")
    )
)]
/// Search visit types by display name
#[axum::debug_handler]
async fn search_visit_types(
    State(state): State<AppState>,
    Query(query): Query<VisitTypeQuery>,
) -> Result<Json<VisitTypePageRes>, ApiError> {
    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .visit_types
        .search(
            query.q.as_deref().unwrap_or_default(),
            query.page.unwrap_or(1),
            &token,
        )
        .await;
    guard.disarm();

    let page = completed("Search visit types", result)?;
    Ok(Json(VisitTypePageRes {
        results: page.results.into_iter().map(Into::into).collect(),
        current_page: page.current_page,
        page_size: page.page_size,
        total_items: page.total_items,
        total_pages: page.total_pages,
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/programs",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Program enrollments of the patient", body = [ProgramRes]),
        (status = 400, description = "Invalid identifier"),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn patient_programs(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> Result<Json<Vec<ProgramRes>>, ApiError> {
    let patient = parse_id(&patient_id)?;

    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state
        .services
        .programs
        .patient_programs(&patient, &token)
        .await;
    guard.disarm();

    let enrollments = completed("List patient programs", result)?;
    Ok(Json(enrollments.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Session of the configured backend user", body = SessionRes),
        (status = 502, description = "Backend request failed")
    )
)]
#[axum::debug_handler]
async fn current_session(State(state): State<AppState>) -> Result<Json<SessionRes>, ApiError> {
    let token = CancellationToken::new();
    let guard = token.drop_guard();
    let result = state.services.session.current_session(&token).await;
    guard.disarm();

    let session = completed("Get session", result)?;
    Ok(Json(session.into()))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_id(raw: &str) -> Result<ResourceId, ApiError> {
    ResourceId::new(raw).map_err(|e| {
        tracing::warn!("Invalid identifier {:?}: {}", raw, e);
        (StatusCode::BAD_REQUEST, "Invalid identifier")
    })
}

fn parse_form(req: AllergyReq) -> Result<AllergyInput, ApiError> {
    AllergyInput::try_from(AllergyForm::from(req)).map_err(|e| {
        tracing::warn!("Invalid allergy form: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid allergy form")
    })
}

fn passthrough<T: Serialize>(record: &T) -> Result<Json<PatientAllergyRes>, ApiError> {
    let allergy = serde_json::to_value(record).map_err(|e| {
        tracing::error!("Serialise allergy error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    })?;
    Ok(Json(PatientAllergyRes { allergy }))
}

/// Unwrap a service result, mapping failures and cancellation to HTTP errors.
fn completed<T>(context: &str, result: ChartResult<Outcome<T>>) -> Result<T, ApiError> {
    match result {
        Ok(Outcome::Completed(value)) => Ok(value),
        Ok(Outcome::Cancelled) => Err(cancelled()),
        Err(err) => Err(error_response(context, &err)),
    }
}

fn cancelled() -> ApiError {
    (StatusCode::SERVICE_UNAVAILABLE, "Request cancelled")
}

fn error_response(context: &str, err: &ChartError) -> ApiError {
    match err {
        ChartError::InvalidInput(_) | ChartError::InvalidIdentifier(_) => {
            tracing::warn!("{} rejected: {}", context, err);
            (StatusCode::BAD_REQUEST, "Invalid request")
        }
        ChartError::Status { status: 404, .. } => {
            tracing::warn!("{} not found: {}", context, err);
            (StatusCode::NOT_FOUND, "Not found")
        }
        ChartError::Transport(source) if source.is_timeout() => {
            tracing::error!("{} timed out: {:?}", context, err);
            (StatusCode::GATEWAY_TIMEOUT, "Backend timed out")
        }
        ChartError::Status { .. }
        | ChartError::Transport(_)
        | ChartError::Fhir(_)
        | ChartError::Openmrs(_) => {
            tracing::error!("{} error: {:?}", context, err);
            (StatusCode::BAD_GATEWAY, "Backend request failed")
        }
        ChartError::InvalidConfig(_)
        | ChartError::ClientBuild(_)
        | ChartError::Serialization(_) => {
            tracing::error!("{} error: {:?}", context, err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

//! Allergy records of a patient.
//!
//! Reads come from two places:
//! - the FHIR API, normalised into flat [`AllergyData`] view models
//! - the REST API, returned untouched as [`PatientAllergy`] for edit forms
//!
//! Writes (create, update, delete) go to the REST API. Write input is validated into an
//! [`AllergyInput`] before any request is built.
//!
//! Every operation takes a [`CancellationToken`]; see [`crate::client`] for how cancellation is
//! handled.

use crate::cancellation::{CancellationToken, Outcome};
use crate::client::ChartClient;
use crate::transport::Api;
use crate::{ChartError, ChartResult};
use chart_types::ResourceId;
use fhir::{AllergyData, AllergyIntolerance};
use openmrs::{AllergenType, AllergyPayload, Concept, ConceptMember, PatientAllergy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Allergy data access.
#[derive(Clone, Debug)]
pub struct AllergyService {
    client: ChartClient,
}

impl AllergyService {
    pub fn new(client: ChartClient) -> Self {
        Self { client }
    }

    /// Fetch and normalise the allergies recorded for `patient`.
    ///
    /// Resolves to `None` when the server reports no matches. Otherwise the records are ordered
    /// most recently updated first.
    pub async fn fetch_allergies(
        &self,
        patient: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<Option<Vec<AllergyData>>>> {
        let path = format!("AllergyIntolerance?patient={patient}");
        let outcome = self.client.get(Api::Fhir, path, token).await?;
        outcome.try_map(|response| {
            let records = AllergyIntolerance::parse_search(&response.body)?;
            tracing::debug!(
                %patient,
                count = records.as_ref().map_or(0, Vec::len),
                "fetched allergies"
            );
            Ok(records)
        })
    }

    /// Like [`fetch_allergies`](Self::fetch_allergies), but folds failures into the listing
    /// state shown by list views.
    pub async fn list_allergies(
        &self,
        patient: &ResourceId,
        token: &CancellationToken,
    ) -> Outcome<AllergyListing> {
        match self.fetch_allergies(patient, token).await {
            Ok(outcome) => outcome.map(AllergyListing::settled),
            Err(err) => {
                tracing::error!(%patient, error = %err, "failed to list allergies");
                Outcome::Completed(AllergyListing::failed(err))
            }
        }
    }

    /// Fetch a single allergy record by id and normalise it.
    pub async fn get_allergy(
        &self,
        allergy: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<AllergyData>> {
        let path = format!("AllergyIntolerance/{allergy}");
        let outcome = self.client.get(Api::Fhir, path, token).await?;
        outcome.try_map(|response| Ok(AllergyIntolerance::parse(&response.body)?))
    }

    /// Fetch the full REST representation of one of the patient's allergies.
    pub async fn get_patient_allergy(
        &self,
        patient: &ResourceId,
        allergy: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<PatientAllergy>> {
        let path = format!("patient/{patient}/allergy/{allergy}?v=full");
        let outcome = self.client.get(Api::Rest, path, token).await?;
        outcome.try_map(|response| Ok(openmrs::decode(&response.body, "PatientAllergy")?))
    }

    /// Members of the allergen concept set `concept`, in server order.
    pub async fn allergen_concept_members(
        &self,
        concept: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<Vec<ConceptMember>>> {
        let path = format!("concept/{concept}?v=full");
        let outcome = self.client.get(Api::Rest, path, token).await?;
        outcome.try_map(|response| {
            let concept: Concept = openmrs::decode(&response.body, "Concept")?;
            Ok(concept.into_members())
        })
    }

    /// Members of the configured reaction concept set.
    pub async fn reaction_concepts(
        &self,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<Vec<ConceptMember>>> {
        let concept = self.client.config().reaction_concept().clone();
        self.allergen_concept_members(&concept, token).await
    }

    pub async fn create_allergy(
        &self,
        input: &AllergyInput,
        patient: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<PatientAllergy>> {
        let path = format!("patient/{patient}/allergy");
        self.save(input, path, token).await
    }

    pub async fn update_allergy(
        &self,
        input: &AllergyInput,
        patient: &ResourceId,
        allergy: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<PatientAllergy>> {
        let path = format!("patient/{patient}/allergy/{allergy}");
        self.save(input, path, token).await
    }

    /// Delete one of the patient's allergies.
    ///
    /// A cancelled token sends nothing. If cancellation lands while the request is in flight the
    /// server may still have deleted the record; the outcome is `Cancelled` either way.
    pub async fn delete_allergy(
        &self,
        patient: &ResourceId,
        allergy: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<()>> {
        let path = format!("patient/{patient}/allergy/{allergy}");
        let outcome = self.client.delete(Api::Rest, path, token).await?;
        Ok(outcome.map(|_| ()))
    }

    async fn save(
        &self,
        input: &AllergyInput,
        path: String,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<PatientAllergy>> {
        let body = serde_json::to_value(input.payload()).map_err(ChartError::Serialization)?;
        let outcome = self.client.post(Api::Rest, path, body, token).await?;
        outcome.try_map(|response| Ok(openmrs::decode(&response.body, "PatientAllergy")?))
    }
}

/// State of an allergy list as shown by list views.
#[derive(Clone, Debug, Default)]
pub struct AllergyListing {
    /// `None` while loading, when there is no data, or after a failure.
    pub records: Option<Vec<AllergyData>>,
    pub is_loading: bool,
    pub is_revalidating: bool,
    pub error: Option<Arc<ChartError>>,
}

impl AllergyListing {
    /// Initial state, before the first fetch settles.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn settled(records: Option<Vec<AllergyData>>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn failed(error: ChartError) -> Self {
        Self {
            error: Some(Arc::new(error)),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Raw allergy form fields, as submitted by a client.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllergyForm {
    pub allergen_type: String,
    pub coded_allergen_uuid: String,
    pub severity_uuid: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub reaction_uuids: Vec<String>,
}

/// Validated input for creating or updating an allergy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllergyInput {
    allergen_type: AllergenType,
    coded_allergen: ResourceId,
    severity: ResourceId,
    comment: Option<String>,
    reactions: Vec<ResourceId>,
}

impl AllergyInput {
    pub fn allergen_type(&self) -> AllergenType {
        self.allergen_type
    }

    pub fn coded_allergen(&self) -> &ResourceId {
        &self.coded_allergen
    }

    pub fn severity(&self) -> &ResourceId {
        &self.severity
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn reactions(&self) -> &[ResourceId] {
        &self.reactions
    }

    /// Request body for the allergy write endpoints.
    pub fn payload(&self) -> AllergyPayload {
        AllergyPayload::new(
            self.allergen_type,
            &self.coded_allergen,
            &self.severity,
            self.comment.as_deref(),
            &self.reactions,
        )
    }
}

impl TryFrom<AllergyForm> for AllergyInput {
    type Error = ChartError;

    fn try_from(form: AllergyForm) -> Result<Self, Self::Error> {
        let allergen_type = form
            .allergen_type
            .parse::<AllergenType>()
            .map_err(|e| ChartError::InvalidInput(e.to_string()))?;
        let coded_allergen = field_id("codedAllergenUuid", &form.coded_allergen_uuid)?;
        let severity = field_id("severityUuid", &form.severity_uuid)?;
        let reactions = form
            .reaction_uuids
            .iter()
            .map(|r| field_id("reactionUuids", r))
            .collect::<ChartResult<Vec<_>>>()?;
        let comment = form
            .comment
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());

        Ok(Self {
            allergen_type,
            coded_allergen,
            severity,
            comment,
            reactions,
        })
    }
}

fn field_id(field: &str, value: &str) -> ChartResult<ResourceId> {
    ResourceId::new(value).map_err(|e| ChartError::InvalidInput(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::test_support::{Reply, ScriptedTransport};
    use crate::transport::Method;
    use serde_json::json;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s).expect("valid id")
    }

    fn service(transport: &Arc<ScriptedTransport>) -> AllergyService {
        let config = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");
        AllergyService::new(ChartClient::new(Arc::new(config), transport.clone()))
    }

    fn form() -> AllergyForm {
        AllergyForm {
            allergen_type: "drug".into(),
            coded_allergen_uuid: "penicillin".into(),
            severity_uuid: "severe".into(),
            comment: Some("  since childhood ".into()),
            reaction_uuids: vec!["r1".into(), "r2".into()],
        }
    }

    const PENICILLIN_BUNDLE: &str = r#"{
        "resourceType": "Bundle",
        "total": 1,
        "entry": [{"resource": {
            "resourceType": "AllergyIntolerance",
            "id": "a1",
            "meta": {"lastUpdated": "2024-03-01T10:00:00+00:00"},
            "clinicalStatus": {"coding": [{"display": "Active"}]},
            "criticality": "high",
            "code": {"coding": [{"display": "Penicillin"}]},
            "reaction": [{
                "substance": {"coding": [{"display": "x"}, {"display": "Penicillin G"}]},
                "manifestation": [{"coding": [{"display": "Rash"}]}, {"coding": [{"display": "Hives"}]}],
                "severity": "severe"
            }]
        }}]
    }"#;

    #[tokio::test]
    async fn lists_normalised_allergies() {
        let transport = ScriptedTransport::with_replies([Reply::json(200, PENICILLIN_BUNDLE)]);
        let listing = service(&transport)
            .list_allergies(&id("p1"), &CancellationToken::new())
            .await
            .completed()
            .expect("not cancelled");

        assert!(!listing.is_loading);
        assert!(!listing.is_error());
        let records = listing.records.expect("records present");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id.as_deref(), Some("a1"));
        assert_eq!(record.display.as_deref(), Some("Penicillin"));
        assert_eq!(record.reaction_to_substance.as_deref(), Some("Penicillin G"));
        assert_eq!(
            record.reaction_manifestations,
            Some(vec!["Rash".to_string(), "Hives".to_string()])
        );
        assert_eq!(record.reaction_severity.as_deref(), Some("Severe"));

        let request = &transport.requests()[0];
        assert_eq!(request.api, Api::Fhir);
        assert_eq!(request.path, "AllergyIntolerance?patient=p1");
    }

    #[tokio::test]
    async fn empty_bundle_is_no_data() {
        let transport = ScriptedTransport::with_replies([Reply::json(
            200,
            r#"{"resourceType": "Bundle", "total": 0}"#,
        )]);
        let listing = service(&transport)
            .list_allergies(&id("p1"), &CancellationToken::new())
            .await
            .completed()
            .expect("not cancelled");

        assert!(listing.records.is_none());
        assert!(!listing.is_loading);
        assert!(!listing.is_error());
    }

    #[tokio::test]
    async fn listing_orders_most_recent_first() {
        let bundle = json!({
            "resourceType": "Bundle",
            "total": 3,
            "entry": [
                {"resource": {"id": "a", "meta": {"lastUpdated": "2024-01-01T00:00:00+00:00"}}},
                {"resource": {"id": "b", "meta": {"lastUpdated": "2024-06-01T00:00:00+00:00"}}},
                {"resource": {"id": "c", "meta": {"lastUpdated": "2024-03-01T00:00:00+00:00"}}}
            ]
        });
        let transport = ScriptedTransport::with_replies([Reply::json(200, &bundle.to_string())]);

        let records = service(&transport)
            .fetch_allergies(&id("p1"), &CancellationToken::new())
            .await
            .expect("fetch succeeds")
            .completed()
            .flatten()
            .expect("records present");

        let ids: Vec<_> = records.iter().map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("b"), Some("c"), Some("a")]);
    }

    #[tokio::test]
    async fn server_failure_becomes_error_listing() {
        let transport = ScriptedTransport::with_replies([Reply::json(500, "boom")]);
        let listing = service(&transport)
            .list_allergies(&id("p1"), &CancellationToken::new())
            .await
            .completed()
            .expect("not cancelled");

        assert!(listing.is_error());
        assert!(listing.records.is_none());
        assert!(!listing.is_loading);
        let status = listing.error.as_ref().and_then(|e| e.status());
        assert_eq!(status, Some(500));
    }

    #[tokio::test]
    async fn gets_single_allergy_by_id() {
        let transport = ScriptedTransport::with_replies([Reply::json(
            200,
            r#"{"resourceType": "AllergyIntolerance", "id": "a9", "criticality": "low"}"#,
        )]);
        let record = service(&transport)
            .get_allergy(&id("a9"), &CancellationToken::new())
            .await
            .expect("get succeeds")
            .completed()
            .expect("not cancelled");

        assert_eq!(record.id.as_deref(), Some("a9"));
        assert_eq!(record.criticality.as_deref(), Some("low"));
        assert!(record.reaction_manifestations.is_none());
        assert_eq!(transport.requests()[0].path, "AllergyIntolerance/a9");
    }

    #[tokio::test]
    async fn returns_raw_patient_allergy() {
        let transport = ScriptedTransport::with_replies([Reply::json(
            200,
            r#"{"uuid": "a1", "display": "Penicillin", "allergen": {"allergenType": "DRUG"}, "auditInfo": {"creator": "admin"}}"#,
        )]);
        let allergy = service(&transport)
            .get_patient_allergy(&id("p1"), &id("a1"), &CancellationToken::new())
            .await
            .expect("get succeeds")
            .completed()
            .expect("not cancelled");

        assert_eq!(allergy.uuid, "a1");
        assert!(allergy.extra.contains_key("auditInfo"));
        let request = &transport.requests()[0];
        assert_eq!(request.api, Api::Rest);
        assert_eq!(request.path, "patient/p1/allergy/a1?v=full");
    }

    #[tokio::test]
    async fn reaction_concepts_use_configured_set() {
        let transport = ScriptedTransport::with_replies([Reply::json(
            200,
            r#"{"uuid": "162555AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", "setMembers": [{"uuid": "m1", "display": "Rash"}]}"#,
        )]);
        let members = service(&transport)
            .reaction_concepts(&CancellationToken::new())
            .await
            .expect("fetch succeeds")
            .completed()
            .expect("not cancelled");

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].display.as_deref(), Some("Rash"));
        assert_eq!(
            transport.requests()[0].path,
            "concept/162555AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA?v=full"
        );
    }

    #[tokio::test]
    async fn create_posts_wrapped_reactions() {
        let transport = ScriptedTransport::with_replies([Reply::json(200, r#"{"uuid": "new"}"#)]);
        let input = AllergyInput::try_from(form()).expect("valid form");

        let created = service(&transport)
            .create_allergy(&input, &id("p1"), &CancellationToken::new())
            .await
            .expect("create succeeds")
            .completed()
            .expect("not cancelled");
        assert_eq!(created.uuid, "new");

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "patient/p1/allergy");
        assert_eq!(
            request.body,
            Some(json!({
                "allergen": {"allergenType": "DRUG", "codedAllergen": {"uuid": "penicillin"}},
                "severity": {"uuid": "severe"},
                "comment": "since childhood",
                "reactions": [{"reaction": {"uuid": "r1"}}, {"reaction": {"uuid": "r2"}}]
            }))
        );
    }

    #[tokio::test]
    async fn update_posts_to_allergy_path() {
        let transport = ScriptedTransport::with_replies([Reply::json(200, r#"{"uuid": "a1"}"#)]);
        let input = AllergyInput::try_from(form()).expect("valid form");

        let outcome = service(&transport)
            .update_allergy(&input, &id("p1"), &id("a1"), &CancellationToken::new())
            .await
            .expect("update succeeds");
        assert!(!outcome.is_cancelled());
        assert_eq!(transport.requests()[0].path, "patient/p1/allergy/a1");
    }

    #[tokio::test]
    async fn delete_sends_delete_request() {
        let transport = ScriptedTransport::with_replies([Reply::json(204, "")]);
        let outcome = service(&transport)
            .delete_allergy(&id("p1"), &id("a1"), &CancellationToken::new())
            .await
            .expect("delete succeeds");

        assert_eq!(outcome, Outcome::Completed(()));
        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.path, "patient/p1/allergy/a1");
    }

    #[tokio::test]
    async fn delete_with_cancelled_token_sends_nothing() {
        let transport = ScriptedTransport::with_replies([Reply::json(204, "")]);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = service(&transport)
            .delete_allergy(&id("p1"), &id("a1"), &token)
            .await
            .expect("cancellation is not an error");

        assert!(outcome.is_cancelled());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn delete_cancelled_in_flight_resolves_cancelled() {
        let transport = ScriptedTransport::with_replies([Reply::Hang]);
        let service = service(&transport);
        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            async move {
                tokio::task::yield_now().await;
                token.cancel();
            }
        };

        let patient = id("p1");
        let allergy = id("a1");
        let (outcome, ()) = tokio::join!(
            service.delete_allergy(&patient, &allergy, &token),
            canceller
        );

        assert!(outcome.expect("cancellation is not an error").is_cancelled());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn late_response_after_cancel_is_discarded() {
        let token = CancellationToken::new();
        let transport =
            ScriptedTransport::with_replies([Reply::CancelThenRespond(token.clone(), 200)]);

        let outcome = service(&transport).list_allergies(&id("p1"), &token).await;
        assert!(outcome.is_cancelled());
    }

    #[test]
    fn form_validation_rejects_bad_fields() {
        let unknown_type = AllergyForm {
            allergen_type: "pollen".into(),
            ..form()
        };
        let err = AllergyInput::try_from(unknown_type).expect_err("unknown type");
        assert!(err.is_invalid_input());

        let blank_severity = AllergyForm {
            severity_uuid: "  ".into(),
            ..form()
        };
        let err = AllergyInput::try_from(blank_severity).expect_err("blank severity");
        assert!(err.to_string().contains("severityUuid"));

        let bad_reaction = AllergyForm {
            reaction_uuids: vec!["r1".into(), String::new()],
            ..form()
        };
        assert!(AllergyInput::try_from(bad_reaction).is_err());
    }

    #[test]
    fn blank_comment_is_dropped() {
        let input = AllergyInput::try_from(AllergyForm {
            comment: Some("   ".into()),
            reaction_uuids: vec![],
            ..form()
        })
        .expect("valid form");

        assert!(input.comment().is_none());
        let body = serde_json::to_value(input.payload()).expect("serialise payload");
        assert!(body.get("comment").is_none());
        assert_eq!(body["reactions"], json!([]));
    }
}

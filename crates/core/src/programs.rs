//! Care program enrollments.

use crate::cancellation::{CancellationToken, Outcome};
use crate::client::ChartClient;
use crate::transport::Api;
use crate::ChartResult;
use chart_types::ResourceId;
use openmrs::{PatientProgram, Program, ProgramsFetchResponse, Results};

#[derive(Clone, Debug)]
pub struct ProgramService {
    client: ChartClient,
}

impl ProgramService {
    pub fn new(client: ChartClient) -> Self {
        Self { client }
    }

    /// Programs the patient is or was enrolled in.
    pub async fn patient_programs(
        &self,
        patient: &ResourceId,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<Vec<PatientProgram>>> {
        let path = format!("programenrollment?patient={patient}&v=full");
        let outcome = self.client.get(Api::Rest, path, token).await?;
        outcome.try_map(|response| {
            let enrollments: ProgramsFetchResponse =
                openmrs::decode(&response.body, "Program enrollment list")?;
            Ok(enrollments.results)
        })
    }

    /// Every program a patient can be enrolled in.
    pub async fn programs(&self, token: &CancellationToken) -> ChartResult<Outcome<Vec<Program>>> {
        let outcome = self.client.get(Api::Rest, "program?v=full", token).await?;
        outcome.try_map(|response| {
            let programs: Results<Program> = openmrs::decode(&response.body, "Program list")?;
            Ok(programs.results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::test_support::{Reply, ScriptedTransport};
    use crate::ChartError;
    use std::sync::Arc;

    fn service(transport: &Arc<ScriptedTransport>) -> ProgramService {
        let config = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");
        ProgramService::new(ChartClient::new(Arc::new(config), transport.clone()))
    }

    #[tokio::test]
    async fn fetches_patient_enrollments() {
        let body = r#"{"results": [{
            "uuid": "e1",
            "display": "HIV Care and Treatment",
            "program": {"uuid": "prog1", "name": "HIV Care and Treatment"},
            "dateEnrolled": "2021-06-01T00:00:00.000+0000",
            "dateCompleted": null
        }]}"#;
        let transport = ScriptedTransport::with_replies([Reply::json(200, body)]);

        let enrollments = service(&transport)
            .patient_programs(&ResourceId::new("p1").expect("id"), &CancellationToken::new())
            .await
            .expect("fetch succeeds")
            .completed()
            .expect("not cancelled");

        assert_eq!(enrollments.len(), 1);
        assert!(enrollments[0].is_active());
        assert_eq!(
            transport.requests()[0].path,
            "programenrollment?patient=p1&v=full"
        );
    }

    #[tokio::test]
    async fn malformed_enrollment_reports_path() {
        let body = r#"{"results": [{"uuid": "e1", "display": "x", "program": {"uuid": "p", "name": "n"}, "dateEnrolled": "yesterday"}]}"#;
        let transport = ScriptedTransport::with_replies([Reply::json(200, body)]);

        let err = service(&transport)
            .patient_programs(&ResourceId::new("p1").expect("id"), &CancellationToken::new())
            .await
            .expect_err("bad date");

        assert!(matches!(err, ChartError::Openmrs(_)));
        assert!(err.to_string().contains("dateEnrolled"));
    }

    #[tokio::test]
    async fn lists_available_programs() {
        let body = r#"{"results": [{"uuid": "prog1", "display": "TB Program", "concept": {"uuid": "c1", "display": "TB"}}]}"#;
        let transport = ScriptedTransport::with_replies([Reply::json(200, body)]);

        let programs = service(&transport)
            .programs(&CancellationToken::new())
            .await
            .expect("fetch succeeds")
            .completed()
            .expect("not cancelled");

        assert_eq!(programs[0].concept.display, "TB");
        assert_eq!(transport.requests()[0].path, "program?v=full");
    }
}

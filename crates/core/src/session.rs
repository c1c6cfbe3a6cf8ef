use crate::cancellation::{CancellationToken, Outcome};
use crate::client::ChartClient;
use crate::transport::Api;
use crate::ChartResult;
use openmrs::SessionData;

/// Session of the configured user.
#[derive(Clone, Debug)]
pub struct SessionService {
    client: ChartClient,
}

impl SessionService {
    pub fn new(client: ChartClient) -> Self {
        Self { client }
    }

    pub async fn current_session(
        &self,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<SessionData>> {
        let outcome = self.client.get(Api::Rest, "session", token).await?;
        outcome.try_map(|response| Ok(openmrs::decode(&response.body, "Session")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::test_support::{Reply, ScriptedTransport};
    use std::sync::Arc;

    #[tokio::test]
    async fn reads_anonymous_session() {
        let transport =
            ScriptedTransport::with_replies([Reply::json(200, r#"{"authenticated": false}"#)]);
        let config = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");
        let service = SessionService::new(ChartClient::new(Arc::new(config), transport.clone()));

        let session = service
            .current_session(&CancellationToken::new())
            .await
            .expect("fetch succeeds")
            .completed()
            .expect("not cancelled");

        assert!(!session.authenticated);
        assert!(session.user.is_none());
        assert_eq!(transport.requests()[0].path, "session");
    }
}

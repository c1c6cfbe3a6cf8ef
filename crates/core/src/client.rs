//! Shared request pipeline for the chart services.
//!
//! [`ChartClient`] wraps a [`Transport`] with the behaviour every service relies on:
//! - a cancelled token stops a request before it is sent
//! - cancellation while a request is in flight abandons it
//! - a response arriving after cancellation is discarded
//! - non-2xx responses become [`ChartError::Status`]

use crate::cancellation::{run_cancellable, CancellationToken, Outcome};
use crate::config::CoreConfig;
use crate::transport::{Api, ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::{ChartError, ChartResult};
use std::sync::Arc;

/// Longest response body excerpt kept on a [`ChartError::Status`].
const ERROR_BODY_LIMIT: usize = 2_048;

#[derive(Clone)]
pub struct ChartClient {
    transport: Arc<dyn Transport>,
    config: Arc<CoreConfig>,
}

impl ChartClient {
    pub fn new(config: Arc<CoreConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    /// Client talking HTTP to the configured server.
    pub fn connect(config: Arc<CoreConfig>) -> ChartResult<Self> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub async fn get(
        &self,
        api: Api,
        path: impl Into<String>,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<ApiResponse>> {
        self.send(ApiRequest::get(api, path), token).await
    }

    pub async fn post(
        &self,
        api: Api,
        path: impl Into<String>,
        body: serde_json::Value,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<ApiResponse>> {
        self.send(ApiRequest::post(api, path, body), token).await
    }

    pub async fn delete(
        &self,
        api: Api,
        path: impl Into<String>,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<ApiResponse>> {
        self.send(ApiRequest::delete(api, path), token).await
    }

    /// Send `request` unless `token` is cancelled, and check the response status.
    pub async fn send(
        &self,
        request: ApiRequest,
        token: &CancellationToken,
    ) -> ChartResult<Outcome<ApiResponse>> {
        let method = request.method;
        let path = request.path.clone();

        if token.is_cancelled() {
            tracing::debug!(%method, %path, "request cancelled before sending");
            return Ok(Outcome::Cancelled);
        }

        tracing::debug!(%method, %path, "sending request");
        let response = match run_cancellable(token, self.transport.send(request)).await {
            Outcome::Completed(result) => result?,
            Outcome::Cancelled => {
                tracing::debug!(%method, %path, "request cancelled in flight");
                return Ok(Outcome::Cancelled);
            }
        };

        if token.is_cancelled() {
            tracing::debug!(%method, %path, status = response.status, "discarding late response");
            return Ok(Outcome::Cancelled);
        }

        if !response.is_success() {
            tracing::warn!(%method, %path, status = response.status, "request failed");
            let body = String::from_utf8_lossy(&response.body);
            return Err(ChartError::Status {
                method,
                path,
                status: response.status,
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        Ok(Outcome::Completed(response))
    }
}

impl std::fmt::Debug for ChartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, ScriptedTransport};
    use crate::transport::Method;

    fn client(transport: &Arc<ScriptedTransport>) -> ChartClient {
        let config = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");
        ChartClient::new(Arc::new(config), transport.clone())
    }

    #[tokio::test]
    async fn passes_successful_responses_through() {
        let transport = ScriptedTransport::with_replies([Reply::json(200, "{}")]);
        let outcome = client(&transport)
            .get(Api::Rest, "session", &CancellationToken::new())
            .await
            .expect("request succeeds");

        let response = outcome.completed().expect("not cancelled");
        assert_eq!(response.body, b"{}");
        assert_eq!(transport.requests()[0].path, "session");
    }

    #[tokio::test]
    async fn maps_error_status_to_error() {
        let transport =
            ScriptedTransport::with_replies([Reply::json(404, r#"{"error": {"message": "gone"}}"#)]);
        let err = client(&transport)
            .delete(Api::Rest, "patient/p/allergy/a", &CancellationToken::new())
            .await
            .expect_err("404 is an error");

        match err {
            ChartError::Status {
                method,
                path,
                status,
                body,
            } => {
                assert_eq!(method, Method::Delete);
                assert_eq!(path, "patient/p/allergy/a");
                assert_eq!(status, 404);
                assert!(body.contains("gone"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_token_sends_nothing() {
        let transport = ScriptedTransport::with_replies([Reply::json(200, "{}")]);
        let token = CancellationToken::new();
        token.cancel();

        let outcome = client(&transport)
            .post(Api::Rest, "patient/p/allergy", serde_json::json!({}), &token)
            .await
            .expect("cancellation is not an error");

        assert!(outcome.is_cancelled());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn late_response_is_discarded() {
        let token = CancellationToken::new();
        let transport =
            ScriptedTransport::with_replies([Reply::CancelThenRespond(token.clone(), 200)]);

        let outcome = client(&transport)
            .get(Api::Fhir, "AllergyIntolerance/a1", &token)
            .await
            .expect("cancellation is not an error");

        assert!(outcome.is_cancelled());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn late_error_is_discarded_too() {
        let token = CancellationToken::new();
        let transport =
            ScriptedTransport::with_replies([Reply::CancelThenRespond(token.clone(), 500)]);

        let outcome = client(&transport)
            .get(Api::Fhir, "AllergyIntolerance/a1", &token)
            .await
            .expect("cancellation wins over the late status");
        assert!(outcome.is_cancelled());
    }
}

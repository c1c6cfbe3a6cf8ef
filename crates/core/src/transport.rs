//! Request transport.
//!
//! Services describe requests as [`ApiRequest`] values and hand them to a [`Transport`]. The
//! production transport is [`HttpTransport`] (reqwest); tests substitute a scripted in-memory
//! transport. A transport only moves bytes: status checking, cancellation and decoding happen in
//! [`crate::client::ChartClient`].

use crate::config::CoreConfig;
use crate::{ChartError, ChartResult};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::sync::Arc;

/// Backend API a request is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Api {
    /// FHIR R4 clinical-resource API.
    Fhir,
    /// Legacy REST record API.
    Rest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    pub api: Api,
    pub method: Method,
    /// Path relative to the API root, optionally with a query string.
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(api: Api, path: impl Into<String>) -> Self {
        Self {
            api,
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(api: Api, path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            api,
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(api: Api, path: impl Into<String>) -> Self {
        Self {
            api,
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the clinical backend.
///
/// Implementations must be cancel-safe: dropping the returned future abandons the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ChartResult<ApiResponse>;
}

/// Transport over HTTP using reqwest.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    config: Arc<CoreConfig>,
}

impl HttpTransport {
    /// Build a transport honouring the configured timeout and credentials.
    pub fn new(config: Arc<CoreConfig>) -> ChartResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ChartError::ClientBuild)?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ChartResult<ApiResponse> {
        let url = self.config.resolve(request.api, &request.path)?;

        let mut builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Delete => self.http.delete(url),
        }
        .header(ACCEPT, "application/json");

        if let Some(credentials) = self.config.credentials() {
            builder = builder.basic_auth(credentials.username(), Some(credentials.password()));
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ChartError::Transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(ChartError::Transport)?;

        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Binaries read environment variables; services only ever see a
//! validated [`CoreConfig`].

use crate::constants::{
    ALLERGY_REACTION_CONCEPT, DEFAULT_TIMEOUT_SECS, FHIR_BASE_PATH, REST_BASE_PATH,
};
use crate::transport::Api;
use crate::{ChartError, ChartResult};
use chart_types::{NonEmptyText, ResourceId};
use reqwest::Url;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    base_url: Url,
    credentials: Option<Credentials>,
    reaction_concept: ResourceId,
    timeout: Duration,
}

/// Basic-auth credentials for the clinical backend.
#[derive(Clone)]
pub struct Credentials {
    username: NonEmptyText,
    password: String,
}

impl Credentials {
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl CoreConfig {
    /// Create a new `CoreConfig` for the server rooted at `base_url`
    /// (for example `https://emr.example.org/openmrs`).
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::InvalidConfig`] if the URL does not parse, is not `http`/`https`,
    /// or carries a query or fragment.
    pub fn new(base_url: &str) -> ChartResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ChartError::InvalidConfig("base URL cannot be empty".into()));
        }

        let base_url = Url::parse(trimmed)
            .map_err(|e| ChartError::InvalidConfig(format!("invalid base URL '{trimmed}': {e}")))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ChartError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }
        if base_url.query().is_some() || base_url.fragment().is_some() {
            return Err(ChartError::InvalidConfig(
                "base URL cannot carry a query or fragment".into(),
            ));
        }

        Ok(Self {
            base_url,
            credentials: None,
            reaction_concept: ResourceId::new(ALLERGY_REACTION_CONCEPT)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Authenticate every request with basic auth.
    pub fn with_credentials(mut self, username: &str, password: &str) -> ChartResult<Self> {
        let username = NonEmptyText::new(username)
            .map_err(|_| ChartError::InvalidConfig("username cannot be empty".into()))?;
        self.credentials = Some(Credentials {
            username,
            password: password.to_owned(),
        });
        Ok(self)
    }

    /// Override the concept set listed by `reaction_concepts`.
    pub fn with_reaction_concept(mut self, concept: &str) -> ChartResult<Self> {
        self.reaction_concept = ResourceId::new(concept)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn reaction_concept(&self) -> &ResourceId {
        &self.reaction_concept
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a path relative to one of the backend APIs into an absolute URL.
    ///
    /// `path` may carry a query string (`AllergyIntolerance?patient=...`). Paths with a `.` or
    /// `..` segment are refused so a request cannot leave the API prefix.
    pub fn resolve(&self, api: Api, path: &str) -> ChartResult<Url> {
        let route = path.split(['?', '#']).next().unwrap_or_default();
        if route.split('/').any(|segment| matches!(segment, "." | "..")) {
            return Err(ChartError::InvalidInput(format!(
                "request path '{path}' contains a dot segment"
            )));
        }
        let prefix = match api {
            Api::Fhir => FHIR_BASE_PATH,
            Api::Rest => REST_BASE_PATH,
        };
        let raw = format!(
            "{}{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            prefix,
            path.trim_start_matches('/')
        );
        Url::parse(&raw).map_err(|e| ChartError::InvalidInput(format!("invalid request URL '{raw}': {e}")))
    }
}

/// Raw configuration values as read from the environment by a binary.
#[derive(Clone, Debug, Default)]
pub struct EnvValues {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub reaction_concept: Option<String>,
    pub timeout_secs: Option<String>,
}

impl EnvValues {
    /// Read the `CHART_*` variables from the process environment.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            base_url: var("CHART_BASE_URL"),
            username: var("CHART_USERNAME"),
            password: var("CHART_PASSWORD"),
            reaction_concept: var("CHART_REACTION_CONCEPT"),
            timeout_secs: var("CHART_TIMEOUT_SECS"),
        }
    }
}

/// Build a [`CoreConfig`] from environment values.
///
/// `base_url` is required. Credentials are used only when a username is set. Blank optional
/// values fall back to their defaults.
pub fn config_from_env_values(values: EnvValues) -> ChartResult<CoreConfig> {
    let non_blank = |v: Option<String>| v.filter(|v| !v.trim().is_empty());

    let base_url = non_blank(values.base_url)
        .ok_or_else(|| ChartError::InvalidConfig("CHART_BASE_URL must be set".into()))?;
    let mut config =
        CoreConfig::new(&base_url)?.with_timeout(timeout_from_env_value(values.timeout_secs)?);

    if let Some(username) = non_blank(values.username) {
        config = config.with_credentials(&username, &values.password.unwrap_or_default())?;
    }
    if let Some(concept) = non_blank(values.reaction_concept) {
        config = config.with_reaction_concept(&concept)?;
    }
    Ok(config)
}

/// Parse the request timeout from an optional environment value in whole seconds.
///
/// If `value` is `None` or empty/whitespace, returns the default timeout.
pub fn timeout_from_env_value(value: Option<String>) -> ChartResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        Some(v) => match v.parse::<u64>() {
            Ok(0) => Err(ChartError::InvalidConfig("timeout must be at least 1 second".into())),
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => Err(ChartError::InvalidConfig(format!(
                "timeout must be a whole number of seconds, got '{v}'"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_fhir_and_rest_paths() {
        let cfg = CoreConfig::new("https://emr.example.org/openmrs/").expect("valid config");

        let fhir = cfg
            .resolve(Api::Fhir, "AllergyIntolerance?patient=abc")
            .expect("fhir url");
        assert_eq!(
            fhir.as_str(),
            "https://emr.example.org/openmrs/ws/fhir2/R4/AllergyIntolerance?patient=abc"
        );

        let rest = cfg
            .resolve(Api::Rest, "/patient/p1/allergy/a1?v=full")
            .expect("rest url");
        assert_eq!(
            rest.as_str(),
            "https://emr.example.org/openmrs/ws/rest/v1/patient/p1/allergy/a1?v=full"
        );
    }

    #[test]
    fn refuses_dot_segments_in_paths() {
        let cfg = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");

        for path in ["patient/p1/allergy/..", "patient/p1/./allergy", "../session"] {
            assert!(
                matches!(cfg.resolve(Api::Rest, path), Err(ChartError::InvalidInput(_))),
                "{path} should be refused"
            );
        }

        let url = cfg
            .resolve(Api::Fhir, "AllergyIntolerance?patient=p1&note=../x")
            .expect("dots in the query are left alone");
        assert!(url.path().ends_with("/ws/fhir2/R4/AllergyIntolerance"));
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(CoreConfig::new("  "), Err(ChartError::InvalidConfig(_))));
        assert!(matches!(CoreConfig::new("not a url"), Err(ChartError::InvalidConfig(_))));
        assert!(matches!(
            CoreConfig::new("ftp://emr.example.org"),
            Err(ChartError::InvalidConfig(_))
        ));
        assert!(matches!(
            CoreConfig::new("https://emr.example.org/openmrs?x=1"),
            Err(ChartError::InvalidConfig(_))
        ));
    }

    #[test]
    fn defaults_reaction_concept_and_timeout() {
        let cfg = CoreConfig::new("http://localhost:8080/openmrs").expect("valid config");
        assert_eq!(cfg.reaction_concept().as_str(), ALLERGY_REACTION_CONCEPT);
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(cfg.credentials().is_none());
    }

    #[test]
    fn credentials_are_redacted_in_debug_output() {
        let cfg = CoreConfig::new("http://localhost:8080/openmrs")
            .and_then(|c| c.with_credentials("admin", "Admin123"))
            .expect("valid config");
        let debug = format!("{cfg:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("Admin123"));
    }

    #[test]
    fn rejects_blank_username() {
        let err = CoreConfig::new("http://localhost:8080/openmrs")
            .and_then(|c| c.with_credentials(" ", "secret"))
            .expect_err("blank username");
        assert!(matches!(err, ChartError::InvalidConfig(_)));
    }

    #[test]
    fn parses_timeout_values() {
        assert_eq!(
            timeout_from_env_value(None).expect("default"),
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        );
        assert_eq!(
            timeout_from_env_value(Some(" 5 ".into())).expect("five"),
            Duration::from_secs(5)
        );
        assert!(timeout_from_env_value(Some("0".into())).is_err());
        assert!(timeout_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn builds_config_from_env_values() {
        let cfg = config_from_env_values(EnvValues {
            base_url: Some("http://localhost:8080/openmrs".into()),
            username: Some("admin".into()),
            password: Some("Admin123".into()),
            reaction_concept: Some(" ".into()),
            timeout_secs: Some("10".into()),
        })
        .expect("valid values");

        assert_eq!(cfg.credentials().map(Credentials::username), Some("admin"));
        assert_eq!(cfg.reaction_concept().as_str(), ALLERGY_REACTION_CONCEPT);
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn missing_base_url_is_a_config_error() {
        let err = config_from_env_values(EnvValues::default()).expect_err("base url required");
        assert!(err.to_string().contains("CHART_BASE_URL"));
    }
}

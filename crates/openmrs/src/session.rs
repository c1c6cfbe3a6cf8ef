//! Session wire model (`GET /session`).

use crate::{DisplayMetadata, Links};
use serde::{Deserialize, Serialize};

/// The authenticated session of the configured user.
///
/// An anonymous session carries only `authenticated: false`; everything else is then absent.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub authenticated: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_provider: Option<CurrentProvider>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_location: Option<SessionLocation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,

    #[serde(default)]
    pub privileges: Vec<DisplayMetadata>,

    #[serde(default)]
    pub roles: Vec<DisplayMetadata>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentProvider {
    pub uuid: String,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<DisplayMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub attributes: Vec<serde_json::Value>,
    #[serde(default)]
    pub retired: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SessionLocation {
    pub uuid: String,
    pub display: String,
    #[serde(default)]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SessionUser {
    pub uuid: String,
    pub display: String,
    pub username: String,
}

impl SessionData {
    /// Whether the session grants the named privilege.
    pub fn has_privilege(&self, name: &str) -> bool {
        self.privileges
            .iter()
            .any(|p| p.display.as_deref() == Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    #[test]
    fn reads_authenticated_session() {
        let json = br#"{
            "authenticated": true,
            "locale": "en_GB",
            "currentProvider": {"uuid": "f9badd80", "display": "UNKNOWN - Super User", "identifier": "UNKNOWN", "attributes": [], "retired": false},
            "sessionLocation": {"uuid": "44c3efb0", "display": "Inpatient Ward", "name": "Inpatient Ward"},
            "user": {"uuid": "45ce6c2e", "display": "admin", "username": ""},
            "privileges": [{"uuid": "p1", "display": "Edit Allergies"}],
            "roles": [{"uuid": "r1", "display": "System Developer"}]
        }"#;

        let session: SessionData = decode(json, "SessionData").expect("decode session");
        assert!(session.authenticated);
        assert_eq!(session.user.as_ref().map(|u| u.display.as_str()), Some("admin"));
        assert!(session.has_privilege("Edit Allergies"));
        assert!(!session.has_privilege("Delete Patients"));
    }

    #[test]
    fn reads_anonymous_session() {
        let session: SessionData =
            decode(br#"{"authenticated": false}"#, "SessionData").expect("decode session");
        assert!(!session.authenticated);
        assert!(session.user.is_none());
        assert!(session.privileges.is_empty());
    }
}

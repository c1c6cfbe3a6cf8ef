//! Patient allergy wire models.
//!
//! Two shapes live here:
//! - [`PatientAllergy`], the full representation returned by
//!   `GET /patient/{patient}/allergy/{allergy}?v=full`. It is passed to callers untouched.
//! - [`AllergyPayload`], the body of the create and update requests.

use crate::{DisplayMetadata, Links, OpenmrsError};
use chart_types::ResourceId;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Category of an allergen, as understood by the allergy API.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllergenType {
    Drug,
    Food,
    Environment,
    Other,
}

impl AllergenType {
    /// Wire form of the allergen type.
    pub fn as_wire(self) -> &'static str {
        match self {
            AllergenType::Drug => "DRUG",
            AllergenType::Food => "FOOD",
            AllergenType::Environment => "ENVIRONMENT",
            AllergenType::Other => "OTHER",
        }
    }
}

impl FromStr for AllergenType {
    type Err = OpenmrsError;

    /// Parse an allergen type, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRUG" => Ok(AllergenType::Drug),
            "FOOD" => Ok(AllergenType::Food),
            "ENVIRONMENT" => Ok(AllergenType::Environment),
            "OTHER" => Ok(AllergenType::Other),
            other => Err(OpenmrsError::InvalidInput(format!(
                "unknown allergen type '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for AllergenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_wire())
    }
}

// ============================================================================
// Read model
// ============================================================================

/// Full representation of a patient allergy.
///
/// Fields the chart does not name are kept in `extra` so the record can be handed on without
/// loss.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientAllergy {
    pub uuid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergen: Option<AllergenWire>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<DisplayMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub reactions: Vec<ReactionWire>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllergenWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allergen_type: Option<AllergenType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coded_allergen: Option<DisplayMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_coded_allergen: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReactionWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<DisplayMetadata>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_non_coded: Option<String>,
}

// ============================================================================
// Write model
// ============================================================================

/// A `{"uuid": ...}` reference in a write payload.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct UuidRef {
    pub uuid: ResourceId,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllergenPayload {
    pub allergen_type: AllergenType,
    pub coded_allergen: UuidRef,
}

/// Reaction envelope required by the allergy API: `{"reaction": {"uuid": ...}}`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ReactionPayload {
    pub reaction: UuidRef,
}

/// Body of `POST /patient/{patient}/allergy[/{allergy}]`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AllergyPayload {
    pub allergen: AllergenPayload,
    pub severity: UuidRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub reactions: Vec<ReactionPayload>,
}

impl AllergyPayload {
    /// Assemble a payload, wrapping each reaction concept in its envelope.
    pub fn new<'a>(
        allergen_type: AllergenType,
        coded_allergen: &ResourceId,
        severity: &ResourceId,
        comment: Option<&str>,
        reactions: impl IntoIterator<Item = &'a ResourceId>,
    ) -> Self {
        Self {
            allergen: AllergenPayload {
                allergen_type,
                coded_allergen: UuidRef {
                    uuid: coded_allergen.clone(),
                },
            },
            severity: UuidRef {
                uuid: severity.clone(),
            },
            comment: comment.map(str::to_owned),
            reactions: reactions
                .into_iter()
                .map(|r| ReactionPayload {
                    reaction: UuidRef { uuid: r.clone() },
                })
                .collect(),
        }
    }
}

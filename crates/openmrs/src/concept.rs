//! Concept and concept-set wire models.
//!
//! Allergens and reactions are offered to the user as members of well-known concept sets.
//! `GET /concept/{uuid}?v=full` returns the set with its members under `setMembers`.

use crate::Links;
use serde::{Deserialize, Serialize};

/// A concept set as returned by the full representation.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub uuid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Members of the set. Concepts that are not sets have none.
    #[serde(default)]
    pub set_members: Vec<ConceptMember>,
}

/// A member of a concept set.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ConceptMember {
    pub uuid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,
}

impl Concept {
    pub fn into_members(self) -> Vec<ConceptMember> {
        self.set_members
    }
}

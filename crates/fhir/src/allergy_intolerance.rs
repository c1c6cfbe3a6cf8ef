//! FHIR-aligned allergy wire models and normalisation.
//!
//! This module provides both the flat view model for allergy records and the nested wire model
//! returned by the clinical-resource API.
//!
//! Responsibilities:
//! - Define the public view model ([`AllergyData`]) consumed by chart UIs
//! - Define a lenient wire model for deserialisation
//! - Flatten wire records into view models without ever failing on missing fields
//! - Order lists of view models by recency
//!
//! Notes:
//! - Only the first `reaction` of a record is normalised. Downstream views render a single
//!   reaction per allergy, so later reactions are ignored.
//! - The reacting substance is read from the *second* coding of `reaction[0].substance`. The
//!   server puts the concept reference first and the human-readable substance second.

use crate::bundle::parse_bundle;
use crate::{check_resource_type, decode, decode_value, FhirResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// Flat view model of an allergy record.
///
/// Every field is optional: a record missing any nested field still normalises, with the
/// corresponding field left as `None`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllergyData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display text of the first clinical status coding (e.g. `Active`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_status: Option<String>,

    /// Criticality code as sent by the server (`low`, `high`, `unable-to-assess`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<String>,

    /// Allergen name, from the first coding of `code`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder_type: Option<String>,

    /// Text of the first note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_to_substance: Option<String>,

    /// Manifestations of the first reaction, in source order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_manifestations: Option<Vec<String>>,

    /// Severity of the first reaction, capitalised (`severe` becomes `Severe`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_severity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Sort allergy records so the most recently updated come first.
///
/// Timestamps are compared as strings, which orders ISO 8601 values chronologically when they
/// share an offset. The sort is stable: records with equal timestamps keep their input order.
/// Records without a timestamp go last.
pub fn sort_by_recency(records: &mut [AllergyData]) {
    records.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
}

// ============================================================================
// Public AllergyIntolerance operations
// ============================================================================

/// AllergyIntolerance resource operations.
///
/// This is a zero-sized type used for namespacing allergy-related operations.
pub struct AllergyIntolerance;

impl AllergyIntolerance {
    /// Parse a single `AllergyIntolerance` resource from JSON and normalise it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if:
    /// - the body is not JSON or any present field has an unexpected type,
    /// - `resourceType` is present and is not `AllergyIntolerance`.
    pub fn parse(json: &[u8]) -> FhirResult<AllergyData> {
        let wire: AllergyIntoleranceWire = decode(json, "AllergyIntolerance")?;
        check_resource_type(wire.resource_type.as_deref(), "AllergyIntolerance")?;
        Ok(wire_to_domain(wire))
    }

    /// Parse an `AllergyIntolerance` search bundle and normalise its entries.
    ///
    /// # Returns
    ///
    /// - `None` when the bundle reports no matches (`total` absent or zero)
    /// - otherwise every entry normalised and ordered by [`sort_by_recency`]
    ///
    /// Entries without a `resource` normalise to an all-`None` record rather than being dropped.
    /// Entries the server added to report on the search (`search.mode` of `outcome`) and
    /// resources of any other type are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError`] if the bundle, or any allergy in it, is structurally invalid.
    pub fn parse_search(json: &[u8]) -> FhirResult<Option<Vec<AllergyData>>> {
        let bundle = parse_bundle::<serde_json::Value>(json)?;
        if bundle.total() == 0 {
            return Ok(None);
        }

        let mut records = Vec::new();
        for (index, entry) in bundle.entries().enumerate() {
            if entry.is_outcome() {
                continue;
            }
            let Some(resource) = entry.resource else {
                records.push(AllergyData::default());
                continue;
            };
            let declared = resource.get("resourceType").and_then(serde_json::Value::as_str);
            if declared.is_some_and(|found| found != "AllergyIntolerance") {
                continue;
            }
            let what = format!("AllergyIntolerance (entry {index})");
            let wire: AllergyIntoleranceWire = decode_value(resource, &what)?;
            records.push(wire_to_domain(wire));
        }

        sort_by_recency(&mut records);
        Ok(Some(records))
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Wire representation of an `AllergyIntolerance` resource.
///
/// Every field is optional and nullable. Unknown fields are ignored.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllergyIntoleranceWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_status: Option<CodeableConceptWire>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub criticality: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConceptWire>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorder: Option<ReferenceWire>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Vec<AnnotationWire>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Vec<ReactionWire>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaWire>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CodeableConceptWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coding: Option<Vec<CodingWire>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CodingWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReferenceWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct AnnotationWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReactionWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub substance: Option<CodeableConceptWire>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifestation: Option<Vec<CodeableConceptWire>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetaWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

impl CodeableConceptWire {
    /// Display text of the coding at `index`, if both exist.
    fn display_at(&self, index: usize) -> Option<String> {
        self.coding.as_ref()?.get(index)?.display.clone()
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

/// Flatten a wire record into the view model.
pub fn wire_to_domain(wire: AllergyIntoleranceWire) -> AllergyData {
    let first_reaction = wire.reaction.as_ref().and_then(|r| r.first());

    let reaction_manifestations = first_reaction
        .and_then(|r| r.manifestation.as_ref())
        .map(|manifestations| {
            manifestations
                .iter()
                .filter_map(|m| m.display_at(0))
                .collect::<Vec<_>>()
        });

    AllergyData {
        id: wire.id,
        clinical_status: wire.clinical_status.as_ref().and_then(|c| c.display_at(0)),
        criticality: wire.criticality,
        display: wire.code.as_ref().and_then(|c| c.display_at(0)),
        recorded_date: wire.recorded_date,
        recorded_by: wire.recorder.as_ref().and_then(|r| r.display.clone()),
        recorder_type: wire.recorder.as_ref().and_then(|r| r.type_.clone()),
        note: wire
            .note
            .as_ref()
            .and_then(|notes| notes.first())
            .and_then(|n| n.text.clone()),
        reaction_to_substance: first_reaction
            .and_then(|r| r.substance.as_ref())
            .and_then(|s| s.display_at(1)),
        reaction_manifestations,
        reaction_severity: first_reaction
            .and_then(|r| r.severity.as_deref())
            .and_then(capitalize),
        last_updated: wire.meta.and_then(|m| m.last_updated),
    }
}

/// Upper-case the first character and lower-case the rest. Blank input yields `None`.
fn capitalize(value: &str) -> Option<String> {
    let lower = value.to_lowercase();
    let mut chars = lower.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

//! FHIR search bundle wire model.
//!
//! A search against `<Type>?<params>` answers with a `Bundle` of type `searchset`. Only `total`,
//! `entry[].resource` and `entry[].search.mode` are read; paging links are ignored because the
//! chart asks for a single page of results.

use crate::{check_resource_type, decode, FhirResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Wire representation of a search bundle carrying resources of type `R`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleWire<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<Vec<EntryWire<R>>>,
}

/// Wire representation of a single bundle entry.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryWire<R> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<R>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<EntrySearchWire>,
}

/// Why an entry is in a search bundle: `match`, `include` or `outcome`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct EntrySearchWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl<R> EntryWire<R> {
    /// Whether the server added this entry to report on the search itself (usually an
    /// `OperationOutcome`) rather than as a result.
    pub fn is_outcome(&self) -> bool {
        self.search
            .as_ref()
            .and_then(|search| search.mode.as_deref())
            == Some("outcome")
    }
}

impl<R> BundleWire<R> {
    /// Matches reported by the server. Absent totals count as zero.
    pub fn total(&self) -> u64 {
        self.total.unwrap_or(0)
    }

    /// Resources carried by the bundle in server order.
    ///
    /// Entries without a resource are passed through as `None` so the caller decides whether a
    /// hollow entry should be dropped or normalised as an empty record.
    pub fn into_resources(self) -> impl Iterator<Item = Option<R>> {
        self.entries().map(|e| e.resource)
    }

    /// Entries carried by the bundle in server order.
    pub fn entries(self) -> impl Iterator<Item = EntryWire<R>> {
        self.entry.unwrap_or_default().into_iter()
    }
}

/// Parse a search bundle from JSON bytes.
///
/// # Errors
///
/// Returns [`crate::FhirError`] if the body is not JSON, does not match the bundle shape, or
/// declares a `resourceType` other than `Bundle`.
pub fn parse_bundle<R: DeserializeOwned>(json: &[u8]) -> FhirResult<BundleWire<R>> {
    let bundle: BundleWire<R> = decode(json, "Bundle")?;
    check_resource_type(bundle.resource_type.as_deref(), "Bundle")?;
    Ok(bundle)
}

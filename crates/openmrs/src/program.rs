//! Program enrollment wire models (`GET /programenrollment?patient=...&v=full`).

use crate::{DisplayMetadata, Links, Results};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub type ProgramsFetchResponse = Results<PatientProgram>;

/// A patient's enrollment in a care program.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientProgram {
    pub uuid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<DisplayMetadata>,

    pub program: EnrolledProgram,

    pub display: String,

    #[serde(with = "crate::datetime")]
    pub date_enrolled: DateTime<FixedOffset>,

    /// `None` while the enrollment is still active.
    #[serde(default, with = "crate::datetime::option")]
    pub date_completed: Option<DateTime<FixedOffset>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<EnrollmentLocation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voided: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DisplayMetadata>,

    #[serde(default)]
    pub states: Vec<serde_json::Value>,

    #[serde(default)]
    pub links: Links,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl PatientProgram {
    pub fn is_active(&self) -> bool {
        self.date_completed.is_none() && !self.voided.unwrap_or(false)
    }
}

/// The program an enrollment refers to, with its workflows.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledProgram {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub all_workflows: Vec<Workflow>,
    #[serde(default)]
    pub links: Links,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub uuid: String,
    pub concept: DisplayMetadata,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub states: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct EnrollmentLocation {
    pub uuid: String,
    pub display: String,
    #[serde(default)]
    pub links: Links,
}

/// A program that a patient can be enrolled in (`GET /program`).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    pub uuid: String,
    pub display: String,
    #[serde(default)]
    pub all_workflows: Vec<WorkflowLinks>,
    pub concept: ProgramConcept,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct WorkflowLinks {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Links,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProgramConcept {
    pub uuid: String,
    pub display: String,
}

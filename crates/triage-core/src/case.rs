//! Cases and case templates, as far as alerts interact with them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{
  alert::{CustomFields, Severity, Tlp},
  observable::Observable,
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[strum(serialize_all = "PascalCase")]
pub enum CaseStatus {
  #[default]
  Open,
  Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
  pub case_id:       Uuid,
  pub organisation:  String,
  /// Per-organisation sequence number, starting at 1.
  pub number:        u64,
  pub title:         String,
  pub description:   String,
  pub severity:      Severity,
  pub tlp:           Tlp,
  pub tags:          BTreeSet<String>,
  pub flag:          bool,
  pub custom_fields: CustomFields,
  pub status:        CaseStatus,
  pub case_template: Option<String>,
  pub created_by:    String,
  pub created_at:    DateTime<Utc>,
  pub updated_by:    Option<String>,
  pub updated_at:    Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseWithObservables {
  #[serde(flatten)]
  pub case:        Case,
  pub observables: Vec<Observable>,
}

/// Named prefill bundle applied when an alert becomes a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseTemplate {
  pub name:          String,
  pub organisation:  String,
  pub title_prefix:  Option<String>,
  pub description:   Option<String>,
  pub severity:      Option<Severity>,
  pub tlp:           Option<Tlp>,
  pub tags:          BTreeSet<String>,
  pub flag:          bool,
  pub custom_fields: CustomFields,
}

impl CaseTemplate {
  pub fn new(organisation: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      name:          name.into(),
      organisation:  organisation.into(),
      title_prefix:  None,
      description:   None,
      severity:      None,
      tlp:           None,
      tags:          BTreeSet::new(),
      flag:          false,
      custom_fields: CustomFields::new(),
    }
  }
}

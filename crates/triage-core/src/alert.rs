//! Alert types: the organisation-scoped records raised by detection sources.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::observable::{Observable, ObservableSubmission};

// ─── Enumerations ────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
  Low,
  #[default]
  Medium,
  High,
  Critical,
}

/// Traffic Light Protocol marking.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Tlp {
  White,
  Green,
  #[default]
  Amber,
  Red,
}

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
pub enum AlertStatus {
  #[default]
  New,
  Updated,
  Ignored,
  Imported,
}

/// A typed custom field value. Field names are the keys of the owning map, so
/// a name can only ever carry one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CustomFieldValue {
  String(String),
  Integer(i64),
  Float(f64),
  Boolean(bool),
  Date(DateTime<Utc>),
}

pub type CustomFields = BTreeMap<String, CustomFieldValue>;

// ─── Alert ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
  pub alert_id:      Uuid,
  pub organisation:  String,
  #[serde(rename = "type")]
  pub alert_type:    String,
  pub source:        String,
  pub source_ref:    String,
  pub title:         String,
  pub description:   String,
  pub severity:      Severity,
  pub tlp:           Tlp,
  /// When the event happened, as reported by the source.
  pub date:          DateTime<Utc>,
  pub tags:          BTreeSet<String>,
  pub custom_fields: CustomFields,
  pub status:        AlertStatus,
  pub read:          bool,
  pub follow:        bool,
  /// Set once the alert has been merged into or imported as a case.
  pub case_id:       Option<Uuid>,
  pub case_template: Option<String>,
  pub created_by:    String,
  pub created_at:    DateTime<Utc>,
  pub updated_by:    Option<String>,
  pub updated_at:    Option<DateTime<Utc>>,
}

/// An alert together with its observables, ordered by submission position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertWithObservables {
  #[serde(flatten)]
  pub alert:       Alert,
  pub observables: Vec<Observable>,
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// Input to [`crate::workflow::AlertWorkflow::create`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlert {
  #[serde(rename = "type")]
  pub alert_type:    String,
  pub source:        String,
  pub source_ref:    String,
  pub title:         String,
  #[serde(default)]
  pub description:   String,
  #[serde(default)]
  pub severity:      Severity,
  #[serde(default)]
  pub tlp:           Tlp,
  pub date:          Option<DateTime<Utc>>,
  #[serde(default)]
  pub tags:          BTreeSet<String>,
  #[serde(default)]
  pub custom_fields: CustomFields,
  pub case_template: Option<String>,
  #[serde(default)]
  pub observables:   Vec<ObservableSubmission>,
}

impl NewAlert {
  /// Minimal request with every optional field at its default.
  pub fn new(
    alert_type: impl Into<String>,
    source: impl Into<String>,
    source_ref: impl Into<String>,
    title: impl Into<String>,
  ) -> Self {
    Self {
      alert_type:    alert_type.into(),
      source:        source.into(),
      source_ref:    source_ref.into(),
      title:         title.into(),
      description:   String::new(),
      severity:      Severity::default(),
      tlp:           Tlp::default(),
      date:          None,
      tags:          BTreeSet::new(),
      custom_fields: CustomFields::new(),
      case_template: None,
      observables:   Vec::new(),
    }
  }
}

/// Field-level changes accepted by
/// [`crate::workflow::AlertWorkflow::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertUpdate {
  pub title:         Option<String>,
  pub description:   Option<String>,
  pub severity:      Option<Severity>,
  pub tlp:           Option<Tlp>,
  pub tags:          Option<BTreeSet<String>>,
  /// Merged into the existing map; a present key overwrites its value.
  pub custom_fields: Option<CustomFields>,
  pub status:        Option<AlertStatus>,
}

impl AlertUpdate {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.severity.is_none()
      && self.tlp.is_none()
      && self.tags.is_none()
      && self.custom_fields.is_none()
      && self.status.is_none()
  }

  /// Apply the changes to `alert`. Returns whether anything was present to
  /// apply; update metadata is the caller's concern.
  pub fn apply(self, alert: &mut Alert) -> bool {
    if self.is_empty() {
      return false;
    }
    if let Some(title) = self.title {
      alert.title = title;
    }
    if let Some(description) = self.description {
      alert.description = description;
    }
    if let Some(severity) = self.severity {
      alert.severity = severity;
    }
    if let Some(tlp) = self.tlp {
      alert.tlp = tlp;
    }
    if let Some(tags) = self.tags {
      alert.tags = tags;
    }
    if let Some(fields) = self.custom_fields {
      alert.custom_fields.extend(fields);
    }
    if let Some(status) = self.status {
      alert.status = status;
    }
    true
  }
}

/// Parameters for listing the alerts visible to an actor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
  pub status: Option<AlertStatus>,
  pub read:   Option<bool>,
  pub follow: Option<bool>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

//! Observables: evidence attached to an alert or a case.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{alert::Tlp, attachment::Attachment};

/// The entity an observable belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ObservableOwner {
  Alert(Uuid),
  Case(Uuid),
}

/// What an observable carries: an inline value or a stored attachment,
/// never both and never neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservableData {
  Value(String),
  Attachment(Attachment),
}

impl ObservableData {
  /// Key used to recognise the same evidence on two owners: the inline value
  /// or the attachment digest.
  pub fn identity(&self) -> &str {
    match self {
      Self::Value(v) => v,
      Self::Attachment(a) => a.hash.as_str(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observable {
  pub observable_id: Uuid,
  pub owner:         ObservableOwner,
  pub data_type:     String,
  pub data:          ObservableData,
  pub message:       Option<String>,
  pub tags:          BTreeSet<String>,
  pub ioc:           bool,
  pub sighted:       bool,
  pub tlp:           Tlp,
  /// Order of the observable among its owner's observables.
  pub position:      u32,
  pub created_by:    String,
  pub created_at:    DateTime<Utc>,
}

impl Observable {
  /// Same evidence re-homed under another owner.
  pub fn copy_to(
    &self,
    owner: ObservableOwner,
    position: u32,
    actor: &str,
    at: DateTime<Utc>,
  ) -> Self {
    Self {
      observable_id: Uuid::new_v4(),
      owner,
      position,
      created_by: actor.to_owned(),
      created_at: at,
      ..self.clone()
    }
  }
}

/// One observable as submitted with an alert. For attachment types `data`
/// holds `filename;contentType;base64Value`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservableSubmission {
  pub data_type: String,
  pub data:      Option<String>,
  pub message:   Option<String>,
  #[serde(default)]
  pub tags:      BTreeSet<String>,
  #[serde(default)]
  pub ioc:       bool,
  #[serde(default)]
  pub sighted:   bool,
  pub tlp:       Option<Tlp>,
}

impl ObservableSubmission {
  pub fn new(data_type: impl Into<String>, data: Option<&str>) -> Self {
    Self {
      data_type: data_type.into(),
      data: data.map(str::to_owned),
      ..Default::default()
    }
  }
}

/// A catalog entry for an observable data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservableType {
  pub name:          String,
  pub is_attachment: bool,
}

/// Types registered in a fresh store.
pub const DEFAULT_OBSERVABLE_TYPES: &[(&str, bool)] = &[
  ("autonomous-system", false),
  ("domain", false),
  ("file", true),
  ("filename", false),
  ("fqdn", false),
  ("hash", false),
  ("hostname", false),
  ("ip", false),
  ("mail", false),
  ("mail-subject", false),
  ("other", false),
  ("regexp", false),
  ("registry", false),
  ("uri_path", false),
  ("url", false),
  ("user-agent", false),
];

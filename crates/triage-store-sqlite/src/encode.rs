//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings, enums use their `strum` string forms,
//! and sets/maps are compact JSON. UUIDs are hyphenated lowercase strings.

use std::{collections::BTreeSet, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use triage_core::{
  alert::{Alert, CustomFields},
  attachment::{Attachment, ContentHash},
  audit::{AuditEntry, AuditOutcome},
  case::{Case, CaseTemplate},
  observable::{Observable, ObservableData, ObservableOwner},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// Fixed-width so that column order is chronological order.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

/// Parse a `strum` string form back into its enum.
pub fn decode_enum<T: FromStr>(s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {} {s:?}", std::any::type_name::<T>())))
}

pub fn encode_tags(tags: &BTreeSet<String>) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

pub fn decode_tags(s: &str) -> Result<BTreeSet<String>> { Ok(serde_json::from_str(s)?) }

pub fn encode_fields(fields: &CustomFields) -> Result<String> {
  Ok(serde_json::to_string(fields)?)
}

pub fn decode_fields(s: &str) -> Result<CustomFields> { Ok(serde_json::from_str(s)?) }

pub fn encode_owner(owner: ObservableOwner) -> (&'static str, String) {
  match owner {
    ObservableOwner::Alert(id) => ("alert", encode_uuid(id)),
    ObservableOwner::Case(id) => ("case", encode_uuid(id)),
  }
}

fn decode_owner(kind: &str, id: &str) -> Result<ObservableOwner> {
  let id = decode_uuid(id)?;
  match kind {
    "alert" => Ok(ObservableOwner::Alert(id)),
    "case" => Ok(ObservableOwner::Case(id)),
    other => Err(Error::Decode(format!("unknown owner kind {other:?}"))),
  }
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

pub const ALERT_COLUMNS: &str = "alert_id, organisation, alert_type, source, source_ref,
  title, description, severity, tlp, date, tags, custom_fields, status, read, follow,
  case_id, case_template, created_by, created_at, updated_by, updated_at";

/// Raw strings read directly from an `alerts` row.
pub struct RawAlert {
  pub alert_id:      String,
  pub organisation:  String,
  pub alert_type:    String,
  pub source:        String,
  pub source_ref:    String,
  pub title:         String,
  pub description:   String,
  pub severity:      String,
  pub tlp:           String,
  pub date:          String,
  pub tags:          String,
  pub custom_fields: String,
  pub status:        String,
  pub read:          bool,
  pub follow:        bool,
  pub case_id:       Option<String>,
  pub case_template: Option<String>,
  pub created_by:    String,
  pub created_at:    String,
  pub updated_by:    Option<String>,
  pub updated_at:    Option<String>,
}

impl RawAlert {
  /// Expects the columns in [`ALERT_COLUMNS`] order.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      alert_id:      row.get(0)?,
      organisation:  row.get(1)?,
      alert_type:    row.get(2)?,
      source:        row.get(3)?,
      source_ref:    row.get(4)?,
      title:         row.get(5)?,
      description:   row.get(6)?,
      severity:      row.get(7)?,
      tlp:           row.get(8)?,
      date:          row.get(9)?,
      tags:          row.get(10)?,
      custom_fields: row.get(11)?,
      status:        row.get(12)?,
      read:          row.get(13)?,
      follow:        row.get(14)?,
      case_id:       row.get(15)?,
      case_template: row.get(16)?,
      created_by:    row.get(17)?,
      created_at:    row.get(18)?,
      updated_by:    row.get(19)?,
      updated_at:    row.get(20)?,
    })
  }

  pub fn into_alert(self) -> Result<Alert> {
    Ok(Alert {
      alert_id:      decode_uuid(&self.alert_id)?,
      organisation:  self.organisation,
      alert_type:    self.alert_type,
      source:        self.source,
      source_ref:    self.source_ref,
      title:         self.title,
      description:   self.description,
      severity:      decode_enum(&self.severity)?,
      tlp:           decode_enum(&self.tlp)?,
      date:          decode_dt(&self.date)?,
      tags:          decode_tags(&self.tags)?,
      custom_fields: decode_fields(&self.custom_fields)?,
      status:        decode_enum(&self.status)?,
      read:          self.read,
      follow:        self.follow,
      case_id:       self.case_id.as_deref().map(decode_uuid).transpose()?,
      case_template: self.case_template,
      created_by:    self.created_by,
      created_at:    decode_dt(&self.created_at)?,
      updated_by:    self.updated_by,
      updated_at:    self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

// ─── Observables ─────────────────────────────────────────────────────────────

pub const OBSERVABLE_COLUMNS: &str = "observable_id, owner_kind, owner_id, data_type,
  value, attachment_hash, attachment_name, attachment_content_type, attachment_size,
  message, tags, ioc, sighted, tlp, position, created_by, created_at";

pub struct RawObservable {
  pub observable_id:           String,
  pub owner_kind:              String,
  pub owner_id:                String,
  pub data_type:               String,
  pub value:                   Option<String>,
  pub attachment_hash:         Option<String>,
  pub attachment_name:         Option<String>,
  pub attachment_content_type: Option<String>,
  pub attachment_size:         Option<i64>,
  pub message:                 Option<String>,
  pub tags:                    String,
  pub ioc:                     bool,
  pub sighted:                 bool,
  pub tlp:                     String,
  pub position:                i64,
  pub created_by:              String,
  pub created_at:              String,
}

impl RawObservable {
  /// Expects the columns in [`OBSERVABLE_COLUMNS`] order.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      observable_id:           row.get(0)?,
      owner_kind:              row.get(1)?,
      owner_id:                row.get(2)?,
      data_type:               row.get(3)?,
      value:                   row.get(4)?,
      attachment_hash:         row.get(5)?,
      attachment_name:         row.get(6)?,
      attachment_content_type: row.get(7)?,
      attachment_size:         row.get(8)?,
      message:                 row.get(9)?,
      tags:                    row.get(10)?,
      ioc:                     row.get(11)?,
      sighted:                 row.get(12)?,
      tlp:                     row.get(13)?,
      position:                row.get(14)?,
      created_by:              row.get(15)?,
      created_at:              row.get(16)?,
    })
  }

  pub fn into_observable(self) -> Result<Observable> {
    let data = match (self.value, self.attachment_hash) {
      (Some(value), None) => ObservableData::Value(value),
      (None, Some(hash)) => ObservableData::Attachment(Attachment {
        hash:         ContentHash::parse(&hash)
          .ok_or_else(|| Error::Decode(format!("content hash {hash:?}")))?,
        filename:     self.attachment_name.unwrap_or_default(),
        content_type: self.attachment_content_type.unwrap_or_default(),
        size:         self.attachment_size.unwrap_or_default() as u64,
      }),
      _ => {
        return Err(Error::Decode(format!(
          "observable {} must hold exactly one of value or attachment",
          self.observable_id
        )));
      }
    };

    Ok(Observable {
      observable_id: decode_uuid(&self.observable_id)?,
      owner: decode_owner(&self.owner_kind, &self.owner_id)?,
      data_type: self.data_type,
      data,
      message: self.message,
      tags: decode_tags(&self.tags)?,
      ioc: self.ioc,
      sighted: self.sighted,
      tlp: decode_enum(&self.tlp)?,
      position: self.position as u32,
      created_by: self.created_by,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

// ─── Cases ───────────────────────────────────────────────────────────────────

pub const CASE_COLUMNS: &str = "case_id, organisation, number, title, description,
  severity, tlp, tags, flag, custom_fields, status, case_template, created_by,
  created_at, updated_by, updated_at";

pub struct RawCase {
  pub case_id:       String,
  pub organisation:  String,
  pub number:        i64,
  pub title:         String,
  pub description:   String,
  pub severity:      String,
  pub tlp:           String,
  pub tags:          String,
  pub flag:          bool,
  pub custom_fields: String,
  pub status:        String,
  pub case_template: Option<String>,
  pub created_by:    String,
  pub created_at:    String,
  pub updated_by:    Option<String>,
  pub updated_at:    Option<String>,
}

impl RawCase {
  /// Expects the columns in [`CASE_COLUMNS`] order.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:       row.get(0)?,
      organisation:  row.get(1)?,
      number:        row.get(2)?,
      title:         row.get(3)?,
      description:   row.get(4)?,
      severity:      row.get(5)?,
      tlp:           row.get(6)?,
      tags:          row.get(7)?,
      flag:          row.get(8)?,
      custom_fields: row.get(9)?,
      status:        row.get(10)?,
      case_template: row.get(11)?,
      created_by:    row.get(12)?,
      created_at:    row.get(13)?,
      updated_by:    row.get(14)?,
      updated_at:    row.get(15)?,
    })
  }

  pub fn into_case(self) -> Result<Case> {
    Ok(Case {
      case_id:       decode_uuid(&self.case_id)?,
      organisation:  self.organisation,
      number:        self.number as u64,
      title:         self.title,
      description:   self.description,
      severity:      decode_enum(&self.severity)?,
      tlp:           decode_enum(&self.tlp)?,
      tags:          decode_tags(&self.tags)?,
      flag:          self.flag,
      custom_fields: decode_fields(&self.custom_fields)?,
      status:        decode_enum(&self.status)?,
      case_template: self.case_template,
      created_by:    self.created_by,
      created_at:    decode_dt(&self.created_at)?,
      updated_by:    self.updated_by,
      updated_at:    self.updated_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawCaseTemplate {
  pub organisation:  String,
  pub name:          String,
  pub title_prefix:  Option<String>,
  pub description:   Option<String>,
  pub severity:      Option<String>,
  pub tlp:           Option<String>,
  pub tags:          String,
  pub flag:          bool,
  pub custom_fields: String,
}

impl RawCaseTemplate {
  pub fn into_template(self) -> Result<CaseTemplate> {
    Ok(CaseTemplate {
      name:          self.name,
      organisation:  self.organisation,
      title_prefix:  self.title_prefix,
      description:   self.description,
      severity:      self.severity.as_deref().map(decode_enum).transpose()?,
      tlp:           self.tlp.as_deref().map(decode_enum).transpose()?,
      tags:          decode_tags(&self.tags)?,
      flag:          self.flag,
      custom_fields: decode_fields(&self.custom_fields)?,
    })
  }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

pub struct RawAuditEntry {
  pub audit_id:    String,
  pub operation:   String,
  pub target_id:   String,
  pub actor:       String,
  pub recorded_at: String,
  pub outcome:     String,
}

impl RawAuditEntry {
  pub fn into_entry(self) -> Result<AuditEntry> {
    let outcome: AuditOutcome = serde_json::from_str(&self.outcome)?;
    Ok(AuditEntry {
      audit_id: decode_uuid(&self.audit_id)?,
      operation: decode_enum(&self.operation)?,
      target_id: self.target_id,
      actor: self.actor,
      recorded_at: decode_dt(&self.recorded_at)?,
      outcome,
    })
  }
}

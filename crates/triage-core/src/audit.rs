//! Best-effort audit trail.
//!
//! Audit recording never fails the workflow that triggered it. Each attempt
//! yields an item in an [`AuditReport`]; failures are logged at `warn` and
//! otherwise only visible through the report.
//!
//! An entry's [`AuditOutcome`] says whether the audited action itself went
//! through. Refused or failed actions are recorded with
//! [`AuditEntry::failure`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, permission::Actor, store::AuditSink};

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AuditOperation {
  CreateAlert,
  AttachObservable,
  UpdateAlert,
  DeleteAlert,
  MarkAsRead,
  MarkAsUnread,
  FollowAlert,
  UnfollowAlert,
  MergeInCase,
  CreateCase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum AuditOutcome {
  Success,
  Failure { detail: String },
}

/// One state-changing action. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
  pub audit_id:    Uuid,
  pub operation:   AuditOperation,
  pub target_id:   String,
  pub actor:       String,
  pub recorded_at: DateTime<Utc>,
  pub outcome:     AuditOutcome,
}

impl AuditEntry {
  pub fn success(
    operation: AuditOperation,
    target_id: impl ToString,
    actor: &Actor,
  ) -> Self {
    Self::new(operation, target_id, actor, AuditOutcome::Success)
  }

  /// An attempted action that was refused or failed; `detail` is the error
  /// text the caller saw.
  pub fn failure(
    operation: AuditOperation,
    target_id: impl ToString,
    actor: &Actor,
    detail: impl Into<String>,
  ) -> Self {
    let outcome = AuditOutcome::Failure { detail: detail.into() };
    Self::new(operation, target_id, actor, outcome)
  }

  fn new(
    operation: AuditOperation,
    target_id: impl ToString,
    actor: &Actor,
    outcome: AuditOutcome,
  ) -> Self {
    Self {
      audit_id: Uuid::new_v4(),
      operation,
      target_id: target_id.to_string(),
      actor: actor.user_id.clone(),
      recorded_at: Utc::now(),
      outcome,
    }
  }
}

/// Per-entry outcomes of a batch of audit writes.
#[derive(Debug, Default)]
pub struct AuditReport {
  pub results: Vec<(AuditOperation, String, Result<(), String>)>,
}

impl AuditReport {
  pub fn failures(&self) -> usize {
    self.results.iter().filter(|(_, _, r)| r.is_err()).count()
  }

  pub fn is_clean(&self) -> bool { self.failures() == 0 }
}

/// Collects audit writes for one workflow invocation.
#[derive(Debug, Default)]
pub struct AuditRecorder {
  report: AuditReport,
}

impl AuditRecorder {
  pub fn new() -> Self { Self::default() }

  /// Attempt to write `entry` to `sink`. A failed write is logged and kept
  /// in the report; it is never returned.
  pub fn record<S: AuditSink + ?Sized>(&mut self, sink: &mut S, entry: AuditEntry) {
    let result = sink.append_audit(&entry).map_err(|e: Error| {
      tracing::warn!(
        operation = %entry.operation,
        target = %entry.target_id,
        error = %e,
        "failed to record audit entry"
      );
      e.to_string()
    });
    self.report.results.push((entry.operation, entry.target_id, result));
  }

  pub fn finish(self) -> AuditReport {
    if !self.report.is_clean() {
      tracing::warn!(
        failures = self.report.failures(),
        total = self.report.results.len(),
        "audit trail incomplete"
      );
    }
    self.report
  }
}

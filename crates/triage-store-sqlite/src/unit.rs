//! [`SqliteUnit`]: the repository traits over one open SQLite transaction.
//!
//! Every method here runs synchronously on the tokio-rusqlite connection
//! thread, inside the transaction opened by
//! [`crate::SqliteStore`]'s `transact`.

use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension as _, params};
use triage_core::{
  Result as CoreResult,
  alert::{Alert, AlertFilter},
  attachment::ContentHash,
  audit::AuditEntry,
  case::{Case, CaseTemplate},
  observable::{Observable, ObservableData, ObservableOwner, ObservableType},
  store::{
    AlertRepository, AuditSink, BlobStore, CaseRepository, Catalog,
    ObservableRepository,
  },
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    ALERT_COLUMNS, CASE_COLUMNS, OBSERVABLE_COLUMNS, RawAlert, RawAuditEntry,
    RawCase, RawCaseTemplate, RawObservable, encode_dt, encode_fields,
    encode_owner, encode_tags, encode_uuid,
  },
};

pub struct SqliteUnit<'c> {
  conn: &'c Connection,
}

impl<'c> SqliteUnit<'c> {
  pub fn new(conn: &'c Connection) -> Self { Self { conn } }

  fn write_alert(&self, alert: &Alert, insert: bool) -> Result<()> {
    let sql = if insert {
      "INSERT INTO alerts (
         alert_id, organisation, alert_type, source, source_ref, title,
         description, severity, tlp, date, tags, custom_fields, status, read,
         follow, case_id, case_template, created_by, created_at, updated_by,
         updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
    } else {
      "UPDATE alerts SET
         organisation = ?2, alert_type = ?3, source = ?4, source_ref = ?5,
         title = ?6, description = ?7, severity = ?8, tlp = ?9, date = ?10,
         tags = ?11, custom_fields = ?12, status = ?13, read = ?14,
         follow = ?15, case_id = ?16, case_template = ?17, created_by = ?18,
         created_at = ?19, updated_by = ?20, updated_at = ?21
       WHERE alert_id = ?1"
    };

    let result = self.conn.execute(sql, params![
      encode_uuid(alert.alert_id),
      alert.organisation,
      alert.alert_type,
      alert.source,
      alert.source_ref,
      alert.title,
      alert.description,
      alert.severity.to_string(),
      alert.tlp.to_string(),
      encode_dt(alert.date),
      encode_tags(&alert.tags)?,
      encode_fields(&alert.custom_fields)?,
      alert.status.to_string(),
      alert.read,
      alert.follow,
      alert.case_id.map(encode_uuid),
      alert.case_template,
      alert.created_by,
      encode_dt(alert.created_at),
      alert.updated_by,
      alert.updated_at.map(encode_dt),
    ]);

    match result {
      Ok(0) => Err(triage_core::Error::not_found("alert", alert.alert_id).into()),
      Ok(_) => Ok(()),
      Err(rusqlite::Error::SqliteFailure(e, _))
        if e.code == ErrorCode::ConstraintViolation =>
      {
        Err(Error::Conflict(format!(
          "alert {}/{}/{} already exists in organisation {}",
          alert.alert_type, alert.source, alert.source_ref, alert.organisation
        )))
      }
      Err(e) => Err(e.into()),
    }
  }

  fn write_case(&self, case: &Case, insert: bool) -> Result<()> {
    let sql = if insert {
      "INSERT INTO cases (
         case_id, organisation, number, title, description, severity, tlp,
         tags, flag, custom_fields, status, case_template, created_by,
         created_at, updated_by, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16)"
    } else {
      "UPDATE cases SET
         organisation = ?2, number = ?3, title = ?4, description = ?5,
         severity = ?6, tlp = ?7, tags = ?8, flag = ?9, custom_fields = ?10,
         status = ?11, case_template = ?12, created_by = ?13, created_at = ?14,
         updated_by = ?15, updated_at = ?16
       WHERE case_id = ?1"
    };

    let changed = self.conn.execute(sql, params![
      encode_uuid(case.case_id),
      case.organisation,
      case.number as i64,
      case.title,
      case.description,
      case.severity.to_string(),
      case.tlp.to_string(),
      encode_tags(&case.tags)?,
      case.flag,
      encode_fields(&case.custom_fields)?,
      case.status.to_string(),
      case.case_template,
      case.created_by,
      encode_dt(case.created_at),
      case.updated_by,
      case.updated_at.map(encode_dt),
    ])?;

    if changed == 0 {
      return Err(triage_core::Error::not_found("case", case.case_id).into());
    }
    Ok(())
  }

  fn insert_observable_row(&self, observable: &Observable) -> Result<()> {
    let (owner_kind, owner_id) = encode_owner(observable.owner);
    let (value, attachment) = match &observable.data {
      ObservableData::Value(v) => (Some(v.as_str()), None),
      ObservableData::Attachment(a) => (None, Some(a)),
    };

    self.conn.execute(
      "INSERT INTO observables (
         observable_id, owner_kind, owner_id, data_type, value, attachment_hash,
         attachment_name, attachment_content_type, attachment_size, message,
         tags, ioc, sighted, tlp, position, created_by, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16, ?17)",
      params![
        encode_uuid(observable.observable_id),
        owner_kind,
        owner_id,
        observable.data_type,
        value,
        attachment.map(|a| a.hash.as_str()),
        attachment.map(|a| a.filename.as_str()),
        attachment.map(|a| a.content_type.as_str()),
        attachment.map(|a| a.size as i64),
        observable.message,
        encode_tags(&observable.tags)?,
        observable.ioc,
        observable.sighted,
        observable.tlp.to_string(),
        i64::from(observable.position),
        observable.created_by,
        encode_dt(observable.created_at),
      ],
    )?;
    Ok(())
  }

  fn select_observables(&self, owner: ObservableOwner) -> Result<Vec<Observable>> {
    let (owner_kind, owner_id) = encode_owner(owner);
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {OBSERVABLE_COLUMNS} FROM observables
       WHERE owner_kind = ?1 AND owner_id = ?2
       ORDER BY position, created_at"
    ))?;
    let raws = stmt
      .query_map(params![owner_kind, owner_id], RawObservable::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawObservable::into_observable).collect()
  }

  fn select_alerts(&self, organisation: &str, filter: &AlertFilter) -> Result<Vec<Alert>> {
    let mut stmt = self.conn.prepare(&format!(
      "SELECT {ALERT_COLUMNS} FROM alerts
       WHERE organisation = ?1
         AND (?2 IS NULL OR status = ?2)
         AND (?3 IS NULL OR read = ?3)
         AND (?4 IS NULL OR follow = ?4)
       ORDER BY created_at DESC, alert_id
       LIMIT ?5 OFFSET ?6"
    ))?;
    let raws = stmt
      .query_map(
        params![
          organisation,
          filter.status.map(|s| s.to_string()),
          filter.read,
          filter.follow,
          filter.limit.unwrap_or(100) as i64,
          filter.offset.unwrap_or(0) as i64,
        ],
        RawAlert::from_row,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws.into_iter().map(RawAlert::into_alert).collect()
  }
}

// ─── Repository impls ────────────────────────────────────────────────────────

impl AlertRepository for SqliteUnit<'_> {
  fn insert_alert(&mut self, alert: &Alert) -> CoreResult<()> {
    Ok(self.write_alert(alert, true)?)
  }

  fn find_alert(&mut self, id: Uuid) -> CoreResult<Option<Alert>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE alert_id = ?1"),
        params![encode_uuid(id)],
        RawAlert::from_row,
      )
      .optional()
      .map_err(Error::from)?;
    Ok(raw.map(RawAlert::into_alert).transpose()?)
  }

  fn update_alert(&mut self, alert: &Alert) -> CoreResult<()> {
    Ok(self.write_alert(alert, false)?)
  }

  fn delete_alert(&mut self, id: Uuid) -> CoreResult<()> {
    self
      .conn
      .execute("DELETE FROM alerts WHERE alert_id = ?1", params![encode_uuid(id)])
      .map_err(Error::from)?;
    Ok(())
  }

  fn list_alerts(
    &mut self,
    organisation: &str,
    filter: &AlertFilter,
  ) -> CoreResult<Vec<Alert>> {
    Ok(self.select_alerts(organisation, filter)?)
  }
}

impl ObservableRepository for SqliteUnit<'_> {
  fn insert_observable(&mut self, observable: &Observable) -> CoreResult<()> {
    Ok(self.insert_observable_row(observable)?)
  }

  fn observables_of(&mut self, owner: ObservableOwner) -> CoreResult<Vec<Observable>> {
    Ok(self.select_observables(owner)?)
  }

  fn delete_observable(&mut self, id: Uuid) -> CoreResult<()> {
    self
      .conn
      .execute(
        "DELETE FROM observables WHERE observable_id = ?1",
        params![encode_uuid(id)],
      )
      .map_err(Error::from)?;
    Ok(())
  }

  fn attachment_visible_to(
    &mut self,
    hash: &ContentHash,
    organisation: &str,
  ) -> CoreResult<bool> {
    let visible = self
      .conn
      .query_row(
        "SELECT EXISTS (
           SELECT 1 FROM observables o
           LEFT JOIN alerts a ON o.owner_kind = 'alert' AND a.alert_id = o.owner_id
           LEFT JOIN cases  c ON o.owner_kind = 'case'  AND c.case_id  = o.owner_id
           WHERE o.attachment_hash = ?1
             AND (a.organisation = ?2 OR c.organisation = ?2)
         )",
        params![hash.as_str(), organisation],
        |row| row.get(0),
      )
      .map_err(Error::from)?;
    Ok(visible)
  }
}

impl BlobStore for SqliteUnit<'_> {
  fn put_blob_if_absent(&mut self, hash: &ContentHash, bytes: &[u8]) -> CoreResult<bool> {
    let inserted = self
      .conn
      .execute(
        "INSERT OR IGNORE INTO blobs (hash, size, data, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![hash.as_str(), bytes.len() as i64, bytes, encode_dt(Utc::now())],
      )
      .map_err(Error::from)?;
    Ok(inserted == 1)
  }

  fn get_blob(&mut self, hash: &ContentHash) -> CoreResult<Option<Vec<u8>>> {
    let data = self
      .conn
      .query_row(
        "SELECT data FROM blobs WHERE hash = ?1",
        params![hash.as_str()],
        |row| row.get(0),
      )
      .optional()
      .map_err(Error::from)?;
    Ok(data)
  }

  fn blob_references(&mut self, hash: &ContentHash) -> CoreResult<u64> {
    let count: i64 = self
      .conn
      .query_row(
        "SELECT COUNT(*) FROM observables WHERE attachment_hash = ?1",
        params![hash.as_str()],
        |row| row.get(0),
      )
      .map_err(Error::from)?;
    Ok(count as u64)
  }

  fn delete_blob(&mut self, hash: &ContentHash) -> CoreResult<()> {
    self
      .conn
      .execute("DELETE FROM blobs WHERE hash = ?1", params![hash.as_str()])
      .map_err(Error::from)?;
    Ok(())
  }
}

impl CaseRepository for SqliteUnit<'_> {
  fn next_case_number(&mut self, organisation: &str) -> CoreResult<u64> {
    let next: i64 = self
      .conn
      .query_row(
        "SELECT COALESCE(MAX(number), 0) + 1 FROM cases WHERE organisation = ?1",
        params![organisation],
        |row| row.get(0),
      )
      .map_err(Error::from)?;
    Ok(next as u64)
  }

  fn insert_case(&mut self, case: &Case) -> CoreResult<()> {
    Ok(self.write_case(case, true)?)
  }

  fn find_case(&mut self, id: Uuid) -> CoreResult<Option<Case>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {CASE_COLUMNS} FROM cases WHERE case_id = ?1"),
        params![encode_uuid(id)],
        RawCase::from_row,
      )
      .optional()
      .map_err(Error::from)?;
    Ok(raw.map(RawCase::into_case).transpose()?)
  }

  fn update_case(&mut self, case: &Case) -> CoreResult<()> {
    Ok(self.write_case(case, false)?)
  }
}

impl Catalog for SqliteUnit<'_> {
  fn case_template(
    &mut self,
    organisation: &str,
    name: &str,
  ) -> CoreResult<Option<CaseTemplate>> {
    let raw = self
      .conn
      .query_row(
        "SELECT organisation, name, title_prefix, description, severity, tlp,
                tags, flag, custom_fields
         FROM case_templates WHERE organisation = ?1 AND name = ?2",
        params![organisation, name],
        |row| {
          Ok(RawCaseTemplate {
            organisation:  row.get(0)?,
            name:          row.get(1)?,
            title_prefix:  row.get(2)?,
            description:   row.get(3)?,
            severity:      row.get(4)?,
            tlp:           row.get(5)?,
            tags:          row.get(6)?,
            flag:          row.get(7)?,
            custom_fields: row.get(8)?,
          })
        },
      )
      .optional()
      .map_err(Error::from)?;
    Ok(raw.map(RawCaseTemplate::into_template).transpose()?)
  }

  fn observable_type(&mut self, name: &str) -> CoreResult<Option<ObservableType>> {
    let found = self
      .conn
      .query_row(
        "SELECT name, is_attachment FROM observable_types WHERE name = ?1",
        params![name],
        |row| {
          Ok(ObservableType {
            name:          row.get(0)?,
            is_attachment: row.get(1)?,
          })
        },
      )
      .optional()
      .map_err(Error::from)?;
    Ok(found)
  }
}

impl AuditSink for SqliteUnit<'_> {
  fn append_audit(&mut self, entry: &AuditEntry) -> CoreResult<()> {
    let outcome = serde_json::to_string(&entry.outcome).map_err(Error::from)?;
    self
      .conn
      .execute(
        "INSERT INTO audit_log (audit_id, operation, target_id, actor, recorded_at, outcome)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
          encode_uuid(entry.audit_id),
          entry.operation.to_string(),
          entry.target_id,
          entry.actor,
          encode_dt(entry.recorded_at),
          outcome,
        ],
      )
      .map_err(Error::from)?;
    Ok(())
  }
}

/// Read back the audit trail of one target, oldest first.
pub fn audit_trail(conn: &Connection, target_id: &str) -> Result<Vec<AuditEntry>> {
  let mut stmt = conn.prepare(
    "SELECT audit_id, operation, target_id, actor, recorded_at, outcome
     FROM audit_log WHERE target_id = ?1 ORDER BY recorded_at, rowid",
  )?;
  let raws = stmt
    .query_map(params![target_id], |row| {
      Ok(RawAuditEntry {
        audit_id:    row.get(0)?,
        operation:   row.get(1)?,
        target_id:   row.get(2)?,
        actor:       row.get(3)?,
        recorded_at: row.get(4)?,
        outcome:     row.get(5)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAuditEntry::into_entry).collect()
}

//! [`SqliteStore`]: the SQLite implementation of [`TriageStore`].

use std::path::Path;

use rusqlite::params;
use triage_core::{
  Result as CoreResult,
  audit::AuditEntry,
  case::CaseTemplate,
  observable::ObservableType,
  store::{TriageStore, UnitOfWork},
};

use crate::{
  Result,
  encode::{encode_fields, encode_tags},
  schema::{SCHEMA, default_observable_types},
  unit::{SqliteUnit, audit_trail},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A triage store backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, as used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        let mut stmt = conn.prepare(
          "INSERT OR IGNORE INTO observable_types (name, is_attachment) VALUES (?1, ?2)",
        )?;
        for (name, is_attachment) in default_observable_types() {
          stmt.execute(params![name, is_attachment])?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reference data ────────────────────────────────────────────────────

  /// Register (or replace) a case template.
  pub async fn add_case_template(&self, template: CaseTemplate) -> Result<()> {
    let tags = encode_tags(&template.tags)?;
    let fields = encode_fields(&template.custom_fields)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO case_templates (
             organisation, name, title_prefix, description, severity, tlp,
             tags, flag, custom_fields
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          params![
            template.organisation,
            template.name,
            template.title_prefix,
            template.description,
            template.severity.map(|s| s.to_string()),
            template.tlp.map(|t| t.to_string()),
            tags,
            template.flag,
            fields,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Register an additional observable data type.
  pub async fn add_observable_type(&self, data_type: ObservableType) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO observable_types (name, is_attachment) VALUES (?1, ?2)",
          params![data_type.name, data_type.is_attachment],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn observable_types(&self) -> Result<Vec<ObservableType>> {
    let types = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT name, is_attachment FROM observable_types ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(ObservableType {
              name:          row.get(0)?,
              is_attachment: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(types)
  }

  // ── Inspection ────────────────────────────────────────────────────────

  /// Audit entries recorded against `target_id`, oldest first.
  pub async fn audit_trail(&self, target_id: impl Into<String>) -> Result<Vec<AuditEntry>> {
    let target_id = target_id.into();
    self
      .conn
      .call(move |conn| Ok(audit_trail(conn, &target_id)))
      .await?
  }

  /// Number of distinct attachment blobs held.
  pub async fn blob_count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))?))
      .await?;
    Ok(count as u64)
  }

  /// Number of observables held, across alerts and cases.
  pub async fn observable_count(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM observables", [], |row| row.get(0))?)
      })
      .await?;
    Ok(count as u64)
  }
}

// ─── TriageStore impl ────────────────────────────────────────────────────────

impl TriageStore for SqliteStore {
  async fn transact<T, F>(&self, work: F) -> CoreResult<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> CoreResult<T> + Send + 'static,
  {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = work(&mut SqliteUnit::new(&tx));
        match &outcome {
          Ok(_) => tx.commit()?,
          Err(e) => {
            tracing::debug!(error = %e, "rolling back transaction");
            tx.rollback()?;
          }
        }
        Ok(outcome)
      })
      .await
      .map_err(crate::Error::from)?;
    outcome
  }
}

#[cfg(test)]
impl SqliteStore {
  /// Run raw SQL outside any unit of work.
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(conn.execute_batch(sql)?))
      .await?;
    Ok(())
  }
}

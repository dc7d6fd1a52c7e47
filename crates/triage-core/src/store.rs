//! Storage seams consumed by the workflow.
//!
//! Every public workflow operation runs as one closure passed to
//! [`TriageStore::transact`]. Inside it, the closure sees a [`UnitOfWork`]:
//! synchronous repository methods over a single open transaction. The backend
//! commits when the closure returns `Ok` and rolls back on `Err`, so a failed
//! operation never leaves partial writes behind.

use std::future::Future;

use uuid::Uuid;

use crate::{
  Error, Result,
  alert::{Alert, AlertFilter},
  attachment::ContentHash,
  audit::AuditEntry,
  case::{Case, CaseTemplate},
  observable::{Observable, ObservableOwner, ObservableType},
  permission::Actor,
};

// ─── Repositories ────────────────────────────────────────────────────────────

pub trait AlertRepository {
  /// Fails with [`crate::Error::Conflict`] when the organisation already has
  /// an alert with the same `(type, source, sourceRef)`.
  fn insert_alert(&mut self, alert: &Alert) -> Result<()>;

  /// Look up an alert regardless of organisation; visibility is decided by
  /// the caller.
  fn find_alert(&mut self, id: Uuid) -> Result<Option<Alert>>;

  fn update_alert(&mut self, alert: &Alert) -> Result<()>;

  fn delete_alert(&mut self, id: Uuid) -> Result<()>;

  /// Alerts of `organisation`, newest first.
  fn list_alerts(
    &mut self,
    organisation: &str,
    filter: &AlertFilter,
  ) -> Result<Vec<Alert>>;

  /// The alert if it exists and belongs to the actor's organisation.
  /// Invisible alerts are reported exactly like missing ones.
  fn find_visible_alert(&mut self, id: Uuid, actor: &Actor) -> Result<Alert> {
    self
      .find_alert(id)?
      .filter(|alert| alert.organisation == actor.organisation)
      .ok_or_else(|| Error::not_found("alert", id))
  }
}

pub trait ObservableRepository {
  fn insert_observable(&mut self, observable: &Observable) -> Result<()>;

  /// Observables of `owner`, ordered by position.
  fn observables_of(&mut self, owner: ObservableOwner) -> Result<Vec<Observable>>;

  fn delete_observable(&mut self, id: Uuid) -> Result<()>;

  /// Whether an alert or case of `organisation` holds an observable bound
  /// to the attachment `hash`.
  fn attachment_visible_to(
    &mut self,
    hash: &ContentHash,
    organisation: &str,
  ) -> Result<bool>;
}

/// Raw blob persistence keyed by content digest. Use it through
/// [`crate::attachment::AttachmentStore`].
pub trait BlobStore {
  /// Insert unless a blob with `hash` exists; returns whether a write
  /// happened. Must be atomic with respect to concurrent identical inserts.
  fn put_blob_if_absent(&mut self, hash: &ContentHash, bytes: &[u8]) -> Result<bool>;

  fn get_blob(&mut self, hash: &ContentHash) -> Result<Option<Vec<u8>>>;

  /// Number of observables (on any owner) bound to `hash`.
  fn blob_references(&mut self, hash: &ContentHash) -> Result<u64>;

  fn delete_blob(&mut self, hash: &ContentHash) -> Result<()>;
}

pub trait CaseRepository {
  /// Next free case number for `organisation`.
  fn next_case_number(&mut self, organisation: &str) -> Result<u64>;

  fn insert_case(&mut self, case: &Case) -> Result<()>;

  fn find_case(&mut self, id: Uuid) -> Result<Option<Case>>;

  fn update_case(&mut self, case: &Case) -> Result<()>;

  fn find_visible_case(&mut self, id: Uuid, actor: &Actor) -> Result<Case> {
    self
      .find_case(id)?
      .filter(|case| case.organisation == actor.organisation)
      .ok_or_else(|| Error::not_found("case", id))
  }
}

/// Read-only reference data.
pub trait Catalog {
  fn case_template(
    &mut self,
    organisation: &str,
    name: &str,
  ) -> Result<Option<CaseTemplate>>;

  fn observable_type(&mut self, name: &str) -> Result<Option<ObservableType>>;
}

pub trait AuditSink {
  fn append_audit(&mut self, entry: &AuditEntry) -> Result<()>;
}

/// Everything a workflow may touch inside one transaction.
pub trait UnitOfWork:
  AlertRepository
  + ObservableRepository
  + BlobStore
  + CaseRepository
  + Catalog
  + AuditSink
{
}

impl<T> UnitOfWork for T where
  T: AlertRepository
    + ObservableRepository
    + BlobStore
    + CaseRepository
    + Catalog
    + AuditSink
{
}

// ─── Transaction boundary ────────────────────────────────────────────────────

/// A storage backend able to run a unit of work atomically.
pub trait TriageStore: Send + Sync {
  /// Run `work` inside one transaction. Commits iff `work` returns `Ok`.
  fn transact<T, F>(&self, work: F) -> impl Future<Output = Result<T>> + Send
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static;
}

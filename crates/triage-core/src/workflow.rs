//! [`AlertWorkflow`]: the public alert operations.
//!
//! Each operation is one call to [`TriageStore::transact`]: a failure at any
//! step rolls back every write the operation made. Audit entries are the one
//! exception to "any failure aborts": they are written best-effort through
//! [`AuditRecorder`] and their failures only show up in the logs.
//!
//! A mutation of an existing alert that is refused or fails leaves a
//! failure entry behind, written in a transaction of its own after the
//! operation's one has rolled back. Lookups that end in NotFound are not
//! audited since there is no target to attach the entry to.

use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  alert::{Alert, AlertFilter, AlertStatus, AlertUpdate, AlertWithObservables, NewAlert},
  attachment::{AttachmentStore, ContentHash},
  audit::{AuditEntry, AuditOperation, AuditRecorder},
  case::{Case, CaseWithObservables},
  ingest::ingest_all,
  merge::CaseMergeEngine,
  observable::{ObservableData, ObservableOwner},
  permission::{Actor, Capability, PermissionGate, Scope},
  store::{TriageStore, UnitOfWork},
};

/// Entry point for every alert operation, generic over the storage backend.
pub struct AlertWorkflow<S> {
  store: Arc<S>,
  gate:  Arc<dyn PermissionGate>,
}

impl<S> Clone for AlertWorkflow<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), gate: Arc::clone(&self.gate) }
  }
}

impl<S: TriageStore> AlertWorkflow<S> {
  pub fn new(store: Arc<S>, gate: Arc<dyn PermissionGate>) -> Self {
    Self { store, gate }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Create ────────────────────────────────────────────────────────────

  /// Create an alert together with its observables.
  ///
  /// Observable ingestion is all-or-nothing: one bad submission fails the
  /// whole call and nothing is persisted. Audit writes are best-effort.
  pub async fn create(
    &self,
    actor: &Actor,
    request: NewAlert,
  ) -> Result<AlertWithObservables> {
    let actor = actor.clone();
    let gate = Arc::clone(&self.gate);

    let created = self
      .store
      .transact(move |uow| {
        if let Some(name) = &request.case_template {
          uow
            .case_template(&actor.organisation, name)?
            .ok_or_else(|| Error::not_found("case template", name))?;
        }

        // Membership in the actor's own organisation, then the gate proper.
        if !actor.capabilities.contains(&Capability::ManageAlert) {
          return Err(Error::forbidden(Capability::ManageAlert));
        }
        gate.require(
          &actor,
          Capability::ManageAlert,
          Scope::organisation(&actor.organisation),
        )?;

        let alert_id = Uuid::new_v4();
        let observables = ingest_all(
          &mut *uow,
          ObservableOwner::Alert(alert_id),
          &actor.user_id,
          request.observables,
        )?;

        let now = Utc::now();
        let alert = Alert {
          alert_id,
          organisation: actor.organisation.clone(),
          alert_type: request.alert_type,
          source: request.source,
          source_ref: request.source_ref,
          title: request.title,
          description: request.description,
          severity: request.severity,
          tlp: request.tlp,
          date: request.date.unwrap_or(now),
          tags: request.tags,
          custom_fields: request.custom_fields,
          status: AlertStatus::New,
          read: false,
          follow: true,
          case_id: None,
          case_template: request.case_template,
          created_by: actor.user_id.clone(),
          created_at: now,
          updated_by: None,
          updated_at: None,
        };
        uow.insert_alert(&alert)?;

        let mut audit = AuditRecorder::new();
        audit.record(
          &mut *uow,
          AuditEntry::success(AuditOperation::CreateAlert, alert_id, &actor),
        );
        for observable in &observables {
          uow.insert_observable(observable)?;
          audit.record(
            &mut *uow,
            AuditEntry::success(
              AuditOperation::AttachObservable,
              observable.observable_id,
              &actor,
            ),
          );
        }
        audit.finish();

        Ok(AlertWithObservables { alert, observables })
      })
      .await?;

    tracing::info!(
      alert = %created.alert.alert_id,
      organisation = %created.alert.organisation,
      observables = created.observables.len(),
      "created alert"
    );
    Ok(created)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<AlertWithObservables> {
    let actor = actor.clone();
    self
      .store
      .transact(move |uow| {
        let alert = uow.find_visible_alert(id, &actor)?;
        let observables = uow.observables_of(ObservableOwner::Alert(id))?;
        Ok(AlertWithObservables { alert, observables })
      })
      .await
  }

  /// Alerts of the actor's organisation, newest first.
  pub async fn list(&self, actor: &Actor, filter: AlertFilter) -> Result<Vec<Alert>> {
    let organisation = actor.organisation.clone();
    self
      .store
      .transact(move |uow| uow.list_alerts(&organisation, &filter))
      .await
  }

  pub async fn get_case(&self, actor: &Actor, id: Uuid) -> Result<CaseWithObservables> {
    let actor = actor.clone();
    self
      .store
      .transact(move |uow| {
        let case = uow.find_visible_case(id, &actor)?;
        let observables = uow.observables_of(ObservableOwner::Case(id))?;
        Ok(CaseWithObservables { case, observables })
      })
      .await
  }

  /// Bytes of an attachment held by an alert or case of the actor's
  /// organisation.
  pub async fn attachment(&self, actor: &Actor, hash: ContentHash) -> Result<Vec<u8>> {
    let organisation = actor.organisation.clone();
    self
      .store
      .transact(move |uow| {
        if !uow.attachment_visible_to(&hash, &organisation)? {
          return Err(Error::not_found("attachment", &hash));
        }
        AttachmentStore::new(&mut *uow).load(&hash)
      })
      .await
  }

  // ── Update / delete ───────────────────────────────────────────────────

  pub async fn update(
    &self,
    actor: &Actor,
    id: Uuid,
    changes: AlertUpdate,
  ) -> Result<AlertWithObservables> {
    let acting = actor.clone();
    let gate = Arc::clone(&self.gate);

    let outcome = self
      .store
      .transact(move |uow| {
        let mut alert = uow.find_visible_alert(id, &acting)?;
        gate.require(
          &acting,
          Capability::ManageAlert,
          Scope::organisation(&alert.organisation),
        )?;

        if changes.apply(&mut alert) {
          alert.updated_by = Some(acting.user_id.clone());
          alert.updated_at = Some(Utc::now());
          uow.update_alert(&alert)?;
          let mut audit = AuditRecorder::new();
          audit.record(
            &mut *uow,
            AuditEntry::success(AuditOperation::UpdateAlert, id, &acting),
          );
          audit.finish();
        }

        let observables = uow.observables_of(ObservableOwner::Alert(id))?;
        Ok(AlertWithObservables { alert, observables })
      })
      .await;
    let updated = self
      .audit_failure(actor, AuditOperation::UpdateAlert, id, outcome)
      .await?;

    tracing::info!(alert = %id, "updated alert");
    Ok(updated)
  }

  /// Remove an alert with everything it exclusively owns: its observables
  /// first, then attachment blobs no other observable references, then the
  /// alert itself.
  pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<()> {
    let acting = actor.clone();
    let outcome = self
      .store
      .transact(move |uow| cascade_remove(uow, &acting, id))
      .await;
    let removed = self
      .audit_failure(actor, AuditOperation::DeleteAlert, id, outcome)
      .await?;

    tracing::info!(alert = %id, observables = removed, "deleted alert");
    Ok(())
  }

  // ── Flags ─────────────────────────────────────────────────────────────

  pub async fn mark_as_read(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self
      .set_flag(actor, id, AuditOperation::MarkAsRead, |a| a.read = true)
      .await
  }

  pub async fn mark_as_unread(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self
      .set_flag(actor, id, AuditOperation::MarkAsUnread, |a| a.read = false)
      .await
  }

  pub async fn follow(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self
      .set_flag(actor, id, AuditOperation::FollowAlert, |a| a.follow = true)
      .await
  }

  pub async fn unfollow(&self, actor: &Actor, id: Uuid) -> Result<()> {
    self
      .set_flag(actor, id, AuditOperation::UnfollowAlert, |a| a.follow = false)
      .await
  }

  /// Guarded setter shared by the read and follow operations. Setting a
  /// flag to its current value succeeds.
  async fn set_flag(
    &self,
    actor: &Actor,
    id: Uuid,
    operation: AuditOperation,
    set: fn(&mut Alert),
  ) -> Result<()> {
    let acting = actor.clone();
    let gate = Arc::clone(&self.gate);

    let outcome = self
      .store
      .transact(move |uow| {
        let mut alert = uow.find_visible_alert(id, &acting)?;
        gate.require(
          &acting,
          Capability::ManageAlert,
          Scope::organisation(&alert.organisation),
        )?;
        set(&mut alert);
        uow.update_alert(&alert)?;

        let mut audit = AuditRecorder::new();
        audit.record(&mut *uow, AuditEntry::success(operation, id, &acting));
        audit.finish();
        Ok(())
      })
      .await;
    self.audit_failure(actor, operation, id, outcome).await?;

    tracing::debug!(alert = %id, %operation, "alert flag set");
    Ok(())
  }

  // ── Cases ─────────────────────────────────────────────────────────────

  /// Link an alert into an existing case and return the updated case.
  pub async fn merge_in_case(
    &self,
    actor: &Actor,
    alert_id: Uuid,
    case_id: Uuid,
  ) -> Result<Case> {
    let acting = actor.clone();
    let gate = Arc::clone(&self.gate);

    let outcome = self
      .store
      .transact(move |uow| {
        let case = CaseMergeEngine::new(&mut *uow, gate.as_ref(), &acting)
          .merge_in_case(alert_id, case_id)?;
        let mut audit = AuditRecorder::new();
        audit.record(
          &mut *uow,
          AuditEntry::success(AuditOperation::MergeInCase, alert_id, &acting),
        );
        audit.finish();
        Ok(case)
      })
      .await;
    self
      .audit_failure(actor, AuditOperation::MergeInCase, alert_id, outcome)
      .await
  }

  /// Open a new case from an alert.
  ///
  /// A refused attempt is audited against the alert, since no case exists.
  pub async fn create_case(&self, actor: &Actor, alert_id: Uuid) -> Result<Case> {
    let acting = actor.clone();
    let gate = Arc::clone(&self.gate);

    let outcome = self
      .store
      .transact(move |uow| {
        let case = CaseMergeEngine::new(&mut *uow, gate.as_ref(), &acting)
          .create_case(alert_id)?;
        let mut audit = AuditRecorder::new();
        audit.record(
          &mut *uow,
          AuditEntry::success(AuditOperation::CreateCase, case.case_id, &acting),
        );
        audit.finish();
        Ok(case)
      })
      .await;
    self
      .audit_failure(actor, AuditOperation::CreateCase, alert_id, outcome)
      .await
  }

  // ── Failure audit ─────────────────────────────────────────────────────

  /// Pass `outcome` through, first recording a failure entry for `target`
  /// when it is an error other than NotFound.
  async fn audit_failure<T>(
    &self,
    actor: &Actor,
    operation: AuditOperation,
    target: Uuid,
    outcome: Result<T>,
  ) -> Result<T> {
    let detail = match &outcome {
      Ok(_) | Err(Error::NotFound { .. }) => None,
      Err(error) => Some(error.to_string()),
    };
    let Some(detail) = detail else { return outcome };

    let entry = AuditEntry::failure(operation, target, actor, detail);
    let written = self
      .store
      .transact(move |uow| {
        let mut audit = AuditRecorder::new();
        audit.record(&mut *uow, entry);
        audit.finish();
        Ok(())
      })
      .await;
    if let Err(e) = written {
      tracing::warn!(%operation, %target, error = %e, "failed to record audit failure");
    }
    outcome
  }
}

/// Delete `id` and what it exclusively owns. Returns the number of
/// observables removed.
fn cascade_remove(uow: &mut dyn UnitOfWork, actor: &Actor, id: Uuid) -> Result<usize> {
  let alert = uow.find_visible_alert(id, actor)?;
  let observables = uow.observables_of(ObservableOwner::Alert(alert.alert_id))?;

  let mut hashes = BTreeSet::new();
  for observable in &observables {
    uow.delete_observable(observable.observable_id)?;
    if let ObservableData::Attachment(attachment) = &observable.data {
      hashes.insert(attachment.hash.clone());
    }
  }
  for hash in &hashes {
    if AttachmentStore::new(&mut *uow).release(hash)? {
      tracing::debug!(%hash, "released attachment blob");
    }
  }
  uow.delete_alert(alert.alert_id)?;

  let mut audit = AuditRecorder::new();
  audit.record(
    &mut *uow,
    AuditEntry::success(AuditOperation::DeleteAlert, id, actor),
  );
  audit.finish();
  Ok(observables.len())
}

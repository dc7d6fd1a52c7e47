//! Alert → case conversion and alert-into-case merging.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  alert::{Alert, AlertStatus},
  case::{Case, CaseStatus, CaseTemplate},
  observable::ObservableOwner,
  permission::{Actor, Capability, PermissionGate, Scope},
  store::UnitOfWork,
};

/// Runs case conversions inside an open unit of work.
pub struct CaseMergeEngine<'a, U: UnitOfWork + ?Sized> {
  uow:   &'a mut U,
  gate:  &'a dyn PermissionGate,
  actor: &'a Actor,
}

impl<'a, U: UnitOfWork + ?Sized> CaseMergeEngine<'a, U> {
  pub fn new(uow: &'a mut U, gate: &'a dyn PermissionGate, actor: &'a Actor) -> Self {
    Self { uow, gate, actor }
  }

  /// Link `alert_id` into an existing case: the case gains a merge section
  /// in its description, the alert's tags and any observables it does not
  /// already have. The alert keeps its status and read state.
  ///
  /// Merging an alert into the case it is already linked to changes
  /// nothing. An alert linked to a different case is a conflict.
  pub fn merge_in_case(&mut self, alert_id: Uuid, case_id: Uuid) -> Result<Case> {
    let mut alert = self.uow.find_visible_alert(alert_id, self.actor)?;
    self.gate.require(
      self.actor,
      Capability::ManageAlert,
      Scope::organisation(&alert.organisation),
    )?;
    let mut case = self.uow.find_visible_case(case_id, self.actor)?;

    match alert.case_id {
      Some(linked) if linked == case.case_id => {
        tracing::debug!(alert = %alert_id, case = %linked, "alert already merged");
        return Ok(case);
      }
      Some(linked) => {
        return Err(Error::Conflict(format!(
          "alert {alert_id} is already linked to case {linked}"
        )));
      }
      None => {}
    }

    case.description = merged_description(&case.description, &alert);
    case.tags.extend(alert.tags.iter().cloned());
    case.updated_by = Some(self.actor.user_id.clone());
    case.updated_at = Some(Utc::now());
    self.uow.update_case(&case)?;

    let copied = self.copy_observables(alert.alert_id, case.case_id)?;

    alert.case_id = Some(case.case_id);
    self.uow.update_alert(&alert)?;

    tracing::info!(
      alert = %alert.alert_id,
      case = %case.case_id,
      copied,
      "merged alert into case"
    );
    Ok(case)
  }

  /// Open a new case from `alert_id`, prefilled from the alert's case
  /// template and then from the alert itself. The alert ends up linked to
  /// the case with status [`AlertStatus::Imported`].
  pub fn create_case(&mut self, alert_id: Uuid) -> Result<Case> {
    let mut alert = self.uow.find_visible_alert(alert_id, self.actor)?;
    self.gate.require(
      self.actor,
      Capability::ManageCase,
      Scope::organisation(&alert.organisation),
    )?;
    if let Some(existing) = alert.case_id {
      return Err(Error::Conflict(format!(
        "alert {alert_id} is already linked to case {existing}"
      )));
    }

    let template = match &alert.case_template {
      Some(name) => self.uow.case_template(&alert.organisation, name)?,
      None => None,
    };
    let number = self.uow.next_case_number(&alert.organisation)?;
    let case = case_from_alert(&alert, template.as_ref(), number, self.actor);
    self.uow.insert_case(&case)?;

    let copied = self.copy_observables(alert.alert_id, case.case_id)?;

    alert.case_id = Some(case.case_id);
    alert.status = AlertStatus::Imported;
    alert.updated_by = Some(self.actor.user_id.clone());
    alert.updated_at = Some(Utc::now());
    self.uow.update_alert(&alert)?;

    tracing::info!(
      alert = %alert.alert_id,
      case = %case.case_id,
      number = case.number,
      copied,
      "created case from alert"
    );
    Ok(case)
  }

  /// Copy the alert's observables onto the case, skipping evidence the case
  /// already holds. Attachments are shared by digest, not duplicated.
  fn copy_observables(&mut self, alert_id: Uuid, case_id: Uuid) -> Result<usize> {
    let target = ObservableOwner::Case(case_id);
    let existing = self.uow.observables_of(target)?;
    let mut seen: HashSet<(String, String)> = existing
      .iter()
      .map(|o| (o.data_type.clone(), o.data.identity().to_owned()))
      .collect();
    let mut position = existing.iter().map(|o| o.position + 1).max().unwrap_or(0);

    let now = Utc::now();
    let mut copied = 0;
    for observable in self.uow.observables_of(ObservableOwner::Alert(alert_id))? {
      let key = (observable.data_type.clone(), observable.data.identity().to_owned());
      if !seen.insert(key) {
        continue;
      }
      let copy = observable.copy_to(target, position, &self.actor.user_id, now);
      self.uow.insert_observable(&copy)?;
      position += 1;
      copied += 1;
    }
    Ok(copied)
  }
}

fn merged_description(current: &str, alert: &Alert) -> String {
  let section = format!(
    "### Merged with alert #{} {}\n\n{}",
    alert.source_ref,
    alert.title,
    alert.description.trim()
  );
  if current.trim().is_empty() {
    section
  } else {
    format!("{}\n\n{section}", current.trim_end())
  }
}

fn case_from_alert(
  alert: &Alert,
  template: Option<&CaseTemplate>,
  number: u64,
  actor: &Actor,
) -> Case {
  let prefix = template.and_then(|t| t.title_prefix.as_deref()).unwrap_or("");
  let description = match template.and_then(|t| t.description.as_deref()) {
    Some(d) if alert.description.trim().is_empty() => d.to_owned(),
    _ => alert.description.clone(),
  };

  let mut tags = template.map(|t| t.tags.clone()).unwrap_or_default();
  tags.extend(alert.tags.iter().cloned());
  let mut custom_fields = template.map(|t| t.custom_fields.clone()).unwrap_or_default();
  custom_fields.extend(alert.custom_fields.clone());

  Case {
    case_id: Uuid::new_v4(),
    organisation: alert.organisation.clone(),
    number,
    title: format!("{prefix}{}", alert.title),
    description,
    severity: alert.severity,
    tlp: alert.tlp,
    tags,
    flag: template.is_some_and(|t| t.flag),
    custom_fields,
    status: CaseStatus::Open,
    case_template: template.map(|t| t.name.clone()),
    created_by: actor.user_id.clone(),
    created_at: Utc::now(),
    updated_by: None,
    updated_at: None,
  }
}

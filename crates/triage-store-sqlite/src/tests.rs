//! Workflow tests for `SqliteStore` against an in-memory database.

use std::{collections::BTreeSet, sync::Arc};

use triage_core::{
  Error,
  alert::{AlertFilter, AlertStatus, AlertUpdate, NewAlert, Severity},
  attachment::{AttachmentStore, ContentHash},
  audit::{AuditOperation, AuditOutcome},
  case::CaseTemplate,
  observable::{ObservableData, ObservableSubmission, ObservableType},
  permission::{Actor, Capability, ProfileGate},
  store::TriageStore,
  workflow::AlertWorkflow,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn workflow() -> AlertWorkflow<SqliteStore> {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  AlertWorkflow::new(Arc::new(store), Arc::new(ProfileGate))
}

fn analyst() -> Actor {
  Actor::new("alice", "soc", [Capability::ManageAlert, Capability::ManageCase])
}

fn reader() -> Actor { Actor::new("rob", "soc", []) }

fn outsider() -> Actor {
  Actor::new("eve", "other-org", [Capability::ManageAlert, Capability::ManageCase])
}

fn request(source_ref: &str) -> NewAlert {
  let mut alert = NewAlert::new("external", "siem", source_ref, "Suspicious login");
  alert.description = "Login from an unusual country".into();
  alert.tags = BTreeSet::from(["auth".to_string()]);
  alert
}

fn file(name: &str, base64: &str) -> ObservableSubmission {
  ObservableSubmission::new("file", Some(&format!("{name};text/plain;{base64}")))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_attaches_observables_in_submission_order() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![
    ObservableSubmission::new("ip", Some("10.0.0.1")),
    file("a.txt", "aGVsbG8="),
    ObservableSubmission::new("domain", Some("evil.example")),
  ];

  let created = wf.create(&analyst(), req).await.unwrap();
  assert_eq!(created.alert.status, AlertStatus::New);
  assert!(!created.alert.read);
  assert!(created.alert.follow);
  assert_eq!(created.observables.len(), 3);

  let fetched = wf.get(&analyst(), created.alert.alert_id).await.unwrap();
  let types: Vec<_> = fetched.observables.iter().map(|o| o.data_type.as_str()).collect();
  assert_eq!(types, ["ip", "file", "domain"]);
  assert_eq!(fetched.alert.title, "Suspicious login");
}

#[tokio::test]
async fn file_observable_stores_decoded_bytes() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![file("a.txt", "aGVsbG8=")];

  let created = wf.create(&analyst(), req).await.unwrap();
  let ObservableData::Attachment(attachment) = &created.observables[0].data else {
    panic!("expected attachment");
  };
  assert_eq!(attachment.filename, "a.txt");
  assert_eq!(attachment.content_type, "text/plain");
  assert_eq!(attachment.size, 5);

  let bytes = wf.attachment(&analyst(), attachment.hash.clone()).await.unwrap();
  assert_eq!(bytes, b"hello");

  let err = wf.attachment(&outsider(), attachment.hash.clone()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn plain_observable_without_value_is_skipped() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![
    ObservableSubmission::new("ip", None),
    ObservableSubmission::new("hostname", Some("ws-042")),
  ];

  let created = wf.create(&analyst(), req).await.unwrap();
  assert_eq!(created.observables.len(), 1);
  assert_eq!(created.observables[0].data.identity(), "ws-042");
}

#[tokio::test]
async fn failing_observable_rolls_back_whole_create() {
  let bad_submissions = [
    ObservableSubmission::new("no-such-type", Some("x")),
    ObservableSubmission::new("file", Some("bad-format")),
    file("a.txt", "not base64!"),
  ];

  for bad in bad_submissions {
    let wf = workflow().await;
    let mut req = request("ref-1");
    req.observables = vec![file("good.txt", "Z29vZA=="), bad];

    let err = wf.create(&analyst(), req).await.unwrap_err();
    assert_eq!(err.code(), "AggregateError");

    let alerts = wf.list(&analyst(), AlertFilter::default()).await.unwrap();
    assert!(alerts.is_empty());
    assert_eq!(wf.store().observable_count().await.unwrap(), 0);
    assert_eq!(wf.store().blob_count().await.unwrap(), 0);
  }
}

#[tokio::test]
async fn malformed_triple_names_offending_text() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![ObservableSubmission::new("file", Some("bad-format"))];

  let err = wf.create(&analyst(), req).await.unwrap_err();
  assert!(matches!(err.root(), Error::InvalidFormat(raw) if raw == "bad-format"));
}

#[tokio::test]
async fn create_requires_manage_alert() {
  let wf = workflow().await;
  let err = wf.create(&reader(), request("ref-1")).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden { capability: Capability::ManageAlert }));
  assert!(wf.list(&analyst(), AlertFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn create_with_unknown_template_is_not_found() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.case_template = Some("missing".into());

  let err = wf.create(&analyst(), req).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: "case template", .. }));
}

#[tokio::test]
async fn template_of_another_organisation_is_not_visible() {
  let wf = workflow().await;
  wf.store()
    .add_case_template(CaseTemplate::new("other-org", "phishing"))
    .await
    .unwrap();

  let mut req = request("ref-1");
  req.case_template = Some("phishing".into());
  let err = wf.create(&analyst(), req).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn duplicate_source_ref_conflicts() {
  let wf = workflow().await;
  wf.create(&analyst(), request("ref-1")).await.unwrap();

  let err = wf.create(&analyst(), request("ref-1")).await.unwrap_err();
  assert_eq!(err.code(), "ConflictError");

  // Same triple in another organisation is a different alert.
  wf.create(&outsider(), request("ref-1")).await.unwrap();
}

#[tokio::test]
async fn create_records_audit_trail() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![ObservableSubmission::new("ip", Some("10.0.0.1"))];
  let created = wf.create(&analyst(), req).await.unwrap();

  let trail = wf
    .store()
    .audit_trail(created.alert.alert_id.to_string())
    .await
    .unwrap();
  assert_eq!(trail.len(), 1);
  assert_eq!(trail[0].operation, AuditOperation::CreateAlert);
  assert_eq!(trail[0].actor, "alice");
  assert_eq!(trail[0].outcome, AuditOutcome::Success);

  let attach = wf
    .store()
    .audit_trail(created.observables[0].observable_id.to_string())
    .await
    .unwrap();
  assert_eq!(attach.len(), 1);
  assert_eq!(attach[0].operation, AuditOperation::AttachObservable);
}

#[tokio::test]
async fn audit_failure_does_not_fail_create() {
  let wf = workflow().await;
  wf.store().execute_batch("DROP TABLE audit_log").await.unwrap();

  let mut req = request("ref-1");
  req.observables = vec![ObservableSubmission::new("ip", Some("10.0.0.1"))];
  let created = wf.create(&analyst(), req).await.unwrap();

  let fetched = wf.get(&analyst(), created.alert.alert_id).await.unwrap();
  assert_eq!(fetched.observables.len(), 1);
}

#[tokio::test]
async fn refused_mutation_records_failure_entry() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  wf.mark_as_read(&reader(), id).await.unwrap_err();

  let trail = wf.store().audit_trail(id.to_string()).await.unwrap();
  assert_eq!(trail.len(), 2);
  assert_eq!(trail[1].operation, AuditOperation::MarkAsRead);
  assert_eq!(trail[1].actor, "rob");
  let AuditOutcome::Failure { detail } = &trail[1].outcome else {
    panic!("expected failure outcome, got {:?}", trail[1].outcome);
  };
  assert!(detail.contains("manageAlert"));
}

#[tokio::test]
async fn conflicting_case_creation_is_audited_against_the_alert() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;
  wf.create_case(&analyst(), id).await.unwrap();
  wf.create_case(&analyst(), id).await.unwrap_err();

  let trail = wf.store().audit_trail(id.to_string()).await.unwrap();
  let failures: Vec<_> = trail
    .iter()
    .filter(|e| matches!(e.outcome, AuditOutcome::Failure { .. }))
    .collect();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0].operation, AuditOperation::CreateCase);
}

#[tokio::test]
async fn unknown_targets_leave_no_audit_entry() {
  let wf = workflow().await;
  let missing = Uuid::new_v4();
  wf.delete(&analyst(), missing).await.unwrap_err();

  let trail = wf.store().audit_trail(missing.to_string()).await.unwrap();
  assert!(trail.is_empty());
}

// ─── Attachments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_bytes_share_one_blob() {
  let wf = workflow().await;
  let mut first = request("ref-1");
  first.observables = vec![file("a.txt", "aGVsbG8=")];
  let mut second = request("ref-2");
  second.observables = vec![file("b.txt", "aGVsbG8=")];

  let a = wf.create(&analyst(), first).await.unwrap();
  let b = wf.create(&analyst(), second).await.unwrap();

  let hash = |o: &triage_core::observable::Observable| match &o.data {
    ObservableData::Attachment(att) => att.hash.clone(),
    ObservableData::Value(_) => panic!("expected attachment"),
  };
  assert_eq!(hash(&a.observables[0]), hash(&b.observables[0]));
  assert_eq!(wf.store().blob_count().await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_identical_stores_keep_one_blob() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());

  let tasks: Vec<_> = (0..8)
    .map(|_| {
      let store = Arc::clone(&store);
      tokio::spawn(async move {
        store
          .transact(|uow| AttachmentStore::new(uow).store(b"same bytes"))
          .await
      })
    })
    .collect();

  let mut hashes = BTreeSet::new();
  for task in tasks {
    hashes.insert(task.await.unwrap().unwrap());
  }
  assert_eq!(hashes.len(), 1);
  assert_eq!(hashes.into_iter().next(), Some(ContentHash::of(b"same bytes")));
  assert_eq!(store.blob_count().await.unwrap(), 1);
}

// ─── Read / follow ───────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_as_read_is_idempotent() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  wf.mark_as_read(&analyst(), id).await.unwrap();
  assert!(wf.get(&analyst(), id).await.unwrap().alert.read);
  wf.mark_as_read(&analyst(), id).await.unwrap();
  assert!(wf.get(&analyst(), id).await.unwrap().alert.read);

  wf.mark_as_unread(&analyst(), id).await.unwrap();
  assert!(!wf.get(&analyst(), id).await.unwrap().alert.read);
}

#[tokio::test]
async fn follow_and_unfollow_set_flag() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  wf.unfollow(&analyst(), id).await.unwrap();
  wf.unfollow(&analyst(), id).await.unwrap();
  assert!(!wf.get(&analyst(), id).await.unwrap().alert.follow);

  wf.follow(&analyst(), id).await.unwrap();
  assert!(wf.get(&analyst(), id).await.unwrap().alert.follow);

  let unfollowed = AlertFilter { follow: Some(false), ..Default::default() };
  assert!(wf.list(&analyst(), unfollowed).await.unwrap().is_empty());
}

#[tokio::test]
async fn flags_require_manage_alert() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  let err = wf.mark_as_read(&reader(), id).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden { .. }));
  assert!(!wf.get(&analyst(), id).await.unwrap().alert.read);

  let err = wf.follow(&outsider(), id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

// ─── Get / list / update ─────────────────────────────────────────────────────

#[tokio::test]
async fn alerts_are_invisible_across_organisations() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  let err = wf.get(&outsider(), id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: "alert", .. }));
  assert!(wf.list(&outsider(), AlertFilter::default()).await.unwrap().is_empty());

  // Reading needs no capability.
  wf.get(&reader(), id).await.unwrap();
}

#[tokio::test]
async fn list_filters_and_pages() {
  let wf = workflow().await;
  for i in 0..5 {
    wf.create(&analyst(), request(&format!("ref-{i}"))).await.unwrap();
  }
  let newest = wf.list(&analyst(), AlertFilter::default()).await.unwrap();
  assert_eq!(newest.len(), 5);
  assert_eq!(newest[0].source_ref, "ref-4");

  wf.mark_as_read(&analyst(), newest[0].alert_id).await.unwrap();
  let unread = AlertFilter { read: Some(false), ..Default::default() };
  assert_eq!(wf.list(&analyst(), unread).await.unwrap().len(), 4);

  let page = AlertFilter { limit: Some(2), offset: Some(2), ..Default::default() };
  let page = wf.list(&analyst(), page).await.unwrap();
  assert_eq!(page.len(), 2);
  assert_eq!(page[0].source_ref, "ref-2");
}

#[tokio::test]
async fn update_applies_changes_and_returns_observables() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![ObservableSubmission::new("ip", Some("10.0.0.1"))];
  let id = wf.create(&analyst(), req).await.unwrap().alert.alert_id;

  let changes = AlertUpdate {
    title: Some("Confirmed brute force".into()),
    severity: Some(Severity::Critical),
    status: Some(AlertStatus::Ignored),
    ..Default::default()
  };
  let updated = wf.update(&analyst(), id, changes).await.unwrap();
  assert_eq!(updated.alert.title, "Confirmed brute force");
  assert_eq!(updated.alert.severity, Severity::Critical);
  assert_eq!(updated.alert.status, AlertStatus::Ignored);
  assert_eq!(updated.alert.updated_by.as_deref(), Some("alice"));
  assert_eq!(updated.observables.len(), 1);

  let fetched = wf.get(&analyst(), id).await.unwrap();
  assert_eq!(fetched.alert.title, "Confirmed brute force");
}

#[tokio::test]
async fn update_without_capability_changes_nothing() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  let changes = AlertUpdate { title: Some("hijacked".into()), ..Default::default() };
  let err = wf.update(&reader(), id, changes).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden { .. }));
  assert_eq!(wf.get(&analyst(), id).await.unwrap().alert.title, "Suspicious login");
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_cascades_to_exclusively_owned_data() {
  let wf = workflow().await;
  let mut doomed = request("ref-1");
  doomed.observables = vec![
    file("shared.txt", "c2hhcmVk"),
    file("mine.txt", "bWluZQ=="),
    ObservableSubmission::new("ip", Some("10.0.0.1")),
  ];
  let mut survivor = request("ref-2");
  survivor.observables = vec![file("copy.txt", "c2hhcmVk")];

  let doomed = wf.create(&analyst(), doomed).await.unwrap();
  let survivor = wf.create(&analyst(), survivor).await.unwrap();
  assert_eq!(wf.store().blob_count().await.unwrap(), 2);

  wf.delete(&analyst(), doomed.alert.alert_id).await.unwrap();

  let err = wf.get(&analyst(), doomed.alert.alert_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
  assert_eq!(wf.store().observable_count().await.unwrap(), 1);
  assert_eq!(wf.store().blob_count().await.unwrap(), 1);

  let ObservableData::Attachment(kept) = &survivor.observables[0].data else {
    panic!("expected attachment");
  };
  let bytes = wf.attachment(&analyst(), kept.hash.clone()).await.unwrap();
  assert_eq!(bytes, b"shared");
}

#[tokio::test]
async fn delete_rolls_back_when_cascade_fails() {
  let wf = workflow().await;
  let mut req = request("ref-1");
  req.observables = vec![
    file("a.txt", "c2hhcmVk"),
    ObservableSubmission::new("ip", Some("10.0.0.1")),
  ];
  let created = wf.create(&analyst(), req).await.unwrap();
  let id = created.alert.alert_id;

  // Observables and blobs are gone by the time the alert row is removed.
  wf.store()
    .execute_batch(
      "CREATE TRIGGER refuse_alert_delete BEFORE DELETE ON alerts
       BEGIN SELECT RAISE(ABORT, 'alert deletion refused'); END;",
    )
    .await
    .unwrap();

  let err = wf.delete(&analyst(), id).await.unwrap_err();
  assert_eq!(err.code(), "StorageError");

  let fetched = wf.get(&analyst(), id).await.unwrap();
  assert_eq!(fetched.observables.len(), 2);
  assert_eq!(wf.store().observable_count().await.unwrap(), 2);
  assert_eq!(wf.store().blob_count().await.unwrap(), 1);

  let ObservableData::Attachment(attachment) = &created.observables[0].data else {
    panic!("expected attachment");
  };
  let bytes = wf.attachment(&analyst(), attachment.hash.clone()).await.unwrap();
  assert_eq!(bytes, b"shared");
}

#[tokio::test]
async fn delete_requires_visibility() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;

  let err = wf.delete(&outsider(), id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
  wf.get(&analyst(), id).await.unwrap();

  let err = wf.delete(&analyst(), Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound { .. }));
}

// ─── Cases ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_case_from_alert() {
  let wf = workflow().await;
  let mut template = CaseTemplate::new("soc", "account-compromise");
  template.title_prefix = Some("[ACC] ".into());
  template.flag = true;
  wf.store().add_case_template(template).await.unwrap();

  let mut req = request("ref-1");
  req.case_template = Some("account-compromise".into());
  req.observables = vec![
    ObservableSubmission::new("ip", Some("10.0.0.1")),
    file("a.txt", "aGVsbG8="),
  ];
  let alert = wf.create(&analyst(), req).await.unwrap().alert;

  let case = wf.create_case(&analyst(), alert.alert_id).await.unwrap();
  assert_eq!(case.number, 1);
  assert_eq!(case.title, "[ACC] Suspicious login");
  assert!(case.flag);
  assert!(case.tags.contains("auth"));

  let with_obs = wf.get_case(&analyst(), case.case_id).await.unwrap();
  assert_eq!(with_obs.observables.len(), 2);
  assert_eq!(wf.store().blob_count().await.unwrap(), 1);

  let alert = wf.get(&analyst(), alert.alert_id).await.unwrap().alert;
  assert_eq!(alert.case_id, Some(case.case_id));
  assert_eq!(alert.status, AlertStatus::Imported);

  let err = wf.create_case(&analyst(), alert.alert_id).await.unwrap_err();
  assert_eq!(err.code(), "ConflictError");
}

#[tokio::test]
async fn create_case_requires_manage_case() {
  let wf = workflow().await;
  let id = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;
  let alert_only = Actor::new("al", "soc", [Capability::ManageAlert]);

  let err = wf.create_case(&alert_only, id).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden { capability: Capability::ManageCase }));
  assert_eq!(wf.get(&analyst(), id).await.unwrap().alert.case_id, None);
}

#[tokio::test]
async fn case_numbers_increase_per_organisation() {
  let wf = workflow().await;
  let a = wf.create(&analyst(), request("ref-1")).await.unwrap().alert.alert_id;
  let b = wf.create(&analyst(), request("ref-2")).await.unwrap().alert.alert_id;
  let c = wf.create(&outsider(), request("ref-1")).await.unwrap().alert.alert_id;

  assert_eq!(wf.create_case(&analyst(), a).await.unwrap().number, 1);
  assert_eq!(wf.create_case(&analyst(), b).await.unwrap().number, 2);
  assert_eq!(wf.create_case(&outsider(), c).await.unwrap().number, 1);
}

#[tokio::test]
async fn merge_in_case_reflects_alert_content() {
  let wf = workflow().await;
  let mut first = request("ref-1");
  first.observables = vec![ObservableSubmission::new("ip", Some("10.0.0.1"))];
  let first = wf.create(&analyst(), first).await.unwrap().alert;
  let case = wf.create_case(&analyst(), first.alert_id).await.unwrap();

  let mut second = NewAlert::new("external", "edr", "EDR-7", "Malware detected");
  second.description = "Dropper quarantined".into();
  second.tags = BTreeSet::from(["malware".to_string()]);
  second.observables = vec![
    ObservableSubmission::new("ip", Some("10.0.0.1")),
    ObservableSubmission::new("hash", Some("d41d8cd98f00b204e9800998ecf8427e")),
  ];
  let second = wf.create(&analyst(), second).await.unwrap().alert;

  let merged = wf
    .merge_in_case(&analyst(), second.alert_id, case.case_id)
    .await
    .unwrap();
  assert_eq!(merged.case_id, case.case_id);

  let fetched = wf.get_case(&analyst(), case.case_id).await.unwrap();
  assert!(fetched.case.description.contains("### Merged with alert #EDR-7 Malware detected"));
  assert!(fetched.case.description.contains("Dropper quarantined"));
  assert!(fetched.case.tags.contains("malware"));
  // The duplicate ip is not copied twice.
  assert_eq!(fetched.observables.len(), 2);

  let second = wf.get(&analyst(), second.alert_id).await.unwrap().alert;
  assert_eq!(second.case_id, Some(case.case_id));
  assert_eq!(second.status, AlertStatus::New);
}

#[tokio::test]
async fn merge_without_capability_leaves_case_unchanged() {
  let wf = workflow().await;
  let first = wf.create(&analyst(), request("ref-1")).await.unwrap().alert;
  let case = wf.create_case(&analyst(), first.alert_id).await.unwrap();
  let second = wf.create(&analyst(), request("ref-2")).await.unwrap().alert;

  let before = wf.get_case(&analyst(), case.case_id).await.unwrap();
  let err = wf
    .merge_in_case(&reader(), second.alert_id, case.case_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden { capability: Capability::ManageAlert }));

  let after = wf.get_case(&analyst(), case.case_id).await.unwrap();
  assert_eq!(after.case, before.case);
  assert_eq!(after.observables.len(), before.observables.len());
  assert_eq!(wf.get(&analyst(), second.alert_id).await.unwrap().alert.case_id, None);
}

#[tokio::test]
async fn merge_into_unknown_case_is_not_found() {
  let wf = workflow().await;
  let alert = wf.create(&analyst(), request("ref-1")).await.unwrap().alert;

  let err = wf
    .merge_in_case(&analyst(), alert.alert_id, Uuid::new_v4())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound { entity: "case", .. }));
}

#[tokio::test]
async fn merging_into_the_linked_case_again_changes_nothing() {
  let wf = workflow().await;
  let first = wf.create(&analyst(), request("ref-1")).await.unwrap().alert;
  let case = wf.create_case(&analyst(), first.alert_id).await.unwrap();
  let mut second = request("ref-2");
  second.observables = vec![ObservableSubmission::new("ip", Some("10.0.0.9"))];
  let second = wf.create(&analyst(), second).await.unwrap().alert;

  wf.merge_in_case(&analyst(), second.alert_id, case.case_id).await.unwrap();
  let once = wf.get_case(&analyst(), case.case_id).await.unwrap();

  let again = wf
    .merge_in_case(&analyst(), second.alert_id, case.case_id)
    .await
    .unwrap();
  assert_eq!(again, once.case);

  let twice = wf.get_case(&analyst(), case.case_id).await.unwrap();
  assert_eq!(twice.case.description.matches("### Merged with alert #ref-2").count(), 1);
  assert_eq!(twice.observables.len(), once.observables.len());
}

#[tokio::test]
async fn merging_a_linked_alert_into_another_case_conflicts() {
  let wf = workflow().await;
  let a = wf.create(&analyst(), request("ref-1")).await.unwrap().alert;
  let b = wf.create(&analyst(), request("ref-2")).await.unwrap().alert;
  let case_a = wf.create_case(&analyst(), a.alert_id).await.unwrap();
  let case_b = wf.create_case(&analyst(), b.alert_id).await.unwrap();

  let err = wf
    .merge_in_case(&analyst(), a.alert_id, case_b.case_id)
    .await
    .unwrap_err();
  assert_eq!(err.code(), "ConflictError");

  let alert = wf.get(&analyst(), a.alert_id).await.unwrap().alert;
  assert_eq!(alert.case_id, Some(case_a.case_id));
  let untouched = wf.get_case(&analyst(), case_b.case_id).await.unwrap();
  assert!(!untouched.case.description.contains("#ref-1"));
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn registered_observable_types_are_accepted() {
  let wf = workflow().await;
  let types = wf.store().observable_types().await.unwrap();
  assert!(types.iter().any(|t| t.name == "file" && t.is_attachment));

  wf.store()
    .add_observable_type(ObservableType { name: "cve".into(), is_attachment: false })
    .await
    .unwrap();

  let mut req = request("ref-1");
  req.observables = vec![ObservableSubmission::new("cve", Some("CVE-2024-3094"))];
  let created = wf.create(&analyst(), req).await.unwrap();
  assert_eq!(created.observables[0].data_type, "cve");
}

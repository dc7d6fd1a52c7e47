//! JSON REST API for Triage.
//!
//! Exposes an axum [`Router`] backed by an [`AlertWorkflow`] over any
//! [`TriageStore`]. Handlers read the acting identity from an
//! [`Extension<Actor>`](axum::Extension); authenticating the request and
//! inserting that extension is the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", triage_api::api_router(workflow.clone()))
//! ```

pub mod alerts;
pub mod cases;
pub mod error;
pub mod extract;

use axum::{
  Router,
  routing::{get, post},
};
use triage_core::{store::TriageStore, workflow::AlertWorkflow};

pub use error::ApiError;

/// Build a fully-materialised API router for `workflow`.
pub fn api_router<S>(workflow: AlertWorkflow<S>) -> Router<()>
where
  S: TriageStore + 'static,
{
  Router::new()
    // Alerts
    .route("/alerts", get(alerts::list::<S>).post(alerts::create::<S>))
    .route(
      "/alerts/{id}",
      get(alerts::get_one::<S>)
        .patch(alerts::update_one::<S>)
        .delete(alerts::delete_one::<S>),
    )
    .route("/alerts/{id}/markAsRead", post(alerts::mark_as_read::<S>))
    .route("/alerts/{id}/markAsUnread", post(alerts::mark_as_unread::<S>))
    .route("/alerts/{id}/follow", post(alerts::follow::<S>))
    .route("/alerts/{id}/unfollow", post(alerts::unfollow::<S>))
    .route("/alerts/{id}/merge/{case_id}", post(alerts::merge_in_case::<S>))
    .route("/alerts/{id}/createCase", post(alerts::create_case::<S>))
    // Cases and attachments
    .route("/cases/{id}", get(cases::get_one::<S>))
    .route("/attachments/{hash}", get(cases::attachment::<S>))
    .with_state(workflow)
}

// ─── Router tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    Extension,
    body::Body,
    http::{Request, StatusCode, header},
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use triage_core::permission::{Actor, Capability, ProfileGate};
  use triage_store_sqlite::SqliteStore;

  use super::*;

  async fn workflow() -> AlertWorkflow<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AlertWorkflow::new(Arc::new(store), Arc::new(ProfileGate))
  }

  fn analyst() -> Actor {
    Actor::new("alice", "soc", [Capability::ManageAlert, Capability::ManageCase])
  }

  async fn call(
    workflow: &AlertWorkflow<SqliteStore>,
    actor: Actor,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(body) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = api_router(workflow.clone())
      .layer(Extension(actor))
      .oneshot(req)
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
  }

  fn json_of(bytes: &[u8]) -> Value { serde_json::from_slice(bytes).unwrap() }

  fn new_alert(source_ref: &str) -> Value {
    json!({
      "type": "external",
      "source": "siem",
      "sourceRef": source_ref,
      "title": "Suspicious login",
      "severity": "high",
      "tags": ["auth"],
      "observables": [
        { "dataType": "ip", "data": "10.0.0.1" },
        { "dataType": "file", "data": "a.txt;text/plain;aGVsbG8=" }
      ]
    })
  }

  #[tokio::test]
  async fn create_then_get_alert() {
    let wf = workflow().await;
    let (status, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json_of(&body);
    assert_eq!(created["status"], "New");
    assert_eq!(created["severity"], "high");
    assert_eq!(created["observables"].as_array().unwrap().len(), 2);

    let id = created["alertId"].as_str().unwrap();
    let (status, body) = call(&wf, analyst(), "GET", &format!("/alerts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["sourceRef"], "ref-1");

    let (status, body) = call(&wf, analyst(), "GET", "/alerts?read=false", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body).as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn attachment_download_returns_bytes() {
    let wf = workflow().await;
    let (_, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    let created = json_of(&body);
    let hash = created["observables"][1]["data"]["attachment"]["hash"]
      .as_str()
      .unwrap()
      .to_owned();

    let (status, bytes) =
      call(&wf, analyst(), "GET", &format!("/attachments/{hash}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"hello");

    let (status, body) = call(&wf, analyst(), "GET", "/attachments/not-a-hash", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body)["type"], "NotFound");
  }

  #[tokio::test]
  async fn error_bodies_carry_stable_codes() {
    let wf = workflow().await;

    let mut bad = new_alert("ref-1");
    bad["observables"] = json!([{ "dataType": "file", "data": "bad-format" }]);
    let (status, body) = call(&wf, analyst(), "POST", "/alerts", Some(bad)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["type"], "AggregateError");

    let reader = Actor::new("rob", "soc", []);
    let (status, body) =
      call(&wf, reader, "POST", "/alerts", Some(new_alert("ref-1"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json_of(&body)["type"], "AuthorizationError");

    call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    let (status, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json_of(&body)["type"], "ConflictError");

    let missing = format!("/alerts/{}", uuid::Uuid::new_v4());
    let (status, body) = call(&wf, analyst(), "GET", &missing, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_of(&body)["message"].as_str().unwrap().contains("alert"));
  }

  #[tokio::test]
  async fn malformed_requests_are_bad_requests() {
    let wf = workflow().await;

    let mut untitled = new_alert("ref-1");
    untitled.as_object_mut().unwrap().remove("title");
    let (status, body) = call(&wf, analyst(), "POST", "/alerts", Some(untitled)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = json_of(&body);
    assert_eq!(body["type"], "BadRequest");
    assert!(body["message"].as_str().unwrap().contains("title"));

    let (status, body) = call(&wf, analyst(), "GET", "/alerts/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["type"], "BadRequest");

    let (status, body) = call(&wf, analyst(), "GET", "/alerts?read=maybe", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_of(&body)["type"], "BadRequest");

    // Nothing was created along the way.
    let (_, body) = call(&wf, analyst(), "GET", "/alerts", None).await;
    assert!(json_of(&body).as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn flags_and_delete_answer_no_content() {
    let wf = workflow().await;
    let (_, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    let id = json_of(&body)["alertId"].as_str().unwrap().to_owned();

    for action in ["markAsRead", "markAsRead", "unfollow", "follow"] {
      let uri = format!("/alerts/{id}/{action}");
      let (status, _) = call(&wf, analyst(), "POST", &uri, None).await;
      assert_eq!(status, StatusCode::NO_CONTENT, "{action}");
    }
    let (_, body) = call(&wf, analyst(), "GET", &format!("/alerts/{id}"), None).await;
    let alert = json_of(&body);
    assert_eq!(alert["read"], true);
    assert_eq!(alert["follow"], true);

    let (status, _) = call(&wf, analyst(), "DELETE", &format!("/alerts/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&wf, analyst(), "GET", &format!("/alerts/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn patch_updates_fields() {
    let wf = workflow().await;
    let (_, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    let id = json_of(&body)["alertId"].as_str().unwrap().to_owned();

    let changes = json!({ "title": "Brute force", "tlp": "red" });
    let (status, body) =
      call(&wf, analyst(), "PATCH", &format!("/alerts/{id}"), Some(changes)).await;
    assert_eq!(status, StatusCode::OK);
    let updated = json_of(&body);
    assert_eq!(updated["title"], "Brute force");
    assert_eq!(updated["tlp"], "red");
    assert_eq!(updated["updatedBy"], "alice");
  }

  #[tokio::test]
  async fn create_case_and_merge() {
    let wf = workflow().await;
    let (_, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-1"))).await;
    let first = json_of(&body)["alertId"].as_str().unwrap().to_owned();
    let (_, body) =
      call(&wf, analyst(), "POST", "/alerts", Some(new_alert("ref-2"))).await;
    let second = json_of(&body)["alertId"].as_str().unwrap().to_owned();

    let (status, body) =
      call(&wf, analyst(), "POST", &format!("/alerts/{first}/createCase"), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let case_id = json_of(&body)["caseId"].as_str().unwrap().to_owned();

    let (status, _) =
      call(&wf, analyst(), "POST", &format!("/alerts/{first}/createCase"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let uri = format!("/alerts/{second}/merge/{case_id}");
    let (status, body) = call(&wf, analyst(), "POST", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let description = json_of(&body)["description"].as_str().unwrap().to_owned();
    assert!(description.contains("Merged with alert #ref-2"));

    let (status, body) = call(&wf, analyst(), "GET", &format!("/cases/{case_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["number"], 1);
  }
}

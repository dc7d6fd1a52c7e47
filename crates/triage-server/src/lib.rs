//! HTTP server assembly for Triage.
//!
//! Wraps the [`triage_api`] router with Basic authentication and request
//! tracing, and loads reference data (case templates, extra observable
//! types) from the server configuration into the store.

pub mod auth;

use std::{collections::BTreeSet, path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use triage_core::{
  alert::{CustomFields, Severity, Tlp},
  case::CaseTemplate,
  observable::ObservableType,
  permission::Capability,
  store::TriageStore,
  workflow::AlertWorkflow,
};
use triage_store_sqlite::SqliteStore;

use auth::UserDirectory;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TRIAGE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  #[serde(default)]
  pub users:            Vec<UserConfig>,
  #[serde(default)]
  pub case_templates:   Vec<TemplateConfig>,
  #[serde(default)]
  pub observable_types: Vec<ObservableTypeConfig>,
}

/// One account allowed to call the API.
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string from `--hash-password`.
  pub password_hash: String,
  pub organisation:  String,
  #[serde(default)]
  pub capabilities:  Vec<Capability>,
}

/// A case template registered for one organisation at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct TemplateConfig {
  pub organisation:  String,
  pub name:          String,
  pub title_prefix:  Option<String>,
  pub description:   Option<String>,
  pub severity:      Option<Severity>,
  pub tlp:           Option<Tlp>,
  #[serde(default)]
  pub tags:          BTreeSet<String>,
  #[serde(default)]
  pub flag:          bool,
  /// Typed defaults, e.g. `owner = { type = "string", value = "soc" }`.
  /// Field names are read lowercased.
  #[serde(default)]
  pub custom_fields: CustomFields,
}

impl From<TemplateConfig> for CaseTemplate {
  fn from(c: TemplateConfig) -> Self {
    CaseTemplate {
      title_prefix: c.title_prefix,
      description: c.description,
      severity: c.severity,
      tlp: c.tlp,
      tags: c.tags,
      flag: c.flag,
      custom_fields: c.custom_fields,
      ..CaseTemplate::new(c.organisation, c.name)
    }
  }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObservableTypeConfig {
  pub name:          String,
  #[serde(default)]
  pub is_attachment: bool,
}

/// Register the configured templates and observable types with `store`.
pub async fn seed(store: &SqliteStore, config: &ServerConfig) -> triage_store_sqlite::Result<()> {
  for template in &config.case_templates {
    store.add_case_template(template.clone().into()).await?;
  }
  for data_type in &config.observable_types {
    store
      .add_observable_type(ObservableType {
        name:          data_type.name.clone(),
        is_attachment: data_type.is_attachment,
      })
      .await?;
  }
  tracing::debug!(
    templates = config.case_templates.len(),
    observable_types = config.observable_types.len(),
    "seeded reference data"
  );
  Ok(())
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the complete application: API routes behind Basic auth, traced.
pub fn router<S>(workflow: AlertWorkflow<S>, users: Arc<UserDirectory>) -> Router
where
  S: TriageStore + 'static,
{
  triage_api::api_router(workflow)
    .layer(middleware::from_fn_with_state(users, auth::authenticate))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ───────────────────────────────────────────────────────

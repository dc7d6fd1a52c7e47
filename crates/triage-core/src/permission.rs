//! Actors, capabilities and the permission gate.
//!
//! Authentication happens outside this crate; by the time a workflow runs,
//! the caller has resolved an [`Actor`] carrying its organisation and the
//! capabilities its profile grants there.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

/// A named permission held through an organisation profile.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Capability {
  ManageAlert,
  ManageCase,
}

/// The authenticated identity a workflow acts on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id:      String,
  pub organisation: String,
  pub capabilities: BTreeSet<Capability>,
}

impl Actor {
  pub fn new(
    user_id: impl Into<String>,
    organisation: impl Into<String>,
    capabilities: impl IntoIterator<Item = Capability>,
  ) -> Self {
    Self {
      user_id:      user_id.into(),
      organisation: organisation.into(),
      capabilities: capabilities.into_iter().collect(),
    }
  }
}

/// The resource a capability is checked against. Every resource in this
/// system is owned by exactly one organisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope<'a> {
  pub organisation: &'a str,
}

impl<'a> Scope<'a> {
  pub fn organisation(organisation: &'a str) -> Self { Self { organisation } }
}

/// Decides whether an actor may exercise a capability on a scope.
pub trait PermissionGate: Send + Sync {
  fn has_capability(
    &self,
    actor: &Actor,
    capability: Capability,
    scope: Scope<'_>,
  ) -> bool;

  /// Fail-closed form of [`PermissionGate::has_capability`].
  fn require(
    &self,
    actor: &Actor,
    capability: Capability,
    scope: Scope<'_>,
  ) -> Result<()> {
    if self.has_capability(actor, capability, scope) {
      Ok(())
    } else {
      Err(Error::forbidden(capability))
    }
  }
}

/// Grants a capability when the actor belongs to the scope's organisation
/// and its profile lists the capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileGate;

impl PermissionGate for ProfileGate {
  fn has_capability(
    &self,
    actor: &Actor,
    capability: Capability,
    scope: Scope<'_>,
  ) -> bool {
    actor.organisation == scope.organisation
      && actor.capabilities.contains(&capability)
  }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn capability_string_forms() {
    assert_eq!(Capability::ManageAlert.to_string(), "manageAlert");
    assert_eq!(
      Capability::from_str("manageCase").unwrap(),
      Capability::ManageCase
    );
  }

  #[test]
  fn profile_gate_requires_membership_and_capability() {
    let gate = ProfileGate;
    let analyst = Actor::new("alice", "soc", [Capability::ManageAlert]);

    assert!(gate.has_capability(
      &analyst,
      Capability::ManageAlert,
      Scope::organisation("soc")
    ));
    assert!(!gate.has_capability(
      &analyst,
      Capability::ManageCase,
      Scope::organisation("soc")
    ));
    assert!(!gate.has_capability(
      &analyst,
      Capability::ManageAlert,
      Scope::organisation("other")
    ));
  }

  #[test]
  fn require_fails_closed() {
    let reader = Actor::new("bob", "soc", []);
    let err = ProfileGate
      .require(&reader, Capability::ManageAlert, Scope::organisation("soc"))
      .unwrap_err();
    assert!(matches!(
      err,
      Error::Forbidden { capability: Capability::ManageAlert }
    ));
  }
}

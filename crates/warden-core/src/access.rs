//! Access evaluation over an already-resolved [`PermissionSet`].
//!
//! Everything here is pure and never fails: the same functions back the
//! server's request guard and the dashboard's UI gating. `manage` acts as a
//! wildcard over all actions of one resource, never across resources.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::permission::{Action, PermissionSet};

/// True iff `permissions` holds `(resource, action)` or `(resource, manage)`.
pub fn can_access(permissions: &PermissionSet, resource: &str, action: Action) -> bool {
    permissions.contains(resource, action) || permissions.contains(resource, Action::Manage)
}

/// A resource is visible in navigation when it can be read or managed.
pub fn is_visible(permissions: &PermissionSet, resource: &str) -> bool {
    can_access(permissions, resource, Action::Read)
}

/// A typed "may the user do any of these actions on this resource" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub resource: String,
    pub actions: BTreeSet<Action>,
}

impl AccessRequest {
    pub fn new(resource: impl Into<String>, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            resource: resource.into(),
            actions: actions.into_iter().collect(),
        }
    }

    pub fn single(resource: impl Into<String>, action: Action) -> Self {
        Self::new(resource, [action])
    }

    /// Parse the legacy `"resource:action1|action2"` form.
    ///
    /// Returns `None` (and logs a diagnostic) when the string does not have a
    /// non-empty resource and action part. Unknown action names are skipped
    /// with a diagnostic; if none remain the request is still returned and
    /// evaluates to "deny".
    pub fn parse_lenient(spec: &str) -> Option<Self> {
        let Some((resource, actions)) = spec.split_once(':') else {
            warn!(permission = spec, "invalid permission format, expected resource:action");
            return None;
        };
        let resource = resource.trim();
        if resource.is_empty() || actions.trim().is_empty() {
            warn!(permission = spec, "invalid permission format, expected resource:action");
            return None;
        }

        let mut parsed = BTreeSet::new();
        for name in actions.split('|').map(str::trim) {
            match name.parse::<Action>() {
                Ok(action) => {
                    parsed.insert(action);
                }
                Err(err) => warn!(permission = spec, %err, "ignoring unknown action"),
            }
        }

        Some(Self {
            resource: resource.to_string(),
            actions: parsed,
        })
    }
}

impl fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<&str> = self.actions.iter().map(|a| a.as_str()).collect();
        write!(f, "{}:{}", self.resource, actions.join("|"))
    }
}

/// True iff at least one requested action is allowed. An empty action set
/// denies.
pub fn can_perform(permissions: &PermissionSet, request: &AccessRequest) -> bool {
    request
        .actions
        .iter()
        .any(|action| can_access(permissions, &request.resource, *action))
}

/// String form of [`can_perform`] for legacy callers; malformed input denies.
pub fn can_perform_str(permissions: &PermissionSet, spec: &str) -> bool {
    AccessRequest::parse_lenient(spec)
        .map(|request| can_perform(permissions, &request))
        .unwrap_or(false)
}

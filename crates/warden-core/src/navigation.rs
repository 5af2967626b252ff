//! Route gating and navigation filtering for the dashboard.

use serde::{Deserialize, Serialize};

use crate::access::is_visible;
use crate::models::permission::PermissionSet;

/// Maps dashboard paths to the resource that guards them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteMap {
    routes: Vec<(String, String)>,
}

impl Default for RouteMap {
    fn default() -> Self {
        Self::new()
            .with_route("/dashboard", "dashboard")
            .with_route("/users", "users")
            .with_route("/groups", "groups")
            .with_route("/rules", "rules")
            // Editing a group's rules is a group operation.
            .with_route("/groups/*/rules", "groups")
    }
}

/// Segment-wise match where a `*` segment stands for any single segment.
fn route_matches(pattern: &str, path: &str) -> bool {
    let mut pattern = pattern.split('/');
    let mut path = path.split('/');
    loop {
        match (pattern.next(), path.next()) {
            (None, None) => return true,
            (Some("*"), Some(segment)) if !segment.is_empty() => {}
            (Some(expected), Some(segment)) if expected == segment => {}
            _ => return false,
        }
    }
}

impl RouteMap {
    /// A map with no routes; every path is then treated as unguarded.
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Guard `path` with `resource`. A `*` segment in `path` matches any
    /// single segment, e.g. `/groups/*/rules`.
    pub fn with_route(mut self, path: impl Into<String>, resource: impl Into<String>) -> Self {
        self.routes.push((path.into(), resource.into()));
        self
    }

    /// The resource guarding `path`, if any. The first matching route wins.
    pub fn resource_for(&self, path: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|(route, _)| route_matches(route, path))
            .map(|(_, resource)| resource.as_str())
    }
}

/// Unknown paths (home, login, ...) are always accessible; known paths
/// need read or manage on their resource.
pub fn can_access_route(permissions: &PermissionSet, routes: &RouteMap, path: &str) -> bool {
    match routes.resource_for(path) {
        Some(resource) => is_visible(permissions, resource),
        None => true,
    }
}

/// A node of the sidebar navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavNode {
    Item {
        name: String,
        /// Target path; items without one (titles, dividers) are always shown.
        to: Option<String>,
    },
    Section {
        name: String,
        children: Vec<NavNode>,
    },
}

impl NavNode {
    pub fn item(name: impl Into<String>, to: impl Into<String>) -> Self {
        NavNode::Item {
            name: name.into(),
            to: Some(to.into()),
        }
    }

    pub fn title(name: impl Into<String>) -> Self {
        NavNode::Item {
            name: name.into(),
            to: None,
        }
    }

    pub fn section(name: impl Into<String>, children: Vec<NavNode>) -> Self {
        NavNode::Section {
            name: name.into(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NavNode::Item { name, .. } | NavNode::Section { name, .. } => name,
        }
    }
}

/// Drop every item the user cannot reach. Sections are filtered
/// recursively and removed once they have no children left.
pub fn filter_nav(nodes: &[NavNode], permissions: &PermissionSet, routes: &RouteMap) -> Vec<NavNode> {
    nodes
        .iter()
        .filter_map(|node| match node {
            NavNode::Section { name, children } => {
                let children = filter_nav(children, permissions, routes);
                (!children.is_empty()).then(|| NavNode::Section {
                    name: name.clone(),
                    children,
                })
            }
            NavNode::Item { to: Some(path), .. } => {
                can_access_route(permissions, routes, path).then(|| node.clone())
            }
            NavNode::Item { to: None, .. } => Some(node.clone()),
        })
        .collect()
}

//! Subnet routes derived from node state.
//!
//! Headscale v1 has no route entity of its own: a node advertises prefixes in
//! `subnetRoutes` and an administrator approves a subset in `approvedRoutes`.
//! A [`Route`] pairs each advertised prefix with whether it is approved.

use crate::models::Node;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A subnet route advertised by a node.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Route {
    /// Route identifier. This is the prefix itself, so two nodes advertising
    /// the same prefix share an id; use [`Route::node_id`] to tell them apart.
    pub id: String,
    /// Advertised prefix.
    pub prefix: String,
    /// Whether the prefix is approved.
    pub enabled: bool,
    /// Identifier of the advertising node.
    pub node_id: String,
    /// The advertising node.
    pub node: Node,
    /// Creation timestamp of the advertising node.
    pub created_at: Option<DateTime<Utc>>,
}

/// Derive the routes advertised by a single node, in advertisement order.
#[must_use]
pub fn node_routes(node: &Node) -> Vec<Route> {
    node.subnet_routes
        .iter()
        .map(|prefix| Route {
            id: prefix.clone(),
            prefix: prefix.clone(),
            enabled: node.approved_routes.contains(prefix),
            node_id: node.id.clone(),
            node: node.clone(),
            created_at: node.created_at,
        })
        .collect()
}

/// Derive the routes of every node, preserving node order.
#[must_use]
pub fn all_routes<'a, I>(nodes: I) -> Vec<Route>
where
    I: IntoIterator<Item = &'a Node>,
{
    nodes.into_iter().flat_map(node_routes).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, advertised: &[&str], approved: &[&str]) -> Node {
        Node {
            id: id.to_string(),
            subnet_routes: advertised.iter().map(ToString::to_string).collect(),
            approved_routes: approved.iter().map(ToString::to_string).collect(),
            ..Node::default()
        }
    }

    #[test]
    fn approved_prefixes_are_enabled() {
        let node = node("1", &["10.0.0.0/24", "10.1.0.0/24"], &["10.0.0.0/24"]);
        let routes = node_routes(&node);

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].prefix, "10.0.0.0/24");
        assert!(routes[0].enabled);
        assert_eq!(routes[1].prefix, "10.1.0.0/24");
        assert!(!routes[1].enabled);
        assert!(routes.iter().all(|route| route.id == route.prefix));
        assert!(routes.iter().all(|route| route.node_id == "1"));
    }

    #[test]
    fn approved_but_not_advertised_is_ignored() {
        let node = node("1", &[], &["10.0.0.0/24"]);
        assert!(node_routes(&node).is_empty());
    }

    #[test]
    fn all_routes_flattens_in_order() {
        let nodes = vec![
            node("1", &["10.0.0.0/24"], &[]),
            node("2", &[], &[]),
            node("3", &["10.0.0.0/24", "0.0.0.0/0"], &["0.0.0.0/0"]),
        ];
        let routes = all_routes(&nodes);

        let summary: Vec<_> = routes
            .iter()
            .map(|route| (route.node_id.as_str(), route.prefix.as_str(), route.enabled))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("1", "10.0.0.0/24", false),
                ("3", "10.0.0.0/24", false),
                ("3", "0.0.0.0/0", true),
            ]
        );
    }
}

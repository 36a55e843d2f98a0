//! The Headscale service abstraction consumed by resource providers.
//!
//! [`HeadscaleApi`] is implemented by [`crate::HeadscaleClient`]; providers
//! should depend on the trait so tests can substitute a mock.

use crate::models::{ApiKey, CreatePreAuthKeyRequest, Node, NodeListParams, PreAuthKey, User};
use crate::routes::{self, Route};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use headscale_core::Error;

/// Operations a provider performs against Headscale.
///
/// Every method is one request/response round trip (the route views issue
/// one listing call). Nothing is retried or cached. Implementations must be
/// safe to share across tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HeadscaleApi: Send + Sync {
    /// List API keys.
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>>;

    /// Create an API key and return its secret. The secret is only ever
    /// returned here.
    async fn create_api_key(&self, expiration: Option<DateTime<Utc>>) -> Result<String>;

    /// Expire the API key with the given prefix.
    async fn expire_api_key(&self, prefix: &str) -> Result<()>;

    /// Delete the API key with the given prefix.
    async fn delete_api_key(&self, prefix: &str) -> Result<()>;

    /// List nodes, optionally restricted to one user.
    async fn list_devices(&self, params: &NodeListParams) -> Result<Vec<Node>>;

    /// Fetch a node.
    async fn get_device(&self, node_id: &str) -> Result<Node>;

    /// Register a node for `user` using a node registration key.
    async fn create_device(&self, user: &str, key: &str) -> Result<Node>;

    /// Expire a node's key.
    async fn expire_device(&self, node_id: &str) -> Result<Node>;

    /// Delete a node.
    async fn delete_device(&self, node_id: &str) -> Result<()>;

    /// Rename a node.
    async fn rename_device(&self, node_id: &str, new_name: &str) -> Result<Node>;

    /// Replace a node's forced tags.
    async fn tag_device(&self, node_id: &str, tags: &[String]) -> Result<Node>;

    /// Transfer a node to another user.
    async fn move_device(&self, node_id: &str, user: &str) -> Result<Node>;

    /// Replace the set of approved routes of a node.
    async fn set_approved_routes(&self, node_id: &str, routes: &[String]) -> Result<Node>;

    /// List the pre-auth keys of a user.
    async fn list_pre_auth_keys(&self, user: &str) -> Result<Vec<PreAuthKey>>;

    /// Create a pre-auth key.
    async fn create_pre_auth_key(&self, request: &CreatePreAuthKeyRequest) -> Result<PreAuthKey>;

    /// Expire a pre-auth key. Keys that are already expired or used count as
    /// expired.
    async fn expire_pre_auth_key(&self, user: &str, key: &str) -> Result<()>;

    /// List all users.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] carrying the id when no user matches.
    async fn get_user_by_id(&self, user_id: &str) -> Result<User>;

    /// Fetch a user by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] carrying the name when no user matches.
    async fn get_user_by_name(&self, name: &str) -> Result<User>;

    /// Fetch a user by e-mail address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] carrying the address when no user matches.
    async fn get_user_by_email(&self, email: &str) -> Result<User>;

    /// Create a user.
    async fn create_user(&self, name: &str) -> Result<User>;

    /// Delete a user.
    async fn delete_user(&self, user_id: &str) -> Result<()>;

    /// Rename a user.
    async fn rename_user(&self, old_id: &str, new_name: &str) -> Result<User>;

    /// Routes advertised by one node.
    async fn get_device_routes(&self, node_id: &str) -> Result<Vec<Route>> {
        let node = self.get_device(node_id).await?;
        Ok(routes::node_routes(&node))
    }

    /// Routes advertised by every node.
    async fn list_routes(&self) -> Result<Vec<Route>> {
        let nodes = self.list_devices(&NodeListParams::default()).await?;
        Ok(routes::all_routes(&nodes))
    }

    /// Delete a route. Not supported; use [`HeadscaleApi::set_approved_routes`].
    async fn delete_route(&self, _route_id: &str) -> Result<()> {
        Err(not_implemented("DeleteRoute"))
    }

    /// Disable a route. Not supported; use [`HeadscaleApi::set_approved_routes`].
    async fn disable_route(&self, _route_id: &str) -> Result<()> {
        Err(not_implemented("DisableRoute"))
    }

    /// Enable a route. Not supported; use [`HeadscaleApi::set_approved_routes`].
    async fn enable_route(&self, _route_id: &str) -> Result<()> {
        Err(not_implemented("EnableRoute"))
    }
}

fn not_implemented(operation: &str) -> Error {
    Error::NotImplemented(format!(
        "{operation} is not implemented in this provider version"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn mock_stands_in_for_the_client() {
        let mut mock = MockHeadscaleApi::new();
        mock.expect_get_user_by_name()
            .with(mockall::predicate::eq("alice"))
            .times(1)
            .returning(|name| Err(Error::NotFound(format!("user {name:?}"))));
        mock.expect_create_user()
            .with(mockall::predicate::eq("alice"))
            .times(1)
            .returning(|name| {
                Ok(User {
                    id: "1".into(),
                    name: name.to_string(),
                    ..User::default()
                })
            });

        let api: Arc<dyn HeadscaleApi> = Arc::new(mock);
        let err = api.get_user_by_name("alice").await.unwrap_err();
        assert!(err.is_not_found());

        let user = api.create_user("alice").await.unwrap();
        assert_eq!(user.id, "1");
    }

    #[test]
    fn not_implemented_message() {
        assert_eq!(
            not_implemented("EnableRoute").to_string(),
            "Not implemented: EnableRoute is not implemented in this provider version"
        );
    }
}

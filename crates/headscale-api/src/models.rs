//! Headscale API v1 models.
//!
//! Entities mirror the JSON emitted by the Headscale gRPC gateway: camelCase
//! field names, string identifiers, RFC 3339 timestamps. Unpopulated fields
//! may be omitted by the server, so collections and scalars default.
//!
//! Every response envelope implements [`Validate`]; the client validates a
//! payload before extracting anything from it.

use chrono::{DateTime, Utc};
use headscale_core::query::QueryParams;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

/// Prefix every Headscale ACL tag carries.
pub const TAG_PREFIX: &str = "tag:";

/// A node (device) registered with Headscale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// Machine public key.
    #[serde(default)]
    pub machine_key: String,
    /// Node public key.
    #[serde(default)]
    pub node_key: String,
    /// Disco public key.
    #[serde(default)]
    pub disco_key: String,
    /// Tailnet addresses assigned to the node.
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    /// Hostname reported by the node.
    #[serde(default)]
    pub name: String,
    /// Owning user.
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Last time the node talked to the control server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    /// Key expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Pre-auth key used to register the node.
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_auth_key: Option<PreAuthKey>,
    /// Registration timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// How the node was registered.
    #[serde(default)]
    pub register_method: RegisterMethod,
    /// Tags forced by an administrator.
    #[validate(custom(function = "validate_tags"))]
    #[serde(default)]
    pub forced_tags: Vec<String>,
    /// Requested tags the policy rejected.
    #[serde(default)]
    pub invalid_tags: Vec<String>,
    /// Requested tags the policy accepted.
    #[validate(custom(function = "validate_tags"))]
    #[serde(default)]
    pub valid_tags: Vec<String>,
    /// Administrator-assigned name, unique in the tailnet.
    #[serde(default)]
    pub given_name: String,
    /// Whether the node currently holds a connection.
    #[serde(default)]
    pub online: bool,
    /// Subnet routes approved by an administrator.
    #[validate(custom(function = "validate_prefixes"))]
    #[serde(default)]
    pub approved_routes: Vec<String>,
    /// Subnet routes the node announces.
    #[validate(custom(function = "validate_prefixes"))]
    #[serde(default)]
    pub available_routes: Vec<String>,
    /// Subnet routes the node advertises.
    #[validate(custom(function = "validate_prefixes"))]
    #[serde(default)]
    pub subnet_routes: Vec<String>,
}

/// Registration method of a node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegisterMethod {
    /// No method reported.
    #[default]
    #[serde(rename = "REGISTER_METHOD_UNSPECIFIED")]
    Unspecified,
    /// Registered with a pre-auth key.
    #[serde(rename = "REGISTER_METHOD_AUTH_KEY")]
    AuthKey,
    /// Registered from the command line.
    #[serde(rename = "REGISTER_METHOD_CLI")]
    Cli,
    /// Registered through OpenID Connect.
    #[serde(rename = "REGISTER_METHOD_OIDC")]
    Oidc,
    /// A method this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A Headscale user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// User name.
    #[serde(default)]
    pub name: String,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// E-mail address.
    #[serde(default)]
    pub email: String,
    /// Identifier at the identity provider.
    #[serde(default)]
    pub provider_id: String,
    /// Identity provider name.
    #[serde(default)]
    pub provider: String,
    /// Profile picture URL.
    #[serde(default)]
    pub profile_pic_url: String,
}

/// A pre-authorization key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreAuthKey {
    /// Owning user.
    #[validate(nested)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PreAuthKeyOwner>,
    /// Key identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// Key material.
    #[serde(default)]
    pub key: String,
    /// Whether the key may register more than one node.
    #[serde(default)]
    pub reusable: bool,
    /// Whether nodes registered with the key are ephemeral.
    #[serde(default)]
    pub ephemeral: bool,
    /// Whether the key has been used.
    #[serde(default)]
    pub used: bool,
    /// Expiration timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Tags applied to nodes registered with the key.
    #[validate(custom(function = "validate_tags"))]
    #[serde(default)]
    pub acl_tags: Vec<String>,
}

/// Owner of a pre-auth key.
///
/// Headscale 0.26 and later embed the user; older servers send its name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PreAuthKeyOwner {
    /// Embedded user entity.
    User(User),
    /// Bare user name or id.
    Name(String),
}

impl PreAuthKeyOwner {
    /// Name of the owning user, whichever shape the server sent.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::User(user) => &user.name,
            Self::Name(name) => name,
        }
    }

    /// The embedded user, if the server sent one.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            Self::Name(_) => None,
        }
    }
}

impl Validate for PreAuthKeyOwner {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::User(user) => user.validate(),
            Self::Name(_) => Ok(()),
        }
    }
}

/// An API key as listed by Headscale. The secret itself is never listed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    /// Key identifier.
    #[validate(length(min = 1))]
    pub id: String,
    /// Public prefix of the key.
    #[validate(length(min = 1))]
    pub prefix: String,
    /// Expiration timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last time the key was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

// Request payloads

/// Request payload for creating a pre-auth key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreAuthKeyRequest {
    /// User the key belongs to.
    pub user: String,
    /// Allow more than one registration.
    pub reusable: bool,
    /// Register nodes as ephemeral.
    pub ephemeral: bool,
    /// Optional expiration; the server default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Tags applied to nodes registered with the key.
    #[serde(default)]
    pub acl_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct CreateApiKeyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExpireApiKeyRequest<'a> {
    pub prefix: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExpirePreAuthKeyRequest<'a> {
    pub user: &'a str,
    pub key: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SetTagsRequest<'a> {
    pub tags: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MoveNodeRequest<'a> {
    pub user: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SetApprovedRoutesRequest<'a> {
    pub routes: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateUserRequest<'a> {
    pub name: &'a str,
}

// Response envelopes

/// Response of `GET /api/v1/apikey`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListApiKeysResponse {
    /// Listed keys.
    #[validate(nested)]
    #[serde(default)]
    pub api_keys: Vec<ApiKey>,
}

/// Response of `POST /api/v1/apikey`.
#[derive(Debug, Clone, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyResponse {
    /// The full secret, returned only once.
    #[validate(length(min = 1))]
    pub api_key: String,
}

/// Response of `GET /api/v1/node`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Validate)]
pub struct ListNodesResponse {
    /// Listed nodes.
    #[validate(nested)]
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// Response carrying a single node.
#[derive(Debug, Clone, Deserialize, PartialEq, Validate)]
pub struct NodeResponse {
    /// The node.
    #[validate(nested)]
    pub node: Node,
}

/// Response of `GET /api/v1/preauthkey`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListPreAuthKeysResponse {
    /// Listed keys.
    #[validate(nested)]
    #[serde(default)]
    pub pre_auth_keys: Vec<PreAuthKey>,
}

/// Response of `POST /api/v1/preauthkey`.
#[derive(Debug, Clone, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreAuthKeyResponse {
    /// The created key.
    #[validate(nested)]
    pub pre_auth_key: PreAuthKey,
}

/// Response of `GET /api/v1/user`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Validate)]
pub struct ListUsersResponse {
    /// Listed users.
    #[validate(nested)]
    #[serde(default)]
    pub users: Vec<User>,
}

/// Response carrying a single user.
#[derive(Debug, Clone, Deserialize, PartialEq, Validate)]
pub struct UserResponse {
    /// The user.
    #[validate(nested)]
    pub user: User,
}

// Query parameters

/// Query parameters for listing nodes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeListParams {
    /// Only nodes owned by this user.
    pub user: Option<String>,
}

impl NodeListParams {
    /// Restrict the listing to one user.
    #[must_use]
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: Some(user.into()),
        }
    }

    /// Convert to URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("user", self.user.as_deref());
        params.into_pairs()
    }
}

/// Query parameters for listing users. Headscale filters server side.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserListParams {
    /// Filter by user id.
    pub id: Option<String>,
    /// Filter by user name.
    pub name: Option<String>,
    /// Filter by e-mail address.
    pub email: Option<String>,
}

impl UserListParams {
    /// Convert to URL query pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut params = QueryParams::new();
        params.push_opt("id", self.id.as_deref());
        params.push_opt("name", self.name.as_deref());
        params.push_opt("email", self.email.as_deref());
        params.into_pairs()
    }
}

#[allow(clippy::ptr_arg)]
fn validate_prefixes(prefixes: &Vec<String>) -> Result<(), ValidationError> {
    match prefixes.iter().find(|prefix| prefix.parse::<IpNet>().is_err()) {
        Some(prefix) => {
            let mut error = ValidationError::new("cidr");
            error.message = Some(Cow::Owned(format!("`{prefix}` is not a CIDR prefix")));
            Err(error)
        }
        None => Ok(()),
    }
}

#[allow(clippy::ptr_arg)]
fn validate_tags(tags: &Vec<String>) -> Result<(), ValidationError> {
    match tags.iter().find(|tag| !tag.starts_with(TAG_PREFIX)) {
        Some(tag) => {
            let mut error = ValidationError::new("tag");
            error.message = Some(Cow::Owned(format!(
                "`{tag}` does not start with `{TAG_PREFIX}`"
            )));
            Err(error)
        }
        None => Ok(()),
    }
}

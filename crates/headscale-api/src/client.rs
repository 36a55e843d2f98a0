//! Asynchronous Headscale client implementation.

use crate::models::{
    ApiKey, CreateApiKeyRequest, CreateApiKeyResponse, CreatePreAuthKeyRequest,
    CreateUserRequest, ExpireApiKeyRequest, ExpirePreAuthKeyRequest, ListApiKeysResponse,
    ListNodesResponse, ListPreAuthKeysResponse, ListUsersResponse, MoveNodeRequest, Node,
    NodeListParams, NodeResponse, PreAuthKey, PreAuthKeyResponse, SetApprovedRoutesRequest,
    SetTagsRequest, User, UserListParams, UserResponse,
};
use crate::service::HeadscaleApi;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use headscale_core::client::ClientConfig;
use headscale_core::config::{parse_endpoint, HeadscaleConfig};
use headscale_core::query::QueryParams;
use headscale_core::Error;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};
use url::Url;
use validator::Validate;

const USER_AGENT: &str = concat!("headscale-api/", env!("CARGO_PKG_VERSION"));
const API_PREFIX: [&str; 2] = ["api", "v1"];

/// Service messages meaning a pre-auth key can no longer be used.
const SPENT_KEY_MESSAGES: [&str; 2] = ["AuthKey expired", "AuthKey has already been used"];

/// Builder for [`HeadscaleClient`].
#[derive(Debug, Clone)]
pub struct HeadscaleClientBuilder {
    base_url: Url,
    token: Option<SecretString>,
    http_config: ClientConfig,
    tls_verify: bool,
    tls_ca_cert: Option<PathBuf>,
}

impl HeadscaleClientBuilder {
    /// Create a builder for the specified endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint is not a usable URL.
    pub fn new(endpoint: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            base_url: parse_endpoint(endpoint.as_ref())?,
            token: None,
            http_config: ClientConfig::new(),
            tls_verify: true,
            tls_ca_cert: None,
        })
    }

    /// Set the API key sent as a bearer token.
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_secret_token(SecretString::from(token.into()))
    }

    /// Set the API key from an already protected secret.
    #[must_use]
    pub fn with_secret_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Trust an additional PEM encoded CA certificate.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if no API key was given, the CA
    /// certificate cannot be loaded, or the HTTP client cannot be built.
    pub fn build(self) -> Result<HeadscaleClient> {
        let token = self
            .token
            .filter(|token| !token.expose_secret().is_empty())
            .ok_or_else(|| Error::ConfigError("Headscale API key is required".to_string()))?;

        let mut builder = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .connect_timeout(self.http_config.connect_timeout);

        if let Some(timeout) = self.http_config.timeout {
            builder = builder.timeout(timeout);
        }

        if !self.http_config.enable_compression {
            builder = builder.no_gzip();
        }

        if !self.tls_verify {
            warn!(endpoint = %self.base_url, "TLS verification disabled for Headscale client");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_cert) = &self.tls_ca_cert {
            debug!("loading Headscale CA certificate from {}", ca_cert.display());
            let bytes = std::fs::read(ca_cert).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read Headscale CA certificate {}: {err}",
                    ca_cert.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes).map_err(|err| {
                Error::ConfigError(format!("Invalid Headscale CA certificate: {err}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(|err| {
            Error::ConfigError(format!("Failed to build Headscale HTTP client: {err}"))
        })?;

        Ok(HeadscaleClient {
            http,
            base_url: self.base_url,
            token,
        })
    }
}

/// Asynchronous Headscale client.
///
/// Cloning is cheap and clones share one connection pool, so a single client
/// can serve concurrent callers.
#[derive(Clone)]
pub struct HeadscaleClient {
    http: Client,
    base_url: Url,
    token: SecretString,
}

impl std::fmt::Debug for HeadscaleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadscaleClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HeadscaleClient {
    /// Construct a client from an endpoint and API key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the endpoint is not a usable URL or
    /// the key is empty. No request is made.
    pub fn new(endpoint: impl AsRef<str>, token: impl Into<String>) -> Result<Self> {
        HeadscaleClientBuilder::new(endpoint)?
            .with_token(token)
            .build()
    }

    /// Construct a client from a [`HeadscaleConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration cannot produce a client.
    pub fn from_config(config: &HeadscaleConfig) -> Result<Self> {
        let mut http_config = ClientConfig::new();
        if let Some(timeout) = config.timeout() {
            http_config = http_config.with_timeout(timeout);
        }

        let mut builder = HeadscaleClientBuilder::new(&config.endpoint)?
            .with_secret_token(config.token.clone())
            .with_http_config(http_config)
            .with_tls_verify(config.tls_verify);
        if let Some(ca_cert) = &config.tls_ca_cert {
            builder = builder.with_ca_cert(ca_cert.clone());
        }
        builder.build()
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn query_users(&self, params: &UserListParams) -> Result<Vec<User>> {
        let response: ListUsersResponse = self
            .fetch::<_, ()>("ListUsers", Method::GET, &["user"], &params.to_pairs(), None)
            .await?;
        Ok(response.users)
    }

    async fn find_user(&self, params: UserListParams, key: &str) -> Result<User> {
        self.query_users(&params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("user {key:?}")))
    }

    fn build_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                Error::InvalidEndpoint(format!(
                    "Headscale endpoint `{}` cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(API_PREFIX.iter().chain(segments));
        Ok(url)
    }

    /// Send a request and validate the decoded payload.
    async fn fetch<R, B>(
        &self,
        operation: &'static str,
        method: Method,
        segments: &[&str],
        params: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned + Validate,
    {
        let bytes = self
            .execute(operation, method, segments, params, body)
            .await
            .map_err(|err| err.in_operation(operation))?;

        let payload: R = deserialize_body(operation, &bytes)?;
        payload.validate()?;
        Ok(payload)
    }

    /// Send a request whose response body is ignored.
    async fn send_empty<B>(
        &self,
        operation: &'static str,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.execute(operation, method, segments, &[], body)
            .await
            .map(|_| ())
            .map_err(|err| err.in_operation(operation))
    }

    /// Perform one round trip. Failures come back unwrapped so callers can
    /// inspect them before normalizing.
    async fn execute<B>(
        &self,
        operation: &'static str,
        method: Method,
        segments: &[&str],
        params: &[(&'static str, String)],
        body: Option<&B>,
    ) -> Result<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        let url = self.build_url(segments)?;
        debug!(operation, %method, path = url.path(), "Headscale request");

        let mut request = self
            .http
            .request(method, url)
            .query(params)
            .bearer_auth(self.token.expose_secret())
            .header(ACCEPT, "application/json");
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|err| {
            Error::HttpError(format!("Failed to read Headscale response body: {err}"))
        })?;

        if status.is_success() {
            Ok(bytes.to_vec())
        } else {
            Err(Error::from_response(status.as_u16(), &bytes))
        }
    }
}

#[async_trait]
impl HeadscaleApi for HeadscaleClient {
    async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        let response: ListApiKeysResponse = self
            .fetch::<_, ()>("ListApiKeys", Method::GET, &["apikey"], &[], None)
            .await?;
        Ok(response.api_keys)
    }

    async fn create_api_key(&self, expiration: Option<DateTime<Utc>>) -> Result<String> {
        let request = CreateApiKeyRequest { expiration };
        let response: CreateApiKeyResponse = self
            .fetch("CreateApiKey", Method::POST, &["apikey"], &[], Some(&request))
            .await?;
        Ok(response.api_key)
    }

    async fn expire_api_key(&self, prefix: &str) -> Result<()> {
        let request = ExpireApiKeyRequest { prefix };
        self.send_empty(
            "ExpireApiKey",
            Method::POST,
            &["apikey", "expire"],
            Some(&request),
        )
        .await
    }

    async fn delete_api_key(&self, prefix: &str) -> Result<()> {
        self.send_empty::<()>("DeleteApiKey", Method::DELETE, &["apikey", prefix], None)
            .await
    }

    async fn list_devices(&self, params: &NodeListParams) -> Result<Vec<Node>> {
        let response: ListNodesResponse = self
            .fetch::<_, ()>("ListNodes", Method::GET, &["node"], &params.to_pairs(), None)
            .await?;
        Ok(response.nodes)
    }

    async fn get_device(&self, node_id: &str) -> Result<Node> {
        let response: NodeResponse = self
            .fetch::<_, ()>("GetNode", Method::GET, &["node", node_id], &[], None)
            .await?;
        Ok(response.node)
    }

    async fn create_device(&self, user: &str, key: &str) -> Result<Node> {
        let mut params = QueryParams::new();
        params.push("user", user);
        params.push("key", key);

        let response: NodeResponse = self
            .fetch::<_, ()>(
                "RegisterNode",
                Method::POST,
                &["node", "register"],
                &params.into_pairs(),
                None,
            )
            .await?;
        Ok(response.node)
    }

    async fn expire_device(&self, node_id: &str) -> Result<Node> {
        let response: NodeResponse = self
            .fetch::<_, ()>(
                "ExpireNode",
                Method::POST,
                &["node", node_id, "expire"],
                &[],
                None,
            )
            .await?;
        Ok(response.node)
    }

    async fn delete_device(&self, node_id: &str) -> Result<()> {
        self.send_empty::<()>("DeleteNode", Method::DELETE, &["node", node_id], None)
            .await
    }

    async fn rename_device(&self, node_id: &str, new_name: &str) -> Result<Node> {
        let response: NodeResponse = self
            .fetch::<_, ()>(
                "RenameNode",
                Method::POST,
                &["node", node_id, "rename", new_name],
                &[],
                None,
            )
            .await?;
        Ok(response.node)
    }

    async fn tag_device(&self, node_id: &str, tags: &[String]) -> Result<Node> {
        let request = SetTagsRequest { tags };
        let response: NodeResponse = self
            .fetch(
                "SetTags",
                Method::POST,
                &["node", node_id, "tags"],
                &[],
                Some(&request),
            )
            .await?;
        Ok(response.node)
    }

    async fn move_device(&self, node_id: &str, user: &str) -> Result<Node> {
        let request = MoveNodeRequest { user };
        let response: NodeResponse = self
            .fetch(
                "MoveNode",
                Method::POST,
                &["node", node_id, "user"],
                &[],
                Some(&request),
            )
            .await?;
        Ok(response.node)
    }

    async fn set_approved_routes(&self, node_id: &str, routes: &[String]) -> Result<Node> {
        let request = SetApprovedRoutesRequest { routes };
        let response: NodeResponse = self
            .fetch(
                "SetApprovedRoutes",
                Method::POST,
                &["node", node_id, "approve_routes"],
                &[],
                Some(&request),
            )
            .await?;
        Ok(response.node)
    }

    async fn list_pre_auth_keys(&self, user: &str) -> Result<Vec<PreAuthKey>> {
        let mut params = QueryParams::new();
        params.push("user", user);

        let response: ListPreAuthKeysResponse = self
            .fetch::<_, ()>(
                "ListPreAuthKeys",
                Method::GET,
                &["preauthkey"],
                &params.into_pairs(),
                None,
            )
            .await?;
        Ok(response.pre_auth_keys)
    }

    async fn create_pre_auth_key(&self, request: &CreatePreAuthKeyRequest) -> Result<PreAuthKey> {
        let response: PreAuthKeyResponse = self
            .fetch(
                "CreatePreAuthKey",
                Method::POST,
                &["preauthkey"],
                &[],
                Some(request),
            )
            .await?;
        Ok(response.pre_auth_key)
    }

    async fn expire_pre_auth_key(&self, user: &str, key: &str) -> Result<()> {
        const OPERATION: &str = "ExpirePreAuthKey";
        let request = ExpirePreAuthKeyRequest { user, key };

        match self
            .execute(
                OPERATION,
                Method::POST,
                &["preauthkey", "expire"],
                &[],
                Some(&request),
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_spent_key(&err) => {
                debug!(user, "pre-auth key already expired or used");
                Ok(())
            }
            Err(err) => Err(err.in_operation(OPERATION)),
        }
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.query_users(&UserListParams::default()).await
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<User> {
        let params = UserListParams {
            id: Some(user_id.to_string()),
            ..UserListParams::default()
        };
        self.find_user(params, user_id).await
    }

    async fn get_user_by_name(&self, name: &str) -> Result<User> {
        let params = UserListParams {
            name: Some(name.to_string()),
            ..UserListParams::default()
        };
        self.find_user(params, name).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        let params = UserListParams {
            email: Some(email.to_string()),
            ..UserListParams::default()
        };
        self.find_user(params, email).await
    }

    async fn create_user(&self, name: &str) -> Result<User> {
        let request = CreateUserRequest { name };
        let response: UserResponse = self
            .fetch("CreateUser", Method::POST, &["user"], &[], Some(&request))
            .await?;
        Ok(response.user)
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.send_empty::<()>("DeleteUser", Method::DELETE, &["user", user_id], None)
            .await
    }

    async fn rename_user(&self, old_id: &str, new_name: &str) -> Result<User> {
        let response: UserResponse = self
            .fetch::<_, ()>(
                "RenameUser",
                Method::POST,
                &["user", old_id, "rename", new_name],
                &[],
                None,
            )
            .await?;
        Ok(response.user)
    }
}

fn is_spent_key(err: &Error) -> bool {
    err.api_message().is_some_and(|message| {
        SPENT_KEY_MESSAGES
            .iter()
            .any(|spent| message.contains(spent))
    })
}

fn deserialize_body<R>(operation: &str, bytes: &[u8]) -> Result<R>
where
    R: DeserializeOwned,
{
    serde_json::from_slice(bytes).map_err(|err| {
        Error::ParseError(format!("Failed to parse {operation} response: {err}"))
    })
}

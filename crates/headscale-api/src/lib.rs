//! Headscale API adapter.
//!
//! Provides typed models, payload validation, and an asynchronous client for
//! the Headscale REST API (`/api/v1`), shaped for use by infrastructure
//! providers that manage nodes, users, pre-auth keys, API keys, and subnet
//! routes.

#![deny(missing_docs)]

pub mod client;
pub mod models;
pub mod routes;
pub mod service;

pub use client::{HeadscaleClient, HeadscaleClientBuilder};
pub use models::{
    ApiKey, CreatePreAuthKeyRequest, Node, NodeListParams, PreAuthKey, PreAuthKeyOwner,
    RegisterMethod, User, UserListParams,
};
pub use routes::Route;
pub use service::HeadscaleApi;

/// Convenient result alias that reuses the shared Headscale error type.
pub type Result<T> = headscale_core::Result<T>;

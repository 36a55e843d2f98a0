//! # headscale-core
//!
//! Core types and utilities for talking to a Headscale control server.
//!
//! This crate provides the shared error taxonomy, configuration, and HTTP
//! client settings used by the Headscale API adapter.
//!
//! ## Modules
//!
//! - [`error`] - Error types and service error decoding
//! - [`config`] - Endpoint and credential configuration
//! - [`client`] - HTTP client settings
//! - [`query`] - Query parameter builder

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod query;

// Re-export commonly used types
pub use error::{Error, Result};

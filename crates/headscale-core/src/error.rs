//! Error types for Headscale operations.
//!
//! This module provides the closed error taxonomy returned by every Headscale
//! client operation, plus decoding of the gRPC-gateway status bodies Headscale
//! returns on failure.

use serde::Deserialize;
use thiserror::Error;

/// gRPC status code Headscale uses for missing entities.
pub const GRPC_NOT_FOUND: i32 = 5;

/// Main error type for Headscale operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Operation timed out
    #[error("Timeout waiting for Headscale: {0}")]
    Timeout(String),

    /// Headscale is unreachable or temporarily unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Headscale rejected the request
    #[error("Headscale API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code of the response
        status: u16,
        /// gRPC status code from the response body, if present
        code: Option<i32>,
        /// Error message reported by Headscale
        message: String,
    },

    /// A transport or service failure, tagged with the operation that hit it
    #[error("{operation} failed: {source}")]
    Operation {
        /// Name of the failing operation
        operation: &'static str,
        /// Underlying failure
        source: Box<Error>,
    },

    /// Failed to decode a Headscale response
    #[error("Failed to parse Headscale response: {0}")]
    ParseError(String),

    /// Response payload failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Specialized result type for Headscale operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Status body returned by the Headscale gRPC gateway on failure.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcStatus {
    /// gRPC status code
    #[serde(default)]
    pub code: Option<i32>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Opaque error details
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Api { .. } => "API_ERROR",
            Self::Operation { source, .. } => source.error_code(),
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
        }
    }

    /// Wraps a transport or service failure with the name of the operation
    /// that produced it.
    #[must_use]
    pub fn in_operation(self, operation: &'static str) -> Self {
        Self::Operation {
            operation,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, unwrapping operation context.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Operation { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the message Headscale reported, if this is a service error.
    #[must_use]
    pub fn api_message(&self) -> Option<&str> {
        match self.root_cause() {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Returns true if the error denotes a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self.root_cause() {
            Self::NotFound(_) => true,
            Self::Api { status, code, .. } => *status == 404 || *code == Some(GRPC_NOT_FOUND),
            _ => false,
        }
    }

    /// Builds an error from a non-success HTTP response.
    ///
    /// Headscale answers with a JSON status body; anything else keeps the raw
    /// text as the message.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body).trim().to_string();
        let (code, message) = match serde_json::from_slice::<RpcStatus>(body) {
            Ok(rpc) if !rpc.message.is_empty() => (rpc.code, rpc.message),
            Ok(rpc) => (rpc.code, text),
            Err(_) => (None, text),
        };

        match status {
            502..=504 => Self::ServiceUnavailable(format!(
                "Headscale temporarily unavailable (HTTP {status}): {message}"
            )),
            _ => Self::Api {
                status,
                code,
                message,
            },
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::ConfigError("test".to_string()).error_code(),
            "CONFIG_ERROR"
        );
        assert_eq!(
            Error::InvalidEndpoint("test".to_string()).error_code(),
            "INVALID_ENDPOINT"
        );
        assert_eq!(
            Error::HttpError("test".to_string()).error_code(),
            "HTTP_ERROR"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(
            Error::ServiceUnavailable("test".to_string()).error_code(),
            "SERVICE_UNAVAILABLE"
        );
        assert_eq!(
            Error::Api {
                status: 400,
                code: Some(3),
                message: "bad".to_string()
            }
            .error_code(),
            "API_ERROR"
        );
        assert_eq!(
            Error::ParseError("test".to_string()).error_code(),
            "PARSE_ERROR"
        );
        assert_eq!(
            Error::ValidationError("test".to_string()).error_code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            Error::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            Error::NotImplemented("test".to_string()).error_code(),
            "NOT_IMPLEMENTED"
        );
    }

    #[test]
    fn test_operation_reports_inner_code() {
        let err = Error::Timeout("slow".to_string()).in_operation("ListNodes");
        assert_eq!(err.error_code(), "TIMEOUT");
    }

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("user \"alice\"".to_string());
        assert_eq!(err.to_string(), "Not found: user \"alice\"");

        let err = Error::Api {
            status: 500,
            code: Some(2),
            message: "database locked".to_string(),
        }
        .in_operation("CreateUser");
        assert_eq!(
            err.to_string(),
            "CreateUser failed: Headscale API error (HTTP 500): database locked"
        );
    }

    #[test]
    fn test_operation_preserves_source() {
        let inner = Error::HttpError("connection reset".to_string());
        let err = inner.clone().in_operation("GetNode");

        let source = std::error::Error::source(&err).expect("source is kept");
        assert_eq!(source.to_string(), inner.to_string());
        assert_eq!(err.root_cause(), &inner);
    }

    #[test]
    fn test_api_message_through_context() {
        let err = Error::from_response(
            400,
            br#"{"code": 3, "message": "AuthKey expired", "details": []}"#,
        )
        .in_operation("ExpirePreAuthKey");
        assert_eq!(err.api_message(), Some("AuthKey expired"));

        let err = Error::HttpError("boom".to_string()).in_operation("ListNodes");
        assert!(err.api_message().is_none());
    }

    #[test]
    fn test_from_response_decodes_rpc_status() {
        let err = Error::from_response(
            404,
            br#"{"code": 5, "message": "record not found", "details": []}"#,
        );
        assert_eq!(
            err,
            Error::Api {
                status: 404,
                code: Some(5),
                message: "record not found".to_string()
            }
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_response_keeps_plain_text() {
        let err = Error::from_response(401, b"Unauthorized\n");
        assert_eq!(
            err,
            Error::Api {
                status: 401,
                code: None,
                message: "Unauthorized".to_string()
            }
        );
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_response_grpc_not_found_with_other_status() {
        let err = Error::from_response(500, br#"{"code": 5, "message": "node not found"}"#);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_from_response_gateway_errors() {
        let err = Error::from_response(503, b"upstream connect error");
        assert!(matches!(err, Error::ServiceUnavailable(_)));
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let headscale_err: Error = err.into();
        assert!(matches!(headscale_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let headscale_err: Error = err.into();
        assert!(matches!(headscale_err, Error::ParseError(_)));
    }

    #[test]
    fn test_error_clone() {
        let err = Error::NotFound("test".to_string()).in_operation("GetUser");
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}

//! Error types for eip-forge

use thiserror::Error;

/// Errors that can occur talking to the hosted version-control API
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Transport-level failure (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status returned by the API
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Resource does not exist (404)
    #[error("not found: {endpoint}")]
    NotFound { endpoint: String },

    /// Response body did not match the expected schema
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// File content could not be decoded
    #[error("could not decode {path}: {reason}")]
    Decode { path: String, reason: String },

    /// Required configuration is absent
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

impl From<reqwest::Error> for ForgeError {
    fn from(err: reqwest::Error) -> Self {
        ForgeError::Http(err.to_string())
    }
}

impl ForgeError {
    /// Whether this error means the requested resource is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ForgeError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_endpoint() {
        let err = ForgeError::Status {
            endpoint: "GET /repos/a/b".to_string(),
            status: 502,
            body: "bad gateway".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("GET /repos/a/b"));
        assert!(msg.contains("502"));
    }

    #[test]
    fn not_found_is_detectable() {
        let err = ForgeError::NotFound {
            endpoint: "GET /x".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!ForgeError::Http("boom".into()).is_not_found());
    }
}

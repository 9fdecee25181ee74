//! Storage collaborator errors

use thiserror::Error;

/// Failure talking to object storage or the system of record
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection, TLS or body streaming failure
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The service answered 2xx with a body we could not interpret
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// A configured or returned URL could not be used
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Missing required configuration
    #[error("Missing required configuration: {field}")]
    MissingConfiguration { field: String },

    /// The operation was refused without reaching a service
    #[error("Rejected: {reason}")]
    Rejected { reason: String },
}

impl StorageError {
    /// HTTP status when the failure came from the service itself
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_exposed() {
        let err = StorageError::Status {
            endpoint: "object/upload/sign".to_string(),
            status: 403,
            body: "denied".to_string(),
        };
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("403"));

        let err = StorageError::Rejected {
            reason: "offline".to_string(),
        };
        assert_eq!(err.status(), None);
    }
}

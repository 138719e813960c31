//! Authorization error types.

use std::fmt;

/// Errors raised by the relationship-service transport.
///
/// These never escape the authorizer's public operations; the bridge
/// absorbs them into its safe defaults after logging and recording
/// them.
#[derive(Debug)]
pub enum AuthzError {
    /// Failed to connect to the relationship service.
    ConnectionFailed {
        /// Error details.
        details: String,
    },
    /// A relationship-service request failed.
    RequestFailed {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { details } => {
                write!(f, "failed to connect to relationship service: {}", details)
            }
            Self::RequestFailed { details } => {
                write!(f, "relationship service request failed: {}", details)
            }
        }
    }
}

impl std::error::Error for AuthzError {}

//! Error types for pipesync-vault.

use pipesync_core::SecretName;
use thiserror::Error;

/// The only failure a secret lookup reports. Callers do not distinguish
/// causes; [`UnavailableReason`] is carried for diagnostics.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{name}' unavailable: {reason}")]
    SecretUnavailable {
        name: SecretName,
        #[source]
        reason: UnavailableReason,
    },
}

impl SecretError {
    pub fn unavailable(name: &SecretName, reason: UnavailableReason) -> Self {
        SecretError::SecretUnavailable {
            name: name.clone(),
            reason,
        }
    }

    pub fn name(&self) -> &SecretName {
        match self {
            SecretError::SecretUnavailable { name, .. } => name,
        }
    }
}

/// Why a token or secret could not be obtained.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Network-level failure (DNS, connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The identity was rejected or lacks permission on the vault.
    #[error("access denied (HTTP {status})")]
    AccessDenied { status: u16 },

    /// The vault has no secret under that name.
    #[error("secret not found")]
    NotFound,

    /// Any other non-success HTTP status.
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The identity endpoint did not hand out a token.
    #[error("identity token unavailable: {0}")]
    Identity(Box<UnavailableReason>),
}

impl From<ureq::Error> for UnavailableReason {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status @ (401 | 403), _) => UnavailableReason::AccessDenied { status },
            ureq::Error::Status(404, _) => UnavailableReason::NotFound,
            ureq::Error::Status(status, _) => UnavailableReason::Status { status },
            ureq::Error::Transport(transport) => UnavailableReason::Transport(transport.to_string()),
        }
    }
}

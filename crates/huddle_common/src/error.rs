use thiserror::Error;

/// Errors surfaced by the sync engine and the client facade.
///
/// `PartialWrite` is kept distinct from `RemoteCall` on purpose: it means an
/// earlier step of a multi-step mutation already committed, so the remote
/// state may be inconsistent in a way the user should be told about.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// A remote query, procedure, or mutation failed (network or denied).
    #[error("remote call failed: {message}")]
    RemoteCall { message: String },

    /// A referenced entity does not exist on the remote side.
    #[error("{what} not found")]
    NotFound { what: String },

    /// Malformed input rejected before anything was dispatched.
    #[error("invalid input: {message}")]
    Validation { message: String },

    /// A later step of a multi-step mutation failed after an earlier step
    /// committed. `committed` names what already exists remotely.
    #[error("{failed_step} failed after {committed} was committed: {message}")]
    PartialWrite {
        committed: String,
        failed_step: String,
        message: String,
    },

    /// The remote side returned a payload the decoder could not interpret.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },
}

impl SyncError {
    pub fn remote(message: impl Into<String>) -> Self {
        SyncError::RemoteCall { message: message.into() }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        SyncError::NotFound { what: what.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SyncError::Validation { message: message.into() }
    }

    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Decode { what: what.into(), message: message.into() }
    }

    /// Whether this error reports a committed-then-failed multi-step write.
    pub fn is_partial_write(&self) -> bool {
        matches!(self, SyncError::PartialWrite { .. })
    }
}

//! Error taxonomy for the resolution and navigation core.
//!
//! `SourceError` describes a single failed remote call. `ResolutionError` is
//! what callers of the resolver, the pagination engine and the explorer see.
//! `ConnectError` is specific to the connection manager.

use thiserror::Error;

/// Failure of one call against the primary chain API or the history index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Transport failure or timeout; no usable response arrived.
    #[error("transport: {0}")]
    Transport(String),
    /// The source answered that the entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Non-2xx answer that is neither "not found" nor a transport problem.
    #[error("http {status}: {message}")]
    Rejected { status: u16, message: String },
    /// The response body could not be decoded.
    #[error("decode: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),
    #[error("no source available: {0}")]
    SourceUnavailable(String),
    #[error("action not found: {0}")]
    ActionNotFound(String),
    #[error("remote error {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ResolutionError {
    /// HTTP status the lookup relay answers with for this failure.
    pub fn http_status(&self) -> u16 {
        match self {
            ResolutionError::MalformedIdentifier(_) | ResolutionError::SourceUnavailable(_) => 400,
            ResolutionError::NotFound(_) | ResolutionError::ActionNotFound(_) => 404,
            ResolutionError::Connection(_) => 502,
            ResolutionError::Remote { .. } | ResolutionError::Decode(_) => 500,
        }
    }

    pub fn not_connected() -> Self {
        ResolutionError::Connection("not connected to a chain".to_string())
    }
}

impl From<SourceError> for ResolutionError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Transport(msg) => ResolutionError::Connection(msg),
            SourceError::NotFound(msg) => ResolutionError::NotFound(msg),
            SourceError::Rejected { status, message } => ResolutionError::Remote { status, message },
            SourceError::Decode(msg) => ResolutionError::Decode(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("invalid endpoint '{0}': must start with http:// or https://")]
    InvalidEndpoint(String),
    #[error("unknown chain preset '{0}'")]
    UnknownPreset(String),
    /// A newer connect or a disconnect landed while this one was in flight.
    #[error("connection attempt superseded")]
    Superseded,
    #[error("failed to connect: {0}")]
    Source(#[from] SourceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_map_onto_taxonomy() {
        assert_eq!(
            ResolutionError::from(SourceError::Transport("timeout".into())),
            ResolutionError::Connection("timeout".into())
        );
        assert_eq!(
            ResolutionError::from(SourceError::NotFound("alice".into())),
            ResolutionError::NotFound("alice".into())
        );
        let remote = ResolutionError::from(SourceError::Rejected {
            status: 500,
            message: "boom".into(),
        });
        assert_eq!(remote.http_status(), 500);
    }

    #[test]
    fn relay_statuses() {
        assert_eq!(ResolutionError::MalformedIdentifier("x".into()).http_status(), 400);
        assert_eq!(ResolutionError::ActionNotFound("x".into()).http_status(), 404);
        assert_eq!(ResolutionError::not_connected().http_status(), 502);
    }
}

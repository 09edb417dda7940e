// ================================================================
// File: kousen-common/src/error.rs
// ================================================================

use thiserror::Error;

/// Errors returned by setup calls and by the transport collaborator.
///
/// Everything except `Platform`, `Io` and `Json` is a configuration error: it is
/// returned synchronously from the call that introduced it and never deferred
/// to dispatch time.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid description: {0}")]
    InvalidDescription(String),

    #[error("Naming conflict: {0}")]
    NameConflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Getter contract violation: {0}")]
    GetterContract(String),

    #[error("Module error: {0}")]
    Module(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for the error kinds that indicate a setup mistake rather than a
    /// transport or runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidName(_)
                | Error::InvalidDescription(_)
                | Error::NameConflict(_)
                | Error::Config(_)
                | Error::Module(_)
        )
    }
}

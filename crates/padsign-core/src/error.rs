use thiserror::Error;

/// Error taxonomy for the signing pipeline.
///
/// `Configuration` and `Discovery` are fatal and abort the run before any
/// file is processed. `DocumentRead` is recovered locally (the placement
/// falls back to a hardcoded rectangle). `Invocation` and `Rejected` are
/// per-file failures and never stop the batch.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Missing required configuration: {0}")]
    Configuration(String),

    #[error("Signer executable not found: {0}")]
    Discovery(String),

    #[error("Failed to read PDF document: {0}")]
    DocumentRead(String),

    #[error("Failed to invoke signer: {0}")]
    Invocation(String),

    #[error("Signing rejected by external signer (exit code {exit_code:?})")]
    Rejected {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignError {
    /// Whether this error must abort the whole run rather than a single file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SignError::Configuration(_) | SignError::Discovery(_))
    }
}

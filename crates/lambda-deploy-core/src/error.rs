//! Deployment error taxonomy.

use lambda_deploy_api::ApiError;

use crate::batch::Phase;

/// Process exit status for any fatal error.
pub const EXIT_FAILURE: u8 = 1;

/// Process exit status after a user interrupt.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Errors produced while deploying a function fleet.
///
/// `MissingField`, `NotFound`, `NotReady`, `NoVersions` and `Remote` are
/// per-item: the batch records them and moves on. `PhaseFailed`,
/// `Validation`, `Config` and `Interrupted` end the run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("configuration error in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("missing required configuration key '{field}' for function {function}")]
    MissingField {
        function: String,
        field: &'static str,
    },

    #[error("{resource} not found: {message}")]
    NotFound { resource: String, message: String },

    #[error("function {function} not ready after {attempts} status checks")]
    NotReady { function: String, attempts: u32 },

    #[error("no versions found for function {function}")]
    NoVersions { function: String },

    #[error("remote call failed for {function}: {message}")]
    Remote { function: String, message: String },

    #[error("all {phase} updates failed ({total} functions)")]
    PhaseFailed { phase: Phase, total: usize },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("deployment interrupted by user")]
    Interrupted,
}

impl DeployError {
    /// Classify a remote error raised while working on `function`.
    pub fn from_api(function: &str, err: ApiError) -> Self {
        match err {
            ApiError::NotFound { resource, message } => DeployError::NotFound { resource, message },
            ApiError::Remote { operation, message } => DeployError::Remote {
                function: function.to_string(),
                message: format!("{operation}: {message}"),
            },
        }
    }

    /// Exit status the process should report for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

/// Result type for deployment operations.
pub type DeployResult<T> = std::result::Result<T, DeployError>;

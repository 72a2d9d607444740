//! Error types for the VCF query library.

use thiserror::Error;

/// Errors that can occur while resolving fields or running the query tool.
#[derive(Error, Debug)]
pub enum VcfQueryError {
    /// The reference is not a standard, INFO or FORMAT field of the file.
    #[error("{0} not found; use listvars to see available variables")]
    UnknownField(String),

    /// The unprefixed reference is declared in both INFO and FORMAT.
    #[error("{0} is defined in FORMAT and INFO sets; prefix with INFO/ or FORMAT/")]
    AmbiguousField(String),

    /// An explicit namespace prefix does not match the declaring family.
    #[error("{reference} not found in {namespace} variables")]
    NamespaceMismatch {
        reference: String,
        namespace: &'static str,
    },

    /// The field cannot be used to partition a concordance comparison.
    #[error("{0} not allowed for variant comparisons")]
    DisallowedVariable(String),

    /// The external tool exited with a non-zero status.
    #[error("command `{command}` failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The external tool produced output of an unexpected shape.
    #[error("Unexpected tool output: {0}")]
    UnexpectedOutput(String),

    /// The operation was cancelled while a subprocess was running.
    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl VcfQueryError {
    /// Returns true for errors caused by the user's field reference, as
    /// opposed to tool or filesystem failures.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            VcfQueryError::UnknownField(_)
                | VcfQueryError::AmbiguousField(_)
                | VcfQueryError::NamespaceMismatch { .. }
                | VcfQueryError::DisallowedVariable(_)
        )
    }
}

/// Result type alias for VCF query operations.
pub type Result<T> = std::result::Result<T, VcfQueryError>;

//! # Errors
//!
//! Error type shared by every part of the extension.
//!
//! Most failures of the host debugger never show up here: a register that cannot be read is
//! reported as [`None`] by the accessor, not as an error. What remains are the conditions that
//! should interrupt the command of the user.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, ExtensionError>;

#[derive(Error, Debug)]
pub enum ExtensionError {
    #[error("Os error: {0}")]
    Os(#[from] nix::Error),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not (de)serialize: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not build a pattern: {0}")]
    Regex(#[from] regex::Error),
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),
    #[error("The host debugger could not evaluate the expression: {0}")]
    HostEvaluation(String),
    #[error("{0}: The program is not being run.")]
    NotRunning(String),
    #[error("{0}: Only works with \"x86-64\" arch.")]
    OnlyAmd64(String),
    #[error("Invalid value for {name}: `{value}`, you should provide something like: {expected}")]
    InvalidConfigurationValue {
        name: String,
        value: String,
        expected: &'static str,
    },
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("Incorrect address (or debugger expression): {0}")]
    InvalidAddressExpression(String),
    #[error("No session is active for this thread")]
    NoSession,
}

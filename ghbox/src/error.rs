use container_exec::InvokeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GhboxError {
    #[error("{flag} requires -r/--repo")]
    RepoRequired { flag: &'static str },

    #[error("invalid secret entry '{entry}': expected VAR=VAL")]
    InvalidSecretEntry { entry: String },

    #[error("no secret entries found in {source_label}")]
    NoSecretEntries { source_label: String },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("no data provided on standard input for {flag}")]
    NoStdinData { flag: &'static str },

    #[error("failed to read {what}")]
    Read {
        what: String,
        source: std::io::Error,
    },

    #[error("failed to prepare credential directory {}", path.display())]
    CredentialsDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

pub type Result<T, E = GhboxError> = std::result::Result<T, E>;

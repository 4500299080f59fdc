//! The parsed, immutable intent of one `ghbox` invocation.

use std::path::PathBuf;

/// Everything the flag parser learned from the command line.
///
/// Built once and passed by reference to every later stage. Several mode
/// flags may be set at the same time; [`crate::dispatch::Mode::select`]
/// decides which one applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationRequest {
    pub verbose: bool,
    pub dry_run: bool,
    pub file_path: Option<PathBuf>,
    pub stdin_script: bool,
    pub repo: Option<String>,
    pub env_file: Option<PathBuf>,
    pub env_stdin: bool,
    pub secret_entries: Vec<String>,
    pub positional_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSourceKind {
    None,
    File,
    Stdin,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSourceKind {
    None,
    EnvFile,
    EnvStdin,
    EnvVar,
}

impl InvocationRequest {
    pub fn script_source_kind(&self) -> ScriptSourceKind {
        if self.file_path.is_some() {
            ScriptSourceKind::File
        } else if self.stdin_script {
            ScriptSourceKind::Stdin
        } else if !self.positional_args.is_empty() {
            ScriptSourceKind::Inline
        } else {
            ScriptSourceKind::None
        }
    }

    pub fn secret_source_kind(&self) -> SecretSourceKind {
        if self.env_file.is_some() {
            SecretSourceKind::EnvFile
        } else if self.env_stdin {
            SecretSourceKind::EnvStdin
        } else if !self.secret_entries.is_empty() {
            SecretSourceKind::EnvVar
        } else {
            SecretSourceKind::None
        }
    }
}

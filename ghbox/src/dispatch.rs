//! Picks exactly one execution mode from an [`InvocationRequest`].
//!
//! The order is fixed: file, stdin script, env file, env stdin, env entries,
//! inline script, interactive. Flags for several modes may be combined; the
//! first one in that order wins and the rest are reported and ignored.

use std::fmt;
use std::path::PathBuf;
use tracing::warn;

use crate::error::{GhboxError, Result};
use crate::request::{InvocationRequest, ScriptSourceKind, SecretSourceKind};
use crate::secrets::SecretSource;

/// The flag-level reason a mode was requested, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    File,
    Stdin,
    EnvFile,
    EnvStdin,
    EnvVar,
    Inline,
    Interactive,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModeKind::File => "file (-f)",
            ModeKind::Stdin => "stdin script (--stdin)",
            ModeKind::EnvFile => "env file (--env-file)",
            ModeKind::EnvStdin => "env stdin (--env-stdin)",
            ModeKind::EnvVar => "env entries (-e/--env)",
            ModeKind::Inline => "inline script",
            ModeKind::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    FileScript { path: PathBuf, args: Vec<String> },
    StdinScript { args: Vec<String> },
    InlineScript { body: String, args: Vec<String> },
    Secrets { repo: String, source: SecretSource },
    Interactive,
}

impl Mode {
    pub fn select(request: &InvocationRequest) -> Result<Self> {
        let kind = selected_kind(request);
        let ignored: Vec<String> = requested_kinds(request)
            .into_iter()
            .filter(|requested| *requested != kind)
            .map(|requested| requested.to_string())
            .collect();
        if !ignored.is_empty() {
            warn!(
                "several modes requested; using {} and ignoring {}",
                kind,
                ignored.join(", ")
            );
        }

        let args = request.positional_args.clone();

        let mode = match kind {
            ModeKind::File => Mode::FileScript {
                path: request.file_path.clone().unwrap_or_default(),
                args,
            },
            ModeKind::Stdin => Mode::StdinScript { args },
            ModeKind::EnvFile => {
                let source = SecretSource::EnvFile(request.env_file.clone().unwrap_or_default());
                Mode::secrets(request, source)?
            }
            ModeKind::EnvStdin => Mode::secrets(request, SecretSource::Stdin)?,
            ModeKind::EnvVar => {
                let source = SecretSource::Entries(request.secret_entries.clone());
                Mode::secrets(request, source)?
            }
            ModeKind::Inline => {
                let mut args = args.into_iter();
                let body = args.next().unwrap_or_default();
                Mode::InlineScript {
                    body,
                    args: args.collect(),
                }
            }
            ModeKind::Interactive => Mode::Interactive,
        };

        Ok(mode)
    }

    fn secrets(request: &InvocationRequest, source: SecretSource) -> Result<Self> {
        let repo = request
            .repo
            .clone()
            .ok_or(GhboxError::RepoRequired {
                flag: source.flag(),
            })?;
        Ok(Mode::Secrets { repo, source })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::FileScript { .. } => "file-script",
            Mode::StdinScript { .. } => "stdin-script",
            Mode::InlineScript { .. } => "inline-script",
            Mode::Secrets { .. } => "secret-injection",
            Mode::Interactive => "interactive",
        }
    }
}

/// Every mode the request asks for, highest priority first.
pub fn requested_kinds(request: &InvocationRequest) -> Vec<ModeKind> {
    let mut kinds = Vec::new();
    if request.file_path.is_some() {
        kinds.push(ModeKind::File);
    }
    if request.stdin_script {
        kinds.push(ModeKind::Stdin);
    }
    if request.env_file.is_some() {
        kinds.push(ModeKind::EnvFile);
    }
    if request.env_stdin {
        kinds.push(ModeKind::EnvStdin);
    }
    if !request.secret_entries.is_empty() {
        kinds.push(ModeKind::EnvVar);
    }
    if !request.positional_args.is_empty() {
        kinds.push(ModeKind::Inline);
    }
    kinds
}

fn selected_kind(request: &InvocationRequest) -> ModeKind {
    match (request.script_source_kind(), request.secret_source_kind()) {
        (ScriptSourceKind::File, _) => ModeKind::File,
        (ScriptSourceKind::Stdin, _) => ModeKind::Stdin,
        (_, SecretSourceKind::EnvFile) => ModeKind::EnvFile,
        (_, SecretSourceKind::EnvStdin) => ModeKind::EnvStdin,
        (_, SecretSourceKind::EnvVar) => ModeKind::EnvVar,
        (ScriptSourceKind::Inline, SecretSourceKind::None) => ModeKind::Inline,
        (ScriptSourceKind::None, SecretSourceKind::None) => ModeKind::Interactive,
    }
}

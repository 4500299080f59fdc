//! The five ways of running the container, and the verbose / dry-run
//! description each of them prints.

use container_exec::{ContainerInvocationSpec, ContainerRuntime, Mount, Payload};
use owo_colors::OwoColorize;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::config::GhboxConfig;
use crate::dispatch::Mode;
use crate::error::{GhboxError, Result};
use crate::request::InvocationRequest;
use crate::secrets::{SecretPayload, SecretSource};
use crate::source::{ScriptPayload, StdinSource, SHEBANG};

/// Where `gh` looks for its configuration inside the image.
pub const CREDENTIALS_TARGET: &str = "/root/.config/gh";
pub const SCRIPT_TARGET: &str = "/ghbox/script.sh";
pub const SECRETS_TARGET: &str = "/ghbox/secrets.env";
pub const INTERPRETER: &str = "bash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Executor {
    Interactive,
    FileScript {
        path: PathBuf,
        script: ScriptPayload,
    },
    StdinScript(ScriptPayload),
    InlineScript(ScriptPayload),
    SecretInjection {
        repo: String,
        source: SecretSource,
        secrets: SecretPayload,
    },
}

impl Executor {
    /// Materialize the script or secret content the mode needs.
    pub fn resolve(mode: Mode, stdin: &mut dyn StdinSource) -> Result<Self> {
        let executor = match mode {
            Mode::Interactive => Executor::Interactive,
            Mode::FileScript { path, args } => {
                let script = ScriptPayload::from_file(&path, args)?;
                Executor::FileScript { path, script }
            }
            Mode::StdinScript { args } => {
                Executor::StdinScript(ScriptPayload::from_stdin(stdin, args)?)
            }
            Mode::InlineScript { body, args } => {
                Executor::InlineScript(ScriptPayload::inline(&body, args))
            }
            Mode::Secrets { repo, source } => {
                let secrets = source.resolve(stdin)?;
                Executor::SecretInjection {
                    repo,
                    source,
                    secrets,
                }
            }
        };
        debug!(executor = executor.name(), "resolved executor");
        Ok(executor)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Executor::Interactive => "interactive",
            Executor::FileScript { .. } => "file-script",
            Executor::StdinScript(_) => "stdin-script",
            Executor::InlineScript(_) => "inline-script",
            Executor::SecretInjection { .. } => "secret-injection",
        }
    }

    pub fn invocation(&self, config: &GhboxConfig) -> ContainerInvocationSpec {
        let base = ContainerInvocationSpec::new(&config.image, INTERPRETER)
            .with_mount(Mount::read_write(&config.credentials_dir, CREDENTIALS_TARGET));

        match self {
            Executor::Interactive => base.interactive(),
            Executor::FileScript { path, script } => base
                .with_mount(Mount::read_only(path, SCRIPT_TARGET))
                .with_command([SCRIPT_TARGET])
                .with_args(script.args.clone()),
            Executor::StdinScript(script) | Executor::InlineScript(script) => base
                .with_payload(Payload::new(SCRIPT_TARGET, script.bytes.clone()))
                .with_command([SCRIPT_TARGET])
                .with_args(script.args.clone()),
            // The repo travels as $1 so neither it nor the secrets end up in shell text.
            Executor::SecretInjection { repo, secrets, .. } => base
                .with_payload(Payload::new(SCRIPT_TARGET, secret_script()))
                .with_payload(Payload::new(SECRETS_TARGET, secrets.content()))
                .with_command([SCRIPT_TARGET])
                .with_args(vec![repo.clone()]),
        }
    }

    pub fn describe(&self, runtime_command: &str) -> Description {
        let description = Description::default().field("mode", self.name());

        let description = match self {
            Executor::Interactive => {
                description.field("shell", "interactive bash with a pseudo-terminal")
            }
            Executor::FileScript { path, script } => description
                .field("file", path.display().to_string())
                .field("script", script.text().into_owned())
                .field("args", format!("{:?}", script.args)),
            Executor::StdinScript(script) | Executor::InlineScript(script) => description
                .field("script", script.text().into_owned())
                .field("args", format!("{:?}", script.args)),
            Executor::SecretInjection {
                repo,
                source,
                secrets,
            } => description
                .field("repo", repo.clone())
                .field("secrets", source.label())
                .field("variables", secrets.variable_names().join(", ")),
        };

        description.field("runtime", runtime_command)
    }
}

fn secret_script() -> String {
    format!(
        "{}\nset -euo pipefail\ngh secret set --env-file {} --repo \"$1\"\n",
        SHEBANG, SECRETS_TARGET
    )
}

/// Labelled lines printed for `--verbose` and `--dry-run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    fields: Vec<(&'static str, String)>,
}

impl Description {
    pub fn field(mut self, label: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((label, value.into()));
        self
    }

    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        for (label, value) in &self.fields {
            let label = format!("{}:", label);
            let label = if color {
                label.cyan().to_string()
            } else {
                label
            };

            if value.contains('\n') {
                out.push_str(&label);
                out.push('\n');
                for line in value.lines() {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            } else {
                out.push_str(&format!("{} {}\n", label, value));
            }
        }
        out
    }
}

fn should_use_color(stream: atty::Stream) -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    atty::is(stream)
}

/// Describe if asked, then run the container unless this is a dry run.
pub fn execute(
    executor: &Executor,
    request: &InvocationRequest,
    config: &GhboxConfig,
    runtime: &dyn ContainerRuntime,
) -> Result<i32> {
    let spec = executor.invocation(config);

    if request.verbose || request.dry_run {
        let description = executor.describe(&runtime.preview(&spec));
        if request.dry_run {
            print!("{}", description.render(should_use_color(atty::Stream::Stdout)));
            println!("dry run: container not started");
            return Ok(0);
        }
        eprint!("{}", description.render(should_use_color(atty::Stream::Stderr)));
    }

    fs::create_dir_all(&config.credentials_dir).map_err(|source| {
        GhboxError::CredentialsDir {
            path: config.credentials_dir.clone(),
            source,
        }
    })?;

    Ok(runtime.run(&spec)?)
}

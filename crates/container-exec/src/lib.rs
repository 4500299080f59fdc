//! Invocation of a container runtime (`docker run` or a CLI-compatible
//! replacement) for a single foreground container.
//!
//! Content that must reach the container, such as a script body or a `.env`
//! file, is carried as a [`Payload`]. Payloads are written to a private
//! temporary directory and bind-mounted read-only, so their bytes never pass
//! through a shell command line.

use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

/// A host path made visible at `target` inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
    pub readonly: bool,
}

impl Mount {
    pub fn read_write(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            readonly: false,
        }
    }

    pub fn read_only(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            readonly: true,
        }
    }
}

/// Bytes staged into a private host file and mounted read-only at `target`.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    pub target: String,
    pub contents: Vec<u8>,
}

impl Payload {
    pub fn new(target: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            target: target.into(),
            contents: contents.into(),
        }
    }
}

// Payloads may hold secrets; never print their bytes.
impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("target", &self.target)
            .field("len", &self.contents.len())
            .finish()
    }
}

/// Everything the runtime needs to start one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInvocationSpec {
    pub image: String,
    pub mounts: Vec<Mount>,
    pub payloads: Vec<Payload>,
    pub entrypoint: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub interactive: bool,
}

impl ContainerInvocationSpec {
    pub fn new(image: impl Into<String>, entrypoint: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            mounts: Vec::new(),
            payloads: Vec::new(),
            entrypoint: entrypoint.into(),
            command: Vec::new(),
            args: Vec::new(),
            interactive: false,
        }
    }

    pub fn with_mount(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payloads.push(payload);
        self
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn validate(&self) -> Result<(), InvokeError> {
        if self.image.trim().is_empty() {
            return Err(InvokeError::InvalidSpec {
                message: "container image cannot be empty".to_string(),
            });
        }

        if self.entrypoint.trim().is_empty() {
            return Err(InvokeError::InvalidSpec {
                message: "entrypoint cannot be empty".to_string(),
            });
        }

        let mut targets = BTreeSet::new();
        let all_targets = self
            .mounts
            .iter()
            .map(|mount| mount.target.as_str())
            .chain(self.payloads.iter().map(|payload| payload.target.as_str()));

        for target in all_targets {
            if !target.starts_with('/') {
                return Err(InvokeError::InvalidSpec {
                    message: format!("mount target '{}' must be absolute", target),
                });
            }
            if !targets.insert(target) {
                return Err(InvokeError::InvalidSpec {
                    message: format!("mount target '{}' is used more than once", target),
                });
            }
        }

        Ok(())
    }
}

/// Something able to run a [`ContainerInvocationSpec`] to completion.
pub trait ContainerRuntime {
    /// Start the container in the foreground and return its exit status.
    fn run(&self, spec: &ContainerInvocationSpec) -> Result<i32, InvokeError>;

    /// Human readable command line for `spec`, without touching the filesystem.
    fn preview(&self, spec: &ContainerInvocationSpec) -> String;
}

/// Runtime driven through a docker-compatible CLI binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerRuntime {
    binary: String,
}

impl DockerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl ContainerRuntime for DockerRuntime {
    fn run(&self, spec: &ContainerInvocationSpec) -> Result<i32, InvokeError> {
        spec.validate()?;

        // Keep the staged files alive until the container has exited.
        let staged = StagedPayloads::stage(&spec.payloads)?;

        let mut command = Command::new(&self.binary);
        configure_command(&mut command, spec, staged.sources())?;
        debug!("runtime command: {}", command_line_string(&command));

        info!(runtime = %self.binary, image = %spec.image, "starting container");
        let status = command.status().map_err(|source| InvokeError::RuntimeSpawn {
            runtime: self.binary.clone(),
            source,
        })?;

        let code = exit_code(&status);
        debug!(code, "container exited");
        Ok(code)
    }

    fn preview(&self, spec: &ContainerInvocationSpec) -> String {
        let payload_sources: Vec<PathBuf> = spec
            .payloads
            .iter()
            .map(|_| PathBuf::from("<staged>"))
            .collect();
        let mount_sources: Vec<PathBuf> = spec.mounts.iter().map(|m| m.source.clone()).collect();

        let mut line = self.binary.clone();
        for arg in runtime_args(spec, &mount_sources, &payload_sources) {
            line.push(' ');
            line.push_str(&display_arg(&arg));
        }
        line
    }
}

fn configure_command(
    command: &mut Command,
    spec: &ContainerInvocationSpec,
    payload_sources: &[PathBuf],
) -> Result<(), InvokeError> {
    let mut mount_sources = Vec::with_capacity(spec.mounts.len());
    for mount in &spec.mounts {
        let source = fs::canonicalize(&mount.source).map_err(|err| InvokeError::MountSource {
            path: mount.source.clone(),
            source: err,
        })?;
        mount_sources.push(source);
    }

    command.args(runtime_args(spec, &mount_sources, payload_sources));

    command.stdin(Stdio::inherit());
    command.stdout(Stdio::inherit());
    command.stderr(Stdio::inherit());

    Ok(())
}

fn runtime_args(
    spec: &ContainerInvocationSpec,
    mount_sources: &[PathBuf],
    payload_sources: &[PathBuf],
) -> Vec<String> {
    let mut args = vec!["run".to_string(), "--rm".to_string()];

    if spec.interactive {
        args.push("-i".to_string());
        args.push("-t".to_string());
    }

    for (mount, source) in spec.mounts.iter().zip(mount_sources) {
        args.push("--mount".to_string());
        args.push(bind_mount_arg(source, &mount.target, mount.readonly));
    }

    for (payload, source) in spec.payloads.iter().zip(payload_sources) {
        args.push("--mount".to_string());
        args.push(bind_mount_arg(source, &payload.target, true));
    }

    args.push("--entrypoint".to_string());
    args.push(spec.entrypoint.clone());
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args.extend(spec.args.iter().cloned());
    args
}

/// `--mount` values are parsed as CSV by the runtime.
fn bind_mount_arg(source: &Path, target: &str, readonly: bool) -> String {
    let mut arg = format!(
        "type=bind,{},{}",
        csv_field(&format!("source={}", source.display())),
        csv_field(&format!("target={}", target))
    );
    if readonly {
        arg.push_str(",readonly");
    }
    arg
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

struct StagedPayloads {
    _dir: Option<TempDir>,
    sources: Vec<PathBuf>,
}

impl StagedPayloads {
    fn stage(payloads: &[Payload]) -> Result<Self, InvokeError> {
        if payloads.is_empty() {
            return Ok(Self {
                _dir: None,
                sources: Vec::new(),
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("ghbox-")
            .tempdir()
            .map_err(|err| InvokeError::Io {
                message: format!("Failed to create payload directory: {}", err),
            })?;

        let mut sources = Vec::with_capacity(payloads.len());
        for (index, payload) in payloads.iter().enumerate() {
            let name = Path::new(&payload.target)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "payload".to_string());
            let path = dir.path().join(format!("{}-{}", index, name));
            write_private(&path, &payload.contents)?;
            debug!(mount = %payload.target, bytes = payload.contents.len(), "staged payload");
            sources.push(path);
        }

        Ok(Self {
            _dir: Some(dir),
            sources,
        })
    }

    fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

fn write_private(path: &Path, contents: &[u8]) -> Result<(), InvokeError> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).map_err(|err| InvokeError::Io {
        message: format!("Failed to create payload file {}: {}", path.display(), err),
    })?;
    file.write_all(contents).map_err(|err| InvokeError::Io {
        message: format!("Failed to write payload file {}: {}", path.display(), err),
    })?;
    file.sync_all().map_err(|err| InvokeError::Io {
        message: format!("Failed to flush payload file {}: {}", path.display(), err),
    })
}

fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn shell_escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let escaped = arg.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

fn display_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(' ') || arg.contains('"') || arg.contains('\'') {
        shell_escape(arg)
    } else {
        arg.to_string()
    }
}

fn command_line_string(cmd: &Command) -> String {
    let mut s = String::new();
    s.push_str(&cmd.get_program().to_string_lossy());
    for a in cmd.get_args() {
        s.push(' ');
        s.push_str(&display_arg(&a.to_string_lossy()));
    }
    s
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("Invalid container invocation: {message}")]
    InvalidSpec { message: String },
    #[error("Mount source {} is not accessible", path.display())]
    MountSource {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to stage payload: {message}")]
    Io { message: String },
    #[error("Failed to spawn container runtime '{runtime}'")]
    RuntimeSpawn {
        runtime: String,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> ContainerInvocationSpec {
        ContainerInvocationSpec::new("gh-cli:latest", "bash")
            .with_mount(Mount::read_write("/home/me/gh-config", "/root/.config/gh"))
            .with_payload(Payload::new("/ghbox/script.sh", "#!/usr/bin/env bash\necho\n"))
            .with_command(["/ghbox/script.sh"])
            .with_args(vec!["hi".to_string(), "there".to_string()])
    }

    fn args_of(spec: &ContainerInvocationSpec) -> Vec<String> {
        let mounts: Vec<PathBuf> = spec.mounts.iter().map(|m| m.source.clone()).collect();
        let payloads: Vec<PathBuf> = spec
            .payloads
            .iter()
            .map(|_| PathBuf::from("/tmp/staged/0-script.sh"))
            .collect();
        runtime_args(spec, &mounts, &payloads)
    }

    #[test]
    fn runtime_args_place_entrypoint_before_image_and_command_after() {
        let args = args_of(&sample_spec());

        let idx_entry = args
            .iter()
            .position(|a| a == "--entrypoint")
            .expect("--entrypoint not present");
        assert_eq!(args.get(idx_entry + 1).map(String::as_str), Some("bash"));

        let idx_image = args
            .iter()
            .position(|a| a == "gh-cli:latest")
            .expect("image not present");
        assert!(idx_image > idx_entry, "image must come after --entrypoint");
        assert_eq!(
            &args[idx_image + 1..],
            &["/ghbox/script.sh", "hi", "there"]
        );
        assert!(!args.contains(&"-t".to_string()));
    }

    #[test]
    fn runtime_args_mount_credentials_and_payloads() {
        let args = args_of(&sample_spec());

        assert!(args
            .iter()
            .any(|a| a == "type=bind,source=/home/me/gh-config,target=/root/.config/gh"));
        assert!(args.iter().any(
            |a| a == "type=bind,source=/tmp/staged/0-script.sh,target=/ghbox/script.sh,readonly"
        ));
    }

    #[test]
    fn interactive_spec_requests_a_tty() {
        let spec = ContainerInvocationSpec::new("gh-cli:latest", "bash")
            .with_mount(Mount::read_write("/cfg", "/root/.config/gh"))
            .interactive();
        let args = args_of(&spec);

        assert_eq!(&args[..4], &["run", "--rm", "-i", "-t"]);
        assert_eq!(args.last().map(String::as_str), Some("gh-cli:latest"));
    }

    #[test]
    fn bind_mount_arg_quotes_fields_with_commas() {
        let arg = bind_mount_arg(Path::new("/tmp/a,b"), "/ghbox/script.sh", true);
        assert_eq!(
            arg,
            "type=bind,\"source=/tmp/a,b\",target=/ghbox/script.sh,readonly"
        );
    }

    #[test]
    fn validate_rejects_relative_and_duplicate_targets() {
        let relative = ContainerInvocationSpec::new("img", "bash")
            .with_payload(Payload::new("script.sh", "echo"));
        assert!(matches!(
            relative.validate(),
            Err(InvokeError::InvalidSpec { .. })
        ));

        let duplicate = ContainerInvocationSpec::new("img", "bash")
            .with_mount(Mount::read_only("/a", "/ghbox/script.sh"))
            .with_payload(Payload::new("/ghbox/script.sh", "echo"));
        let err = duplicate.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let no_image = ContainerInvocationSpec::new(" ", "bash");
        assert!(no_image.validate().is_err());
    }

    #[test]
    fn payload_debug_hides_contents() {
        let payload = Payload::new("/ghbox/secrets.env", "TOKEN=hunter2\n");
        let rendered = format!("{:?}", payload);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("len: 14"));
    }

    #[test]
    fn preview_shows_staged_placeholder_and_quotes_spaces() {
        let spec = sample_spec().with_args(vec!["two words".to_string()]);
        let line = DockerRuntime::default().preview(&spec);

        assert!(line.starts_with("docker run --rm "));
        assert!(line.contains("source=<staged>,target=/ghbox/script.sh,readonly"));
        assert!(line.ends_with("/ghbox/script.sh 'two words'"));
    }

    #[test]
    fn staged_payloads_are_private_and_removed_on_drop() {
        let payloads = vec![
            Payload::new("/ghbox/script.sh", "echo hi\n"),
            Payload::new("/ghbox/secrets.env", "KEY=VAL\n"),
        ];
        let staged = StagedPayloads::stage(&payloads).unwrap();
        let sources = staged.sources().to_vec();

        assert_eq!(sources.len(), 2);
        assert_eq!(fs::read_to_string(&sources[0]).unwrap(), "echo hi\n");
        assert_eq!(fs::read_to_string(&sources[1]).unwrap(), "KEY=VAL\n");
        assert!(sources[1].ends_with("1-secrets.env"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&sources[1]).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        drop(staged);
        assert!(!sources[0].exists());
    }

    #[test]
    fn missing_runtime_binary_is_a_spawn_error() {
        let spec = ContainerInvocationSpec::new("img", "bash");
        let runtime = DockerRuntime::new("/nonexistent/ghbox-runtime");

        let err = runtime.run(&spec).unwrap_err();
        assert!(matches!(err, InvokeError::RuntimeSpawn { .. }));
        assert_eq!(
            err.to_string(),
            "Failed to spawn container runtime '/nonexistent/ghbox-runtime'"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn missing_mount_source_is_reported_before_spawning() {
        let spec = ContainerInvocationSpec::new("img", "bash")
            .with_mount(Mount::read_write("/nonexistent/gh-config", "/root/.config/gh"));
        let runtime = DockerRuntime::new("/nonexistent/ghbox-runtime");

        let err = runtime.run(&spec).unwrap_err();
        assert!(matches!(err, InvokeError::MountSource { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn exit_status_of_runtime_is_propagated() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("fake-runtime");
        fs::write(&fake, "#!/bin/sh\nexit 7\n").unwrap();
        fs::set_permissions(&fake, fs::Permissions::from_mode(0o755)).unwrap();

        let spec = ContainerInvocationSpec::new("img", "bash")
            .with_mount(Mount::read_write(dir.path(), "/root/.config/gh"))
            .with_payload(Payload::new("/ghbox/script.sh", "exit 0\n"));

        let code = DockerRuntime::new(fake.to_string_lossy().to_string())
            .run(&spec)
            .unwrap();
        assert_eq!(code, 7);
    }
}

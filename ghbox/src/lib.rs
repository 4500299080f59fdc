pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executors;
pub mod request;
pub mod secrets;
pub mod source;

use container_exec::ContainerRuntime;
use tracing::info;

pub use config::GhboxConfig;
pub use error::{GhboxError, Result};
pub use request::InvocationRequest;

use dispatch::Mode;
use executors::Executor;
use source::StdinSource;

/// Select the mode, resolve its inputs and run (or describe) the container.
///
/// Returns the exit status the process should end with.
pub fn run(
    request: &InvocationRequest,
    config: &GhboxConfig,
    stdin: &mut dyn StdinSource,
    runtime: &dyn ContainerRuntime,
) -> Result<i32> {
    let mode = Mode::select(request)?;
    info!(mode = mode.name(), image = %config.image, "selected execution mode");

    let executor = Executor::resolve(mode, stdin)?;
    executors::execute(&executor, request, config, runtime)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::{SCRIPT_TARGET, SECRETS_TARGET};
    use crate::source::BufferedStdin;
    use crate::testing::RecordingRuntime;
    use std::fs;
    use std::path::PathBuf;

    struct Harness {
        dir: tempfile::TempDir,
        config: GhboxConfig,
        runtime: RecordingRuntime,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let config = GhboxConfig {
                runtime: "docker".to_string(),
                image: "gh-cli:latest".to_string(),
                credentials_dir: dir.path().join("gh-config"),
            };
            Self {
                dir,
                config,
                runtime: RecordingRuntime::default(),
            }
        }

        fn run(&self, request: &InvocationRequest, stdin: &str) -> Result<i32> {
            run(
                request,
                &self.config,
                &mut BufferedStdin::new(stdin),
                &self.runtime,
            )
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn payload_text(spec: &container_exec::ContainerInvocationSpec, target: &str) -> String {
        let payload = spec
            .payloads
            .iter()
            .find(|p| p.target == target)
            .expect("payload present");
        String::from_utf8(payload.contents.clone()).unwrap()
    }

    #[test]
    fn env_stdin_sets_secrets_on_the_repo() {
        let harness = Harness::new();
        let request = InvocationRequest {
            env_stdin: true,
            repo: Some("myrepo".to_string()),
            ..Default::default()
        };

        assert_eq!(harness.run(&request, "KEY=VAL\n").unwrap(), 0);

        let runs = harness.runtime.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(payload_text(&runs[0], SECRETS_TARGET), "KEY=VAL\n");
        assert_eq!(runs[0].args, vec!["myrepo"]);
    }

    #[test]
    fn env_entries_without_repo_fail_before_running() {
        let harness = Harness::new();
        let request = InvocationRequest {
            secret_entries: strings(&["A=1"]),
            ..Default::default()
        };

        let err = harness.run(&request, "").unwrap_err();
        assert!(err.to_string().contains("-r/--repo"));
        assert!(harness.runtime.runs().is_empty());
    }

    #[test]
    fn inline_script_runs_with_remaining_arguments() {
        let harness = Harness::new();
        let request = InvocationRequest {
            positional_args: strings(&["echo", "hi"]),
            ..Default::default()
        };

        harness.run(&request, "").unwrap();

        let runs = harness.runtime.runs();
        assert_eq!(
            payload_text(&runs[0], SCRIPT_TARGET),
            "#!/usr/bin/env bash\necho\n"
        );
        assert_eq!(runs[0].args, vec!["hi"]);
    }

    #[test]
    fn file_script_takes_priority_over_inline_arguments() {
        let harness = Harness::new();
        let script = harness.dir.path().join("script.sh");
        fs::write(&script, "echo from-file\n").unwrap();
        let request = InvocationRequest {
            file_path: Some(script.clone()),
            positional_args: strings(&["arg1", "arg2"]),
            ..Default::default()
        };

        harness.run(&request, "").unwrap();

        let runs = harness.runtime.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].mounts[1].source, script);
        assert!(runs[0].mounts[1].readonly);
        assert_eq!(runs[0].args, vec!["arg1", "arg2"]);
    }

    #[test]
    fn dry_run_never_invokes_the_runtime() {
        let harness = Harness::new();
        let script = harness.dir.path().join("script.sh");
        fs::write(&script, "true\n").unwrap();

        let requests = vec![
            InvocationRequest::default(),
            InvocationRequest {
                file_path: Some(script),
                ..Default::default()
            },
            InvocationRequest {
                stdin_script: true,
                ..Default::default()
            },
            InvocationRequest {
                env_stdin: true,
                repo: Some("octo/repo".to_string()),
                ..Default::default()
            },
            InvocationRequest {
                positional_args: strings(&["gh", "--version"]),
                ..Default::default()
            },
        ];

        for request in requests {
            let request = InvocationRequest {
                dry_run: true,
                ..request
            };
            assert_eq!(harness.run(&request, "A=1\n").unwrap(), 0);
        }

        assert!(harness.runtime.runs().is_empty());
        assert!(!harness.config.credentials_dir.exists());
    }

    #[test]
    fn missing_script_file_is_reported() {
        let harness = Harness::new();
        let request = InvocationRequest {
            file_path: Some(PathBuf::from("/nonexistent/script.sh")),
            ..Default::default()
        };

        let err = harness.run(&request, "").unwrap_err();
        assert!(matches!(err, GhboxError::FileNotFound { .. }));
        assert!(harness.runtime.runs().is_empty());
    }

    #[test]
    fn child_exit_status_is_returned() {
        let mut harness = Harness::new();
        harness.runtime = RecordingRuntime::exiting_with(42);

        let code = harness.run(&InvocationRequest::default(), "").unwrap();
        assert_eq!(code, 42);
    }
}

use clap::builder::NonEmptyStringValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::request::InvocationRequest;

const AFTER_HELP: &str = "\
Modes (the first one requested wins):
  -f PATH            run a script file from the host
  --stdin            run a script read from standard input
  --env-file PATH    set repository secrets from a .env file (needs -r)
  --env-stdin        set repository secrets from standard input (needs -r)
  -e VAR=VAL         set repository secrets from arguments (needs -r)
  SCRIPT [ARGS...]   run SCRIPT as a bash command line, ARGS become $1..
  (nothing)          open an interactive bash shell with gh available

Examples:
  ghbox
  ghbox -- gh pr list --repo owner/repo
  ghbox -f ./release.sh v1.2.3
  echo 'gh auth status' | ghbox --stdin
  ghbox -r owner/repo -e API_TOKEN=abc123 -e REGION=eu
  ghbox -r owner/repo --env-file .env.production";

/// Run the GitHub CLI inside a container
#[derive(Parser, Debug)]
#[command(
    name = "ghbox",
    after_help = AFTER_HELP,
    args_override_self = true
)]
pub struct Cli {
    /// Describe the execution before running it
    #[arg(short, long)]
    pub verbose: bool,

    /// Describe the execution and exit without starting a container
    #[arg(short, long)]
    pub dry_run: bool,

    /// Run a script file from the host
    #[arg(short = 'f', value_name = "PATH", value_parser = NonEmptyStringValueParser::new())]
    pub file: Option<String>,

    /// Run a script read from standard input
    #[arg(long)]
    pub stdin: bool,

    /// Repository the secrets are set on
    #[arg(short, long, value_name = "OWNER/REPO", value_parser = NonEmptyStringValueParser::new())]
    pub repo: Option<String>,

    /// Read secrets from a .env file
    #[arg(long, value_name = "PATH", value_parser = NonEmptyStringValueParser::new())]
    pub env_file: Option<String>,

    /// Read secrets from standard input
    #[arg(long)]
    pub env_stdin: bool,

    /// Secret to set, repeatable
    #[arg(
        short,
        long = "env",
        value_name = "VAR=VAL",
        action = ArgAction::Append,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub env: Vec<String>,

    /// Inline script followed by its arguments
    #[arg(value_name = "SCRIPT_ARGS")]
    pub args: Vec<String>,
}

impl Cli {
    pub fn into_request(self) -> InvocationRequest {
        InvocationRequest {
            verbose: self.verbose,
            dry_run: self.dry_run,
            file_path: self.file.map(PathBuf::from),
            stdin_script: self.stdin,
            repo: self.repo,
            env_file: self.env_file.map(PathBuf::from),
            env_stdin: self.env_stdin,
            secret_entries: self.env,
            positional_args: self.args,
        }
    }
}

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use container_exec::DockerRuntime;
use tracing_subscriber::{fmt, EnvFilter};

use ghbox::cli::Cli;
use ghbox::source::ProcessStdin;
use ghbox::GhboxConfig;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

fn run() -> Result<i32> {
    let cli = parse_cli();
    init_tracing(cli.verbose);

    let request = cli.into_request();
    let config = GhboxConfig::from_env()?;
    let runtime = DockerRuntime::new(config.runtime.clone());

    let code = ghbox::run(&request, &config, &mut ProcessStdin, &runtime)?;
    Ok(code)
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(1);
        }
    }
}

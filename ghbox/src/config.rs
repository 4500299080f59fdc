use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const RUNTIME_VAR: &str = "GHBOX_CONTAINER_RUNTIME";
pub const IMAGE_VAR: &str = "GHBOX_IMAGE";

pub const DEFAULT_RUNTIME: &str = "docker";
pub const DEFAULT_IMAGE: &str = "gh-cli:latest";

/// Directory, next to the executable, holding the `gh` credentials.
pub const CREDENTIALS_DIR_NAME: &str = "gh-config";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhboxConfig {
    pub runtime: String,
    pub image: String,
    pub credentials_dir: PathBuf,
}

impl GhboxConfig {
    /// Resolve the configuration for the running executable.
    pub fn from_env() -> Result<Self> {
        let exe = env::current_exe().context("Failed to locate the ghbox executable")?;
        let exe = fs::canonicalize(&exe).unwrap_or(exe);
        let install_dir = exe
            .parent()
            .with_context(|| format!("Executable path {} has no parent", exe.display()))?;
        Ok(Self::with_install_dir(install_dir))
    }

    pub fn with_install_dir(install_dir: &Path) -> Self {
        Self {
            runtime: env_or(RUNTIME_VAR, DEFAULT_RUNTIME),
            image: env_or(IMAGE_VAR, DEFAULT_IMAGE),
            credentials_dir: install_dir.join(CREDENTIALS_DIR_NAME),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

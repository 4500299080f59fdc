//! Secret definitions in `.env` form, sourced from a file, standard input or
//! `-e VAR=VAL` arguments.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{GhboxError, Result};
use crate::source::StdinSource;

static ENTRY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^[^=]+=[^=]+$").expect("secret entry pattern is valid"));

/// Where the secret definitions come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    EnvFile(PathBuf),
    Stdin,
    Entries(Vec<String>),
}

impl SecretSource {
    /// The flag that selected this source.
    pub fn flag(&self) -> &'static str {
        match self {
            SecretSource::EnvFile(_) => "--env-file",
            SecretSource::Stdin => "--env-stdin",
            SecretSource::Entries(_) => "-e/--env",
        }
    }

    pub fn label(&self) -> String {
        match self {
            SecretSource::EnvFile(path) => format!("file {}", path.display()),
            SecretSource::Stdin => "standard input".to_string(),
            SecretSource::Entries(entries) => format!("arguments ({} entries)", entries.len()),
        }
    }

    pub fn resolve(&self, stdin: &mut dyn StdinSource) -> Result<SecretPayload> {
        match self {
            SecretSource::EnvFile(path) => {
                if !path.is_file() {
                    return Err(GhboxError::FileNotFound { path: path.clone() });
                }
                let text = fs::read(path).map_err(|source| GhboxError::Read {
                    what: path.display().to_string(),
                    source,
                })?;
                debug!(path = %path.display(), "read secrets file");
                SecretPayload::from_dotenv(&text, &self.label())
            }
            SecretSource::Stdin => {
                if stdin.is_terminal() {
                    return Err(GhboxError::NoStdinData { flag: self.flag() });
                }
                let text = stdin.read_all().map_err(|source| GhboxError::Read {
                    what: "standard input".to_string(),
                    source,
                })?;
                if is_blank(&text) {
                    return Err(GhboxError::NoStdinData { flag: self.flag() });
                }
                debug!(bytes = text.len(), "read secrets from standard input");
                SecretPayload::from_dotenv(&text, &self.label())
            }
            SecretSource::Entries(entries) => SecretPayload::from_entries(entries),
        }
    }
}

/// `.env` content: one `VAR=VAL` line per secret, newline-terminated.
///
/// Values are opaque bytes; only the variable names are ever decoded.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPayload {
    content: Vec<u8>,
}

impl SecretPayload {
    /// Validates every token and joins them in input order.
    pub fn from_entries(entries: &[String]) -> Result<Self> {
        if entries.is_empty() {
            return Err(GhboxError::NoSecretEntries {
                source_label: "arguments".to_string(),
            });
        }
        for entry in entries {
            validate_entry(entry.as_bytes())?;
        }
        Ok(Self {
            content: format!("{}\n", entries.join("\n")).into_bytes(),
        })
    }

    /// Parses `.env` text. Blank lines and `#` comments are dropped.
    pub fn from_dotenv(text: &[u8], source_label: &str) -> Result<Self> {
        let mut content = Vec::with_capacity(text.len() + 1);
        for line in text.split(|byte| *byte == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            match line.iter().copied().find(|byte| !byte.is_ascii_whitespace()) {
                None | Some(b'#') => continue,
                Some(_) => {}
            }
            validate_entry(line)?;
            content.extend_from_slice(line);
            content.push(b'\n');
        }

        if content.is_empty() {
            return Err(GhboxError::NoSecretEntries {
                source_label: source_label.to_string(),
            });
        }

        Ok(Self { content })
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.content
            .split(|byte| *byte == b'\n')
            .filter_map(|line| {
                let eq = line.iter().position(|byte| *byte == b'=')?;
                Some(String::from_utf8_lossy(&line[..eq]).trim().to_string())
            })
            .collect()
    }
}

impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPayload")
            .field("variables", &self.variable_names())
            .finish()
    }
}

pub fn validate_entry(entry: &[u8]) -> Result<()> {
    // One entry is exactly one line of the resulting .env file.
    if entry.contains(&b'\n') || entry.contains(&b'\r') || !ENTRY_PATTERN.is_match(entry) {
        return Err(GhboxError::InvalidSecretEntry {
            entry: String::from_utf8_lossy(entry).into_owned(),
        });
    }
    Ok(())
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

//! Script bodies: read from a host file, from standard input, or taken from
//! the first positional argument.

use std::borrow::Cow;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

use crate::error::{GhboxError, Result};

pub const SHEBANG: &str = "#!/usr/bin/env bash";

/// Access to the process' standard input.
pub trait StdinSource {
    fn is_terminal(&self) -> bool;
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
}

pub struct ProcessStdin;

impl StdinSource for ProcessStdin {
    fn is_terminal(&self) -> bool {
        atty::is(atty::Stream::Stdin)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

/// Fixed standard input, used where reading the real stream is undesirable.
#[derive(Debug, Clone, Default)]
pub struct BufferedStdin {
    contents: Vec<u8>,
    terminal: bool,
}

impl BufferedStdin {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
            terminal: false,
        }
    }

    pub fn terminal() -> Self {
        Self {
            contents: Vec::new(),
            terminal: true,
        }
    }
}

impl StdinSource for BufferedStdin {
    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.contents))
    }
}

/// A resolved script and the arguments forwarded to it.
///
/// The body is kept as raw bytes; only [`ScriptPayload::text`] decodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPayload {
    pub bytes: Vec<u8>,
    pub args: Vec<String>,
}

impl ScriptPayload {
    pub fn from_file(path: &Path, args: Vec<String>) -> Result<Self> {
        if !path.is_file() {
            return Err(GhboxError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let bytes = fs::read(path).map_err(|source| GhboxError::Read {
            what: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "read script file");

        Ok(Self { bytes, args })
    }

    pub fn from_stdin(stdin: &mut dyn StdinSource, args: Vec<String>) -> Result<Self> {
        let body = stdin.read_all().map_err(|source| GhboxError::Read {
            what: "standard input".to_string(),
            source,
        })?;
        debug!(bytes = body.len(), "read script from standard input");

        Ok(Self {
            bytes: wrap_script(&body),
            args,
        })
    }

    pub fn inline(body: &str, args: Vec<String>) -> Self {
        Self {
            bytes: wrap_script(body.as_bytes()),
            args,
        }
    }

    /// The script as text, for descriptions.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

pub fn wrap_script(body: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(SHEBANG.len() + body.len() + 2);
    script.extend_from_slice(SHEBANG.as_bytes());
    script.push(b'\n');
    script.extend_from_slice(body);
    script.push(b'\n');
    script
}

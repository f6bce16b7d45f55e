//! User script fragments and their preparation.

use crate::Result;
use std::path::{Path, PathBuf};

/// Marker opening a region that is removed before execution.
pub const IGNORE_START: &str = "IGNORE START";
/// Marker closing a removed region.
pub const IGNORE_END: &str = "IGNORE END";

/// A piece of user script, given inline or as a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Script text.
    Text(String),
    /// Path of a script file, read when the session is built.
    File(PathBuf),
}

impl ScriptSource {
    /// Classify `input`: an existing file is a file source, anything else is
    /// script text. Blank input yields `None`.
    pub fn guess(input: &str) -> Option<Self> {
        if input.trim().is_empty() {
            return None;
        }
        let path = Path::new(input);
        if path.is_file() {
            Some(ScriptSource::File(path.to_path_buf()))
        } else {
            Some(ScriptSource::Text(input.to_string()))
        }
    }

    /// Whether this is inline text without any content.
    pub fn is_blank(&self) -> bool {
        matches!(self, ScriptSource::Text(text) if text.trim().is_empty())
    }

    pub(crate) fn load(&self, strip_ignored: bool) -> Result<ScriptFragment> {
        let (origin, text) = match self {
            ScriptSource::Text(text) => ("// Directly given script".to_string(), text.clone()),
            ScriptSource::File(path) => {
                let text = std::fs::read_to_string(path)?;
                (format!("// File {}", path.display()), text)
            }
        };
        let text = if strip_ignored {
            strip_ignore_blocks(&text)
        } else {
            text
        };
        Ok(ScriptFragment { origin, text })
    }
}

impl From<&str> for ScriptSource {
    fn from(text: &str) -> Self {
        ScriptSource::Text(text.to_string())
    }
}

impl From<String> for ScriptSource {
    fn from(text: String) -> Self {
        ScriptSource::Text(text)
    }
}

impl From<PathBuf> for ScriptSource {
    fn from(path: PathBuf) -> Self {
        ScriptSource::File(path)
    }
}

impl From<&Path> for ScriptSource {
    fn from(path: &Path) -> Self {
        ScriptSource::File(path.to_path_buf())
    }
}

/// A loaded fragment ready for concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScriptFragment {
    pub origin: String,
    pub text: String,
}

/// Remove every region from a line containing [`IGNORE_START`] up to and
/// including the next line containing [`IGNORE_END`]. A region that is never
/// closed runs to the end of the text.
pub fn strip_ignore_blocks(text: &str) -> String {
    let mut kept = Vec::new();
    let mut ignoring = false;
    for line in text.lines() {
        if ignoring {
            if line.contains(IGNORE_END) {
                ignoring = false;
            }
        } else if line.contains(IGNORE_START) {
            ignoring = true;
        } else {
            kept.push(line);
        }
    }
    kept.join("\n")
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the script written in debug mode when no path is configured.
pub const DEFAULT_DEBUG_FILE_NAME: &str = "tmp-dmsync.s";

/// Options controlling one synchronization.
///
/// Can be read from a TOML file; every key is optional:
///
/// ```toml
/// debug = true
/// debug_file = "out/generated.s"
/// require_all = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Write the combined script to the debug file instead of executing it.
    #[serde(default)]
    pub debug: bool,
    /// Target of debug mode, defaults to [`default_debug_file`].
    #[serde(default)]
    pub debug_file: Option<PathBuf>,
    /// Submit the script asynchronously and hand out a wait handle.
    #[serde(default)]
    pub non_blocking: bool,
    /// Treat any variable missing after execution as a failure.
    #[serde(default)]
    pub require_all: bool,
    /// Read exposed values back after execution.
    #[serde(default = "default_true")]
    pub read_back_exposed: bool,
    /// Remove `IGNORE START` / `IGNORE END` regions from script fragments
    /// unless a fragment was added with an explicit choice.
    #[serde(default = "default_true")]
    pub strip_ignore_blocks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debug: false,
            debug_file: None,
            non_blocking: false,
            require_all: false,
            read_back_exposed: true,
            strip_ignore_blocks: true,
        }
    }
}

impl SyncOptions {
    /// Parse options from TOML bytes.
    pub fn from_toml(data: &[u8]) -> crate::Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| crate::Error::Config(format!("Invalid UTF-8: {}", e)))?;
        toml::from_str(text).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Read options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_toml(&data)
    }

    /// Enable debug mode, writing to `path`.
    pub fn with_debug_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug = true;
        self.debug_file = Some(path.into());
        self
    }

    /// Enable or disable asynchronous execution.
    pub fn with_non_blocking(mut self, non_blocking: bool) -> Self {
        self.non_blocking = non_blocking;
        self
    }

    /// Require every requested variable to be written back.
    pub fn with_require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    /// Path the debug script is written to.
    pub fn debug_path(&self) -> PathBuf {
        self.debug_file.clone().unwrap_or_else(default_debug_file)
    }
}

/// `tmp-dmsync.s` in the system temporary directory.
pub fn default_debug_file() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_DEBUG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn empty_file_gives_defaults() {
        let options = SyncOptions::from_toml(b"").unwrap();
        assert_eq!(options, SyncOptions::default());
        assert!(options.read_back_exposed);
        assert!(options.strip_ignore_blocks);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let options = SyncOptions::from_toml(
            br#"
debug = true
debug_file = "generated.s"
read_back_exposed = false
"#,
        )
        .unwrap();
        assert!(options.debug);
        assert_eq!(options.debug_path(), PathBuf::from("generated.s"));
        assert!(!options.read_back_exposed);
        assert!(options.strip_ignore_blocks);
        assert!(!options.non_blocking);
    }

    #[test]
    fn invalid_files_are_config_errors() {
        assert!(matches!(
            SyncOptions::from_toml(b"debug = \"yes\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SyncOptions::from_toml(&[0xff, 0xfe]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dmsync.toml");
        std::fs::write(&path, "require_all = true\n").unwrap();

        let options = SyncOptions::load(&path).unwrap();
        assert!(options.require_all);
        assert!(matches!(
            SyncOptions::load(dir.path().join("missing.toml")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn default_debug_file_lives_in_temp_dir() {
        let path = SyncOptions::default().debug_path();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with(DEFAULT_DEBUG_FILE_NAME));
    }
}

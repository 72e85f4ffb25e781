//! File-backed recorder settings.
//!
//! The recording name and cassettes directory live in two plain-text files
//! under `<root>/meta/`, so a running server picks up changes made from
//! another process (for example the `test-recorder` CLI) on its next
//! request. Reads and writes are not coordinated: do not change the
//! settings from several processes at once.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::middleware::MIDDLEWARE_NAME;
use crate::Result;

/// Environment variable overriding the settings root
pub const HOME_ENV: &str = "TEST_RECORDER_HOME";

/// Settings root used when `HOME_ENV` is unset
pub const DEFAULT_HOME: &str = ".test_recorder";

/// Recording name used when none has been set
pub const DEFAULT_RECORDING_NAME: &str = "test";

const META_DIR: &str = "meta";
const CASSETTES_DIR: &str = "cassettes";
const RECORDING_NAME_FILE: &str = "recording_name";
const CASSETTES_PATH_FILE: &str = "cassettes_path";

/// Recorder settings rooted at a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    root: PathBuf,
}

impl Settings {
    /// Settings stored under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Settings rooted at `$TEST_RECORDER_HOME`, or `./.test_recorder`
    #[must_use]
    pub fn from_env() -> Self {
        let root = std::env::var_os(HOME_ENV).map_or_else(|| PathBuf::from(DEFAULT_HOME), PathBuf::from);
        Self::new(root)
    }

    /// Settings root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the recording name
    #[must_use]
    pub fn recording_name_file(&self) -> PathBuf {
        self.root.join(META_DIR).join(RECORDING_NAME_FILE)
    }

    /// File holding the cassettes directory
    #[must_use]
    pub fn cassettes_path_file(&self) -> PathBuf {
        self.root.join(META_DIR).join(CASSETTES_PATH_FILE)
    }

    /// Default cassettes directory, `<root>/cassettes`
    #[must_use]
    pub fn default_cassettes_path(&self) -> PathBuf {
        self.root.join(CASSETTES_DIR)
    }

    /// Current recording name, `"test"` if never set
    ///
    /// # Errors
    ///
    /// Returns error if the settings file exists but cannot be read
    pub fn recording_name(&self) -> Result<String> {
        Ok(read_setting(&self.recording_name_file())?
            .unwrap_or_else(|| DEFAULT_RECORDING_NAME.to_string()))
    }

    /// Set the recording name
    ///
    /// # Errors
    ///
    /// Returns error if the settings file cannot be written
    pub fn set_recording_name(&self, value: &str) -> Result<()> {
        write_setting(&self.recording_name_file(), value)
    }

    /// Current cassettes directory, `<root>/cassettes` if never set
    ///
    /// # Errors
    ///
    /// Returns error if the settings file exists but cannot be read
    pub fn cassettes_path(&self) -> Result<PathBuf> {
        Ok(read_setting(&self.cassettes_path_file())?
            .map_or_else(|| self.default_cassettes_path(), PathBuf::from))
    }

    /// Set the cassettes directory
    ///
    /// # Errors
    ///
    /// Returns error if the settings file cannot be written
    pub fn set_cassettes_path(&self, value: impl AsRef<Path>) -> Result<()> {
        write_setting(
            &self.cassettes_path_file(),
            &value.as_ref().to_string_lossy(),
        )
    }
}

/// Contents of a settings file, without a trailing line break
fn read_setting(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }

    let value = fs::read_to_string(path)?;
    Ok(Some(value.trim_end_matches(['\r', '\n']).to_string()))
}

fn write_setting(path: &Path, value: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, value)?;
    debug!("Wrote setting {}", path.display());
    Ok(())
}

/// Whether the recording middleware is part of a framework's active
/// middleware list
#[must_use]
pub fn middleware_enabled<S: AsRef<str>>(active_middleware: &[S]) -> bool {
    active_middleware
        .iter()
        .any(|name| name.as_ref() == MIDDLEWARE_NAME)
}

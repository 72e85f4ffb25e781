//! Configuration types for the test recorder

use serde::{Deserialize, Serialize};

use crate::cassette::{MatchField, DEFAULT_MATCH_ON};
use crate::{RecorderError, Result};

/// Recorder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Headers never written to a cassette (secrets)
    #[serde(default)]
    pub filter_headers: Vec<String>,
    /// Store outgoing response bodies decompressed
    #[serde(default = "default_true")]
    pub decode_compressed_response: bool,
    /// Request components compared when replaying outgoing calls
    #[serde(default = "default_match_on")]
    pub match_on: Vec<MatchField>,
}

fn default_true() -> bool {
    true
}

fn default_match_on() -> Vec<MatchField> {
    DEFAULT_MATCH_ON.to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            filter_headers: Vec::new(),
            decode_compressed_response: true,
            match_on: default_match_on(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RecorderError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| RecorderError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.match_on.is_empty() {
            return Err(RecorderError::ConfigError(
                "match_on must name at least one request component".to_string(),
            ));
        }

        for (i, name) in self.filter_headers.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(RecorderError::ConfigError(format!(
                    "filter_headers[{i}]: header name cannot be empty"
                )));
            }
        }

        Ok(())
    }
}

/// Configuration loading from JSON files
use crate::config::types::{JudgeError, Result, SecurityConfig};
use std::path::Path;

impl SecurityConfig {
    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            JudgeError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: SecurityConfig = serde_json::from_str(&content).map_err(|e| {
            JudgeError::Config(format!(
                "Failed to parse config JSON {}: {}",
                path.display(),
                e
            ))
        })?;

        log::debug!("Loaded judge configuration from {}", path.display());
        Ok(config)
    }

    /// Load `judge.json` from the current directory, falling back to defaults.
    pub fn load_default() -> Self {
        let candidate = match std::env::current_dir() {
            Ok(dir) => dir.join("judge.json"),
            Err(_) => return Self::default(),
        };

        if !candidate.exists() {
            return Self::default();
        }

        match Self::load_from_file(&candidate) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring {}: {}", candidate.display(), e);
                Self::default()
            }
        }
    }

    /// Apply command-line overrides on top of a loaded configuration.
    pub fn with_overrides(mut self, time_secs: Option<f64>, memory_mb: Option<u64>) -> Self {
        if let Some(time) = time_secs {
            self.max_execution_time = time;
        }
        if let Some(mem) = memory_mb {
            self.max_memory_mb = mem;
        }
        self
    }
}

//! Configuration file handling

use std::path::{Path, PathBuf};

use ddlcheck_core::{Analyzer, DetectorError, DetectorGroup, DetectorId, Diagnostic};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::args::OutputFormat;

pub const CONFIG_FILE_NAME: &str = "ddlcheck.toml";

/// Configuration for ddlcheck
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Script paths or glob patterns to review
    #[serde(default)]
    pub files: Vec<String>,

    /// Detectors to run (default: all)
    #[serde(default)]
    pub detectors: Vec<String>,

    /// Detector groups to run, added to `detectors`
    #[serde(default)]
    pub groups: Vec<String>,

    /// Detector ids or diagnostic codes to skip (e.g., ["reserved_words", "K005"])
    #[serde(default)]
    pub disable: Vec<String>,

    /// Output format (human, text, json, sarif)
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .into_diagnostic()
            .wrap_err_with(|| format!("Invalid configuration in {}", path.display()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to find and load ddlcheck.toml in current directory or parent directories
    pub fn find_and_load() -> Result<Option<Self>> {
        let current_dir = std::env::current_dir().into_diagnostic()?;
        match find_config(&current_dir) {
            Some(path) => Ok(Some(Self::from_file(&path)?)),
            None => Ok(None),
        }
    }

    /// Merge CLI arguments into configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_with_args(
        mut self,
        files: &[PathBuf],
        detectors: &[String],
        groups: &[String],
        disable: &[String],
        format: Option<OutputFormat>,
    ) -> Self {
        if !files.is_empty() {
            self.files = files.iter().map(|p| p.display().to_string()).collect();
        }

        // A selection on the command line replaces the configured one
        if !detectors.is_empty() || !groups.is_empty() {
            self.detectors = detectors.to_vec();
            self.groups = groups.to_vec();
        }

        if !disable.is_empty() {
            self.disable.extend(disable.iter().cloned());
        }

        if format.is_some() {
            self.format = format;
        }

        self
    }

    /// Build the analyzer for the configured selection, minus disabled detectors
    pub fn analyzer(&self) -> Result<Analyzer, DetectorError> {
        let mut selected = Vec::new();
        for id in &self.detectors {
            selected.push(id.parse::<DetectorId>()?);
        }
        for group in &self.groups {
            selected.extend(group.parse::<DetectorGroup>()?.detectors());
        }
        if selected.is_empty() {
            selected = DetectorId::ALL.to_vec();
        }

        let disabled: Vec<DetectorId> = self
            .disable
            .iter()
            .filter_map(|entry| entry.parse::<DetectorId>().ok())
            .collect();
        Ok(Analyzer::with_detectors(
            selected.into_iter().filter(|id| !disabled.contains(id)),
        ))
    }

    /// Whether a finding's code was disabled
    pub fn is_disabled(&self, diagnostic: &Diagnostic) -> bool {
        self.disable
            .iter()
            .any(|entry| entry.eq_ignore_ascii_case(diagnostic.code()))
    }
}

/// Walk up from `start` looking for ddlcheck.toml
fn find_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        // Try parent directory
        if !current.pop() {
            return None;
        }
    }
}

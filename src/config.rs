use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schedule::DEFAULT_INTERVALS;
use crate::store::write_atomic;

/// Tool configuration, loaded from a JSON file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the revision store.
    pub base_dir: PathBuf,

    /// Directory containing the tracked plain-text documents.
    pub notes_dir: PathBuf,

    #[serde(default = "default_extensions")]
    pub recognized_extensions: Vec<String>,

    /// Regular expressions; file names matching any of them are never
    /// offered as new documents.
    #[serde(default)]
    pub ignored_patterns: Vec<String>,

    /// Minimum seconds a source file's mtime must be ahead of the last
    /// capture before it is re-diffed. Guards against filesystem timestamp
    /// coarseness.
    #[serde(default = "default_guard_seconds")]
    pub guard_seconds: i64,

    #[serde(default)]
    pub scheduling: ScheduleParams,

    #[serde(default)]
    pub scheduling_overrides: Vec<ScheduleOverride>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleParams {
    pub intervals: Vec<i64>,
    #[serde(default)]
    pub jitter: Vec<i64>,
}

impl Default for ScheduleParams {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_INTERVALS.to_vec(),
            jitter: vec![0; DEFAULT_INTERVALS.len()],
        }
    }
}

/// Schedule parameters applied to document keys matching `pattern` instead
/// of the defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub pattern: String,
    #[serde(flatten)]
    pub scheduling: ScheduleParams,
}

impl Config {
    pub fn new(base_dir: PathBuf, notes_dir: PathBuf) -> Self {
        Self {
            version: 1,
            base_dir,
            notes_dir,
            recognized_extensions: default_extensions(),
            ignored_patterns: Vec::new(),
            guard_seconds: default_guard_seconds(),
            scheduling: ScheduleParams::default(),
            scheduling_overrides: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .map_err(|err| Error::io(format!("read config {}", path.display()), err))?;
        let config: Config = serde_json::from_slice(&bytes).map_err(|err| {
            Error::Configuration(format!("parse config {}: {err}", path.display()))
        })?;
        if config.version != 1 {
            return Err(Error::Configuration(format!(
                "unsupported config version {}",
                config.version
            )));
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|err| Error::Configuration(format!("serialize config: {err}")))?;
        write_atomic(path, &bytes)
            .map_err(|err| Error::io(format!("write config {}", path.display()), err))
    }

    pub fn compiled_patterns(&self) -> Result<Vec<Regex>> {
        self.ignored_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| {
                    Error::Configuration(format!("bad ignored pattern {pattern:?}: {err}"))
                })
            })
            .collect()
    }
}

fn default_version() -> u32 {
    1
}

fn default_extensions() -> Vec<String> {
    vec![".txt".to_string()]
}

fn default_guard_seconds() -> i64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let parsed: Config =
            serde_json::from_str(r#"{ "base_dir": "/tmp/s", "notes_dir": "/tmp/n" }"#).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.recognized_extensions, vec![".txt".to_string()]);
        assert_eq!(parsed.guard_seconds, 2);
        assert_eq!(parsed.scheduling.intervals, DEFAULT_INTERVALS.to_vec());
        assert!(parsed.scheduling_overrides.is_empty());
    }

    #[test]
    fn bad_pattern_is_a_configuration_error() {
        let mut config = Config::new(PathBuf::from("/tmp/s"), PathBuf::from("/tmp/n"));
        config.ignored_patterns.push("(".to_string());
        assert!(matches!(
            config.compiled_patterns(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("revisit.json");
        let config = Config::new(tmp.path().join("store"), tmp.path().join("notes"));
        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.base_dir, config.base_dir);
        assert_eq!(loaded.notes_dir, config.notes_dir);
        assert_eq!(loaded.scheduling.intervals, config.scheduling.intervals);
    }
}

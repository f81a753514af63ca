//! Run configuration
//!
//! A [`RunConfig`] names the trace, the reader that parses it, which capture
//! side to keep, the action filter, the candidate type containers and where
//! the two generated units go. It is read from YAML or JSON, chosen by file
//! extension, and command-line flags are layered on top before validation.

use crate::error::ReplayError;
use serde::{Deserialize, Serialize};
use soapreplay_codegen::ScenarioOptions;
use soapreplay_trace::{ActionFilter, ReaderRegistry, DEFAULT_READER};
use std::path::{Path, PathBuf};

/// Where and how the generated units are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Output directory
    pub dir: PathBuf,
    /// Primary unit file name, `{class}.{ext}` when absent
    pub primary_file: Option<String>,
    /// Stub unit file name, `{class}.Stubs.{ext}` when absent
    pub stub_file: Option<String>,
    /// Shape of the generated scenario
    pub scenario: ScenarioOptions,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            primary_file: None,
            stub_file: None,
            scenario: ScenarioOptions::default(),
        }
    }
}

impl OutputOptions {
    /// Path of the primary unit for files with extension `ext`
    #[must_use]
    pub fn primary_path(&self, ext: &str) -> PathBuf {
        let name = self
            .primary_file
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.scenario.class_name, ext));
        self.dir.join(name)
    }

    /// Path of the stub unit for files with extension `ext`
    #[must_use]
    pub fn stub_path(&self, ext: &str) -> PathBuf {
        let name = self
            .stub_file
            .clone()
            .unwrap_or_else(|| format!("{}.Stubs.{}", self.scenario.class_name, ext));
        self.dir.join(name)
    }
}

/// Configuration of one generation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Trace file to read
    pub trace: Option<PathBuf>,
    /// Registered reader name
    pub parser: String,
    /// Keep client-side captures
    pub client_side: bool,
    /// Keep service-side captures
    pub service_side: bool,
    /// Include/exclude action list
    pub filter: ActionFilter,
    /// Candidate type container manifests, searched in order
    pub containers: Vec<PathBuf>,
    /// Output location and shape
    pub output: OutputOptions,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trace: None,
            parser: DEFAULT_READER.to_string(),
            client_side: true,
            service_side: false,
            filter: ActionFilter::pass_all(),
            containers: Vec::new(),
            output: OutputOptions::default(),
        }
    }
}

impl RunConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trace file
    #[must_use]
    pub fn with_trace(mut self, trace: impl Into<PathBuf>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    /// Append candidate container
    #[must_use]
    pub fn with_container(mut self, path: impl Into<PathBuf>) -> Self {
        self.containers.push(path.into());
        self
    }

    /// Set action filter
    #[must_use]
    pub fn with_filter(mut self, filter: ActionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.dir = dir.into();
        self
    }

    /// Load from a YAML (`.yaml`/`.yml`) or JSON file
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let text = std::fs::read_to_string(path).map_err(|e| ReplayError::io(path, e))?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
        let config: Self = if is_yaml {
            serde_yaml::from_str(&text)
                .map_err(|e| ReplayError::config(format!("{}: {e}", path.display())))?
        } else {
            serde_json::from_str(&text)
                .map_err(|e| ReplayError::config(format!("{}: {e}", path.display())))?
        };
        tracing::debug!(path = %path.display(), "loaded run configuration");
        Ok(config)
    }

    /// Check the configuration against the available readers
    pub fn validate(&self, readers: &ReaderRegistry) -> Result<(), ReplayError> {
        if !self.client_side && !self.service_side {
            return Err(ReplayError::config(
                "at least one of client_side and service_side must be set",
            ));
        }
        if self.trace.is_none() {
            return Err(ReplayError::config("no trace file given"));
        }
        if self.containers.is_empty() {
            return Err(ReplayError::config("no type containers given"));
        }
        if !readers.contains(&self.parser) {
            return Err(ReplayError::UnknownReader {
                name: self.parser.clone(),
                available: readers.names().join(", "),
            });
        }
        if self.output.scenario.class_name.is_empty() {
            return Err(ReplayError::config("output class name is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soapreplay_trace::FilterMode;
    use std::io::Write;

    fn valid() -> RunConfig {
        RunConfig::new()
            .with_trace("calls.svclog")
            .with_container("calc.json")
    }

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(config.parser, "message-log");
        assert!(config.client_side);
        assert!(!config.service_side);
        assert_eq!(config.filter, ActionFilter::pass_all());
        assert_eq!(config.output.dir, PathBuf::from("."));
    }

    #[test]
    fn validation() {
        let readers = ReaderRegistry::with_defaults();
        assert!(valid().validate(&readers).is_ok());

        let mut config = valid();
        config.client_side = false;
        assert!(config.validate(&readers).unwrap_err().is_config());

        let mut config = valid();
        config.trace = None;
        assert!(config.validate(&readers).is_err());

        let mut config = valid();
        config.containers.clear();
        assert!(config.validate(&readers).is_err());

        let mut config = valid();
        config.parser = "pcap".to_string();
        let err = config.validate(&readers).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownReader { .. }));
        assert!(err.to_string().contains("http-capture"));
    }

    #[test]
    fn output_paths() {
        let mut output = OutputOptions {
            dir: PathBuf::from("out"),
            ..OutputOptions::default()
        };
        assert_eq!(output.primary_path("cs"), PathBuf::from("out/ReplayScenario.cs"));
        assert_eq!(output.stub_path("cs"), PathBuf::from("out/ReplayScenario.Stubs.cs"));
        output.stub_file = Some("Harness.cs".to_string());
        assert_eq!(output.stub_path("cs"), PathBuf::from("out/Harness.cs"));
    }

    #[test]
    fn loads_yaml_with_partial_fields() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "trace: calls.svclog\nservice_side: true\nfilter:\n  mode: exclude\n  actions: ['urn:a']\ncontainers: [calc.yaml]\noutput:\n  scenario:\n    timers: false\n"
        )
        .unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.trace, Some(PathBuf::from("calls.svclog")));
        assert!(config.client_side);
        assert!(config.service_side);
        assert_eq!(config.filter.mode, FilterMode::Exclude);
        assert_eq!(config.filter.actions, vec!["urn:a".to_string()]);
        assert!(!config.output.scenario.timers);
        assert_eq!(config.output.scenario.class_name, "ReplayScenario");
    }

    #[test]
    fn loads_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"trace":"t.log","parser":"http-capture","containers":["a.json"]}}"#).unwrap();
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.parser, "http-capture");
        assert!(config.validate(&ReaderRegistry::with_defaults()).is_ok());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(RunConfig::load(file.path()).unwrap_err().is_config());
    }
}

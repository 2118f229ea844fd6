//! Configuration parsing and validation
//!
//! Two layers live here:
//!
//! - [`ConfigValue`] / [`ConfigMap`]: the untyped key/value parameters every
//!   plugin receives. Typed accessors apply a default when a key is absent or
//!   holds the wrong dynamic type; they never fail.
//! - [`ProjectConfig`] / [`PipelineConfig`]: the declarative topology loaded
//!   from `sluice.yaml`.
//!
//! # Example
//!
//! ```yaml
//! log:
//!   level: info
//! defaults:
//!   window: 10
//! pipelines:
//!   - name: sensors
//!     inlets:
//!       - plugin: counter
//!         interval: 5s
//!     flows:
//!       - plugin: filter
//!         when: { field: count, op: gt, value: 2 }
//!     outlets:
//!       - plugin: stdout
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::value::Value;

/// A dynamically typed configuration value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Absent / explicit null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// List of values
    List(Vec<ConfigValue>),
    /// Nested map
    Map(ConfigMap),
}

impl ConfigValue {
    /// Scalar conversion into a pipeline [`Value`]; lists and maps have none
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Self::Null => Some(Value::Null(crate::value::ValueType::String)),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Int(i) => Some(Value::Int(*i)),
            Self::Float(f) => Some(Value::Float(*f)),
            Self::String(s) => Some(Value::String(s.clone())),
            Self::List(_) | Self::Map(_) => None,
        }
    }

    /// The nested map, if this is one
    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The list, if this is one
    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// The string, if this is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(v: ConfigMap) -> Self {
        Self::Map(v)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(v: Vec<ConfigValue>) -> Self {
        Self::List(v)
    }
}

/// Ordered string-keyed parameter map with default-applying accessors
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(BTreeMap<String, ConfigValue>);

impl ConfigMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw lookup
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bool at `key`, or `default`
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(ConfigValue::Bool(b)) => *b,
            _ => default,
        }
    }

    /// Integer at `key`, or `default`
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(ConfigValue::Int(i)) => *i,
            _ => default,
        }
    }

    /// Non-negative integer at `key`, or `default`
    pub fn get_uint(&self, key: &str, default: u64) -> u64 {
        match self.get(key) {
            Some(ConfigValue::Int(i)) if *i >= 0 => *i as u64,
            _ => default,
        }
    }

    /// Float at `key` (integers widen), or `default`
    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(ConfigValue::Float(f)) => *f,
            Some(ConfigValue::Int(i)) => *i as f64,
            _ => default,
        }
    }

    /// String at `key`, or `default`
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(ConfigValue::String(s)) => s,
            _ => default,
        }
    }

    /// Duration at `key`, or `default`.
    ///
    /// Numbers are seconds; strings use unit suffixes (`250ms`, `10s`,
    /// `1m30s`, `2h`).
    pub fn get_duration(&self, key: &str, default: Duration) -> Duration {
        match self.get(key) {
            Some(ConfigValue::Int(i)) if *i >= 0 => Duration::from_secs(*i as u64),
            Some(ConfigValue::Float(f)) => Duration::try_from_secs_f64(*f).unwrap_or(default),
            Some(ConfigValue::String(s)) => parse_duration(s).unwrap_or(default),
            _ => default,
        }
    }

    /// List at `key`, or an empty slice
    pub fn get_list(&self, key: &str) -> &[ConfigValue] {
        match self.get(key) {
            Some(ConfigValue::List(l)) => l,
            _ => &[],
        }
    }

    /// Nested map at `key`, or `None`
    pub fn get_map(&self, key: &str) -> Option<&ConfigMap> {
        self.get(key).and_then(ConfigValue::as_map)
    }

    /// A new map with `overrides` applied on top; nested maps merge
    /// recursively, everything else is replaced.
    pub fn merged(&self, overrides: &ConfigMap) -> ConfigMap {
        let mut out = self.clone();
        for (key, value) in &overrides.0 {
            let merged = match (out.0.get(key), value) {
                (Some(ConfigValue::Map(base)), ConfigValue::Map(over)) => {
                    ConfigValue::Map(base.merged(over))
                }
                _ => value.clone(),
            };
            out.0.insert(key.clone(), merged);
        }
        out
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigMap {
    fn from_iter<T: IntoIterator<Item = (String, ConfigValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse a Go-style duration string such as `1m30s` or `250ms`
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let amount: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        let part = Duration::try_from_secs_f64(amount * scale).ok()?;
        total = total.checked_add(part)?;
    }
    Some(total)
}

/// Root project configuration from `sluice.yaml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectConfig {
    /// Logging settings (consumed by the binary)
    #[serde(default)]
    pub log: LogConfig,

    /// Defaults merged into every component's parameters
    #[serde(default)]
    pub defaults: ConfigMap,

    /// Pipeline definitions
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// One pipeline: inlets → flow chain → outlets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name (must be unique within the project)
    pub name: String,

    /// Defaults merged into this pipeline's components
    #[serde(default)]
    pub defaults: ConfigMap,

    /// Sources
    #[serde(default)]
    pub inlets: Vec<InletConfig>,

    /// Transform chain, in order
    #[serde(default)]
    pub flows: Vec<ComponentConfig>,

    /// Sinks
    #[serde(default)]
    pub outlets: Vec<ComponentConfig>,
}

/// A plugin instance: plugin name, optional instance name, parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Registered plugin name
    pub plugin: String,

    /// Instance name; defaults to the plugin name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Remaining keys are the plugin's parameters
    #[serde(flatten)]
    pub params: ConfigMap,
}

impl ComponentConfig {
    /// Create a component with no parameters
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            name: None,
            params: ConfigMap::new(),
        }
    }

    /// Set the instance name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Instance name, falling back to the plugin name
    pub fn instance_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.plugin)
    }
}

/// An inlet plus the private flow chain run before fan-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InletConfig {
    /// Private flows applied to this inlet's batches only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flows: Vec<ComponentConfig>,

    /// The inlet component itself
    #[serde(flatten)]
    pub component: ComponentConfig,
}

impl From<ComponentConfig> for InletConfig {
    fn from(component: ComponentConfig) -> Self {
        Self {
            flows: Vec::new(),
            component,
        }
    }
}

impl PipelineConfig {
    /// Create an empty pipeline definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: ConfigMap::new(),
            inlets: Vec::new(),
            flows: Vec::new(),
            outlets: Vec::new(),
        }
    }

    /// Builder-style inlet
    pub fn inlet(mut self, inlet: impl Into<InletConfig>) -> Self {
        self.inlets.push(inlet.into());
        self
    }

    /// Builder-style flow
    pub fn flow(mut self, flow: ComponentConfig) -> Self {
        self.flows.push(flow);
        self
    }

    /// Builder-style outlet
    pub fn outlet(mut self, outlet: ComponentConfig) -> Self {
        self.outlets.push(outlet);
        self
    }

    /// Every component, inlet sub-flows included
    pub fn components(&self) -> impl Iterator<Item = &ComponentConfig> {
        self.inlets
            .iter()
            .flat_map(|i| std::iter::once(&i.component).chain(i.flows.iter()))
            .chain(self.flows.iter())
            .chain(self.outlets.iter())
    }
}

/// Main configuration container
#[derive(Debug, Clone)]
pub struct Config {
    /// Project configuration
    pub project: ProjectConfig,

    /// Base path of the project
    pub base_path: std::path::PathBuf,
}

impl Config {
    /// Load configuration from a directory or file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the project directory or sluice.yaml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let (config_path, base_path) = if path.is_dir() {
            (path.join("sluice.yaml"), path.to_path_buf())
        } else {
            (
                path.to_path_buf(),
                path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            )
        };

        if !config_path.exists() {
            return Err(Error::ConfigNotFound {
                path: config_path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(&config_path)?;
        let project = Self::parse(&contents)?;
        Ok(Self { project, base_path })
    }

    /// Parse and validate a project document
    pub fn parse(yaml: &str) -> Result<ProjectConfig> {
        let project: ProjectConfig = serde_yaml::from_str(yaml)?;
        validate(&project)?;
        Ok(project)
    }

    /// Find a pipeline by name
    pub fn pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.project.pipelines.iter().find(|p| p.name == name)
    }
}

fn validate(project: &ProjectConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for pipeline in &project.pipelines {
        if pipeline.name.trim().is_empty() {
            return Err(Error::invalid("pipeline name must not be empty"));
        }
        if !seen.insert(pipeline.name.as_str()) {
            return Err(Error::invalid(format!(
                "duplicate pipeline name '{}'",
                pipeline.name
            )));
        }
        if let Some(component) = pipeline.components().find(|c| c.plugin.trim().is_empty()) {
            return Err(Error::invalid(format!(
                "pipeline '{}': component '{}' has no plugin",
                pipeline.name,
                component.instance_name()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors_apply_defaults() {
        let map = ConfigMap::new()
            .with("n", 5i64)
            .with("f", 2.5)
            .with("s", "text")
            .with("b", true);

        assert_eq!(map.get_int("n", 0), 5);
        assert_eq!(map.get_int("missing", 7), 7);
        assert_eq!(map.get_int("s", 7), 7);
        assert_eq!(map.get_float("n", 0.0), 5.0);
        assert_eq!(map.get_float("f", 0.0), 2.5);
        assert_eq!(map.get_str("s", "x"), "text");
        assert_eq!(map.get_str("n", "x"), "x");
        assert!(map.get_bool("b", false));
        assert!(map.get_bool("n", true));
        assert!(map.get_list("n").is_empty());
        assert!(map.get_map("n").is_none());
    }

    #[test]
    fn test_get_uint_rejects_negative() {
        let map = ConfigMap::new().with("n", -3i64);
        assert_eq!(map.get_uint("n", 9), 9);
    }

    #[test]
    fn test_durations() {
        let map = ConfigMap::new()
            .with("a", 3i64)
            .with("b", "250ms")
            .with("c", "1m30s")
            .with("d", 0.5)
            .with("e", "soon");
        let d = Duration::from_secs(1);
        assert_eq!(map.get_duration("a", d), Duration::from_secs(3));
        assert_eq!(map.get_duration("b", d), Duration::from_millis(250));
        assert_eq!(map.get_duration("c", d), Duration::from_secs(90));
        assert_eq!(map.get_duration("d", d), Duration::from_millis(500));
        assert_eq!(map.get_duration("e", d), d);
    }

    #[test]
    fn test_durations_out_of_range_fall_back() {
        let map = ConfigMap::new()
            .with("huge", 1e30)
            .with("negative", -2.0)
            .with("bare", "1e30")
            .with("hours", "99999999999999999999h")
            .with("sum", "18446744073709549568s1h");
        let d = Duration::from_secs(1);
        for key in ["huge", "negative", "bare", "hours", "sum"] {
            assert_eq!(map.get_duration(key, d), d, "{key}");
        }
        assert!(parse_duration("99999999999999999999h").is_none());
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_none());
        assert!(parse_duration("10x").is_none());
        assert!(parse_duration("ms").is_none());
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn test_merged_overrides_and_recurses() {
        let base = ConfigMap::new()
            .with("a", 1i64)
            .with("nested", ConfigMap::new().with("x", 1i64).with("y", 2i64));
        let over = ConfigMap::new()
            .with("a", 10i64)
            .with("nested", ConfigMap::new().with("y", 20i64));
        let merged = base.merged(&over);
        assert_eq!(merged.get_int("a", 0), 10);
        let nested = merged.get_map("nested").unwrap();
        assert_eq!(nested.get_int("x", 0), 1);
        assert_eq!(nested.get_int("y", 0), 20);
        // base untouched
        assert_eq!(base.get_int("a", 0), 1);
    }

    #[test]
    fn test_config_value_untagged_yaml() {
        let map: ConfigMap = serde_yaml::from_str(
            "n: 3\nf: 1.5\ns: hi\nb: false\nl: [1, two]\nm: {k: v}\nz: ~\n",
        )
        .unwrap();
        assert_eq!(map.get("n"), Some(&ConfigValue::Int(3)));
        assert_eq!(map.get("f"), Some(&ConfigValue::Float(1.5)));
        assert_eq!(map.get("s"), Some(&ConfigValue::from("hi")));
        assert_eq!(map.get("b"), Some(&ConfigValue::Bool(false)));
        assert_eq!(map.get_list("l").len(), 2);
        assert_eq!(map.get_map("m").unwrap().get_str("k", ""), "v");
        assert_eq!(map.get("z"), Some(&ConfigValue::Null));
    }

    #[test]
    fn test_parse_minimal_config() {
        let project = Config::parse("pipelines: []\n").unwrap();
        assert!(project.pipelines.is_empty());
        assert_eq!(project.log.level, "info");
        assert_eq!(project.log.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
log:
  level: debug
  format: json
defaults:
  window: 10
pipelines:
  - name: sensors
    defaults:
      wait_limit: 3
    inlets:
      - plugin: counter
        name: ticks
        interval: 2s
        flows:
          - plugin: passthrough
    flows:
      - plugin: filter
        when: { field: count, op: gt, value: 2 }
    outlets:
      - plugin: stdout
"#;
        let project = Config::parse(yaml).unwrap();
        assert_eq!(project.log.format, LogFormat::Json);
        assert_eq!(project.defaults.get_int("window", 0), 10);

        let pipeline = &project.pipelines[0];
        assert_eq!(pipeline.name, "sensors");
        assert_eq!(pipeline.defaults.get_int("wait_limit", 0), 3);

        let inlet = &pipeline.inlets[0];
        assert_eq!(inlet.component.plugin, "counter");
        assert_eq!(inlet.component.instance_name(), "ticks");
        assert_eq!(
            inlet.component.params.get_duration("interval", Duration::ZERO),
            Duration::from_secs(2)
        );
        assert!(!inlet.component.params.contains_key("flows"));
        assert!(!inlet.component.params.contains_key("plugin"));
        assert_eq!(inlet.flows.len(), 1);

        let filter = &pipeline.flows[0];
        assert_eq!(filter.instance_name(), "filter");
        assert_eq!(filter.params.get_map("when").unwrap().get_str("op", ""), "gt");
        assert_eq!(pipeline.components().count(), 4);
    }

    #[test]
    fn test_duplicate_pipeline_names_rejected() {
        let yaml = "pipelines:\n  - name: a\n  - name: a\n";
        let err = Config::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate pipeline name"));
    }

    #[test]
    fn test_empty_plugin_rejected() {
        let yaml = "pipelines:\n  - name: a\n    outlets:\n      - plugin: ''\n";
        assert!(Config::parse(yaml).is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("sluice.yaml"),
            "pipelines:\n  - name: p\n    outlets:\n      - plugin: log\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.base_path, dir.path());
        assert!(config.pipeline("p").is_some());
        assert!(config.pipeline("q").is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source_system: Option<String>,
    #[serde(default)]
    pub target_system: Option<String>,
    #[serde(default)]
    pub bootstrap_servers: Option<String>,
    #[serde(default)]
    pub server_uri: Option<String>,
    #[serde(default)]
    pub filter_logic: Option<String>,
    #[serde(default = "default_true")]
    pub verbose: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: None,
            source_system: None,
            target_system: None,
            bootstrap_servers: None,
            server_uri: None,
            filter_logic: None,
            verbose: true,
        }
    }
}

impl StreamConfig {
    /// source systems publish on `<system>.int`
    pub fn input_topic(&self) -> Option<String> {
        self.source_system.as_ref().map(|s| format!("{s}.int"))
    }

    /// accepted records are forwarded to `<system>.ext`
    pub fn target_topic(&self) -> Option<String> {
        self.target_system.as_ref().map(|s| format!("{s}.ext"))
    }

    pub fn application_id(&self) -> Option<String> {
        match (&self.source_system, &self.name) {
            (Some(src), Some(name)) => Some(format!("streamhub-{src}.{name}")),
            _ => None,
        }
    }

    /// required options that are still unset, by their environment variable name
    pub fn missing_keys(&self) -> Vec<&'static str> {
        [
            ("STREAM_NAME", &self.name),
            ("SOURCE_SYSTEM", &self.source_system),
            ("TARGET_SYSTEM", &self.target_system),
            ("KAFKA_BOOTSTRAP_SERVERS", &self.bootstrap_servers),
            ("SERVER_URI", &self.server_uri),
            ("FILTER_LOGIC", &self.filter_logic),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().map(str::is_empty).unwrap_or(true))
        .map(|(k, _)| k)
        .collect()
    }
}

/// field names the filter language may reference; exactly one of them is numeric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default = "default_allowed")]
    pub allowed: Vec<String>,
    #[serde(default = "default_numeric")]
    pub numeric: String,
}

fn default_allowed() -> Vec<String> {
    ["thing", "quantity", "result", "time"].map(String::from).to_vec()
}
fn default_numeric() -> String {
    "result".into()
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self {
            allowed: default_allowed(),
            numeric: default_numeric(),
        }
    }
}

impl FieldSchema {
    pub fn new(allowed: &[&str], numeric: &str) -> crate::Result<Self> {
        let schema = Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
            numeric: numeric.to_string(),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.allowed.is_empty() {
            return Err(crate::StreamHubError::Config("fields.allowed is empty".into()));
        }
        if let Some(bad) = self.allowed.iter().find(|f| f.trim().is_empty() || f.contains(char::is_whitespace)) {
            return Err(crate::StreamHubError::Config(format!("invalid field name '{bad}'")));
        }
        if !self.is_allowed(&self.numeric) {
            return Err(crate::StreamHubError::Config(format!(
                "numeric field '{}' is not one of {:?}",
                self.numeric, self.allowed
            )));
        }
        Ok(())
    }

    pub fn is_allowed(&self, field: &str) -> bool {
        self.allowed.iter().any(|f| f == field)
    }

    pub fn is_numeric(&self, field: &str) -> bool {
        self.numeric == field
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_datastream_key")]
    pub datastream_key: String,
    #[serde(default = "default_datastream_attributes")]
    pub datastream_attributes: Vec<String>,
    #[serde(default = "default_meta_key")]
    pub meta_key: String,
    #[serde(default = "default_meta_attributes")]
    pub meta_attributes: Vec<String>,
    #[serde(default = "default_time_source")]
    pub time_source: String,
    #[serde(default = "default_time_target")]
    pub time_target: String,
}

fn default_datastream_key() -> String {
    "datastream".into()
}
fn default_datastream_attributes() -> Vec<String> {
    ["thing", "client_app", "quantity"].map(String::from).to_vec()
}
fn default_meta_key() -> String {
    "attributes".into()
}
fn default_meta_attributes() -> Vec<String> {
    ["longitude", "latitude"].map(String::from).to_vec()
}
fn default_time_source() -> String {
    "phenomenonTime".into()
}
fn default_time_target() -> String {
    "time".into()
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            datastream_key: default_datastream_key(),
            datastream_attributes: default_datastream_attributes(),
            meta_key: default_meta_key(),
            meta_attributes: default_meta_attributes(),
            time_source: default_time_source(),
            time_target: default_time_target(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String, // RUST_LOG wins when set
}

fn default_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub fields: FieldSchema,
    #[serde(default)]
    pub augment: AugmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("streamhub")
            .join("config.toml")
    }

    pub fn load() -> crate::Result<Self> {
        let path = if let Ok(env_path) = std::env::var("STREAMHUB_CONFIG") {
            PathBuf::from(env_path) // $STREAMHUB_CONFIG overrides default config path
        } else {
            Self::config_path()
        };
        let mut cfg = if path.exists() {
            Self::from_toml(&std::fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let cfg: Self =
            toml::from_str(content).map_err(|e| crate::StreamHubError::Config(e.to_string()))?;
        cfg.fields.validate()?;
        Ok(cfg)
    }

    pub fn save(&self) -> crate::Result<PathBuf> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_toml()?)?;
        Ok(path)
    }

    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::StreamHubError::Config(e.to_string()))
    }

    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// overlay stream options from environment-style variables
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let unquote = |s: String| s.replace('"', "");
        let stream = &mut self.stream;
        if let Some(v) = lookup("STREAM_NAME") {
            stream.name = Some(unquote(v));
        }
        if let Some(v) = lookup("SOURCE_SYSTEM") {
            stream.source_system = Some(v);
        }
        if let Some(v) = lookup("TARGET_SYSTEM") {
            stream.target_system = Some(v);
        }
        if let Some(v) = lookup("KAFKA_BOOTSTRAP_SERVERS") {
            stream.bootstrap_servers = Some(v);
        }
        if let Some(v) = lookup("SERVER_URI") {
            stream.server_uri = Some(v);
        }
        if let Some(v) = lookup("FILTER_LOGIC") {
            stream.filter_logic = Some(unquote(v));
        }
        if let Some(v) = lookup("VERBOSE") {
            stream.verbose = !v.trim().eq_ignore_ascii_case("false");
        }
    }
}

#[cfg(test)]
mod tests_config {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_sections_absent() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.fields.allowed, vec!["thing", "quantity", "result", "time"]);
        assert_eq!(cfg.fields.numeric, "result");
        assert!(cfg.stream.verbose);
        assert!(cfg.augment.enabled);
        assert_eq!(cfg.augment.time_source, "phenomenonTime");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn parses_stream_section() {
        let cfg = Config::from_toml(
            r#"
            [stream]
            name = "test-stream"
            source_system = "at.srfg.WeatherService.Stations"
            target_system = "at.srfg.MachineFleet.Machine1"
            filter_logic = "SELECT * FROM * WHERE result < 30;"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.stream.input_topic().unwrap(), "at.srfg.WeatherService.Stations.int");
        assert_eq!(cfg.stream.target_topic().unwrap(), "at.srfg.MachineFleet.Machine1.ext");
        assert_eq!(
            cfg.stream.application_id().unwrap(),
            "streamhub-at.srfg.WeatherService.Stations.test-stream"
        );
        assert_eq!(cfg.stream.missing_keys(), vec!["KAFKA_BOOTSTRAP_SERVERS", "SERVER_URI"]);
    }

    #[test]
    fn rejects_numeric_field_outside_allow_list() {
        let err = Config::from_toml("[fields]\nallowed = [\"a\", \"b\"]\nnumeric = \"c\"\n").unwrap_err();
        assert!(matches!(err, crate::StreamHubError::Config(_)));
        assert!(FieldSchema::new(&[], "x").is_err());
        assert!(FieldSchema::new(&["a b"], "a b").is_err());
        assert!(FieldSchema::new(&["level", "sensor"], "level").is_ok());
    }

    #[test]
    fn env_overrides_strip_quotes() {
        let vars: HashMap<&str, &str> = [
            ("STREAM_NAME", "\"my-stream\""),
            ("FILTER_LOGIC", "\"SELECT * FROM * WHERE result > 1\""),
            ("VERBOSE", "False"),
            ("SERVER_URI", "127.0.0.1:1908"),
        ]
        .into_iter()
        .collect();
        let mut cfg = Config::default();
        cfg.apply_env_with(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.stream.name.as_deref(), Some("my-stream"));
        assert_eq!(cfg.stream.filter_logic.as_deref(), Some("SELECT * FROM * WHERE result > 1"));
        assert_eq!(cfg.stream.server_uri.as_deref(), Some("127.0.0.1:1908"));
        assert!(!cfg.stream.verbose);
    }

    #[test]
    fn toml_roundtrip_keeps_fields() {
        let mut cfg = Config::default();
        cfg.stream.filter_logic = Some("SELECT * FROM *;".into());
        let back = Config::from_toml(&cfg.to_toml().unwrap()).unwrap();
        assert_eq!(back.stream.filter_logic, cfg.stream.filter_logic);
        assert_eq!(back.fields.allowed, cfg.fields.allowed);
    }
}

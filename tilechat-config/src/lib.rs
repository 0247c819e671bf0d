//! Loader for Tilechat configuration with YAML + environment overlays.
//!
//! Sources are merged in order: an optional `tilechat.yaml`, inline YAML
//! snippets (tests), then `TILECHAT__`-prefixed environment variables using
//! `__` as the nesting separator, e.g. `TILECHAT__GEMINI__API_KEY`. String
//! values may reference other variables as `${VAR}`; expansion is recursive
//! and capped.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tilechat_common::observability::{LogConfig, LogFormat};
use tilechat_common::{DEFAULT_ATTACHMENT_CAPACITY, MAX_IMAGE_BYTES};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
pub struct ChatConfig {
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub attachments: AttachmentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Optional `systemInstruction` sent with every request.
    #[serde(default)]
    pub system_instruction: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Whole-request timeout. Unset means the request may wait indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
            dir: None,
        }
    }
}

impl LoggingConfig {
    /// Translate into the observability settings. Stderr stays off: the TUI owns it.
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            log_dir: self.dir.clone(),
            format: self.format,
            default_filter: self.filter.clone(),
            ..LogConfig::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Explicit path, else `<data dir>/tilechat/settings.json`.
    pub fn settings_path(&self) -> PathBuf {
        self.settings_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tilechat")
                .join("settings.json")
        })
    }
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.into()
}
fn default_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.into()
}
fn default_capacity() -> usize {
    DEFAULT_ATTACHMENT_CAPACITY
}
fn default_max_file_bytes() -> u64 {
    MAX_IMAGE_BYTES
}
fn default_filter() -> String {
    "info".into()
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut cur = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let expanded = shellexpand::env(&cur)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| cur.clone());
                if expanded == cur {
                    break;
                }
                cur = expanded;
            }
            *s = cur;
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

fn validate(cfg: &ChatConfig) -> Result<(), ConfigError> {
    let key = cfg.gemini.api_key.trim();
    if key.is_empty() || key.contains("${") {
        return Err(ConfigError::Message(
            "gemini.api_key is missing; set it in tilechat.yaml or TILECHAT__GEMINI__API_KEY"
                .into(),
        ));
    }
    if cfg.attachments.capacity == 0 {
        return Err(ConfigError::Message(
            "attachments.capacity must be at least 1".into(),
        ));
    }
    if cfg.attachments.max_file_bytes == 0 {
        return Err(ConfigError::Message(
            "attachments.max_file_bytes must be positive".into(),
        ));
    }
    Ok(())
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct ChatConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    yaml: Vec<String>,
    files: Vec<(PathBuf, bool)>,
}

impl Default for ChatConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatConfigLoader {
    /// Start with no file sources; environment overrides are always applied last.
    ///
    /// ```
    /// use tilechat_config::{ChatConfigLoader, DEFAULT_GEMINI_MODEL};
    ///
    /// let config = ChatConfigLoader::new()
    ///     .with_yaml_str("gemini:\n  api_key: test-key")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
    /// assert_eq!(config.attachments.capacity, 3);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            yaml: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), true));
        self
    }

    /// Attach a file that is skipped when absent, so env-only setups work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.files.push((path.as_ref().to_path_buf(), false));
        self
    }

    /// Merge an inline YAML snippet after any files.
    ///
    /// ```
    /// use tilechat_config::ChatConfigLoader;
    ///
    /// let cfg = ChatConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// gemini:
    ///   api_key: "example"
    ///   model: "gemini-1.5-pro"
    /// attachments:
    ///   capacity: 5
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.gemini.model, "gemini-1.5-pro");
    /// assert_eq!(cfg.attachments.capacity, 5);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.yaml.push(yaml.to_string());
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders are expanded before the strongly typed structs
    /// are materialised, then the result is validated.
    pub fn load(self) -> Result<ChatConfig, ConfigError> {
        let mut builder = self.builder;
        for (path, required) in &self.files {
            builder = builder.add_source(File::from(path.as_path()).required(*required));
        }
        for yaml in &self.yaml {
            builder = builder.add_source(File::from_str(yaml, config::FileFormat::Yaml));
        }
        builder = builder.add_source(
            Environment::with_prefix("TILECHAT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: ChatConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        validate(&typed)?;

        tracing::debug!(
            model = %typed.gemini.model,
            endpoint = %typed.gemini.endpoint,
            capacity = typed.attachments.capacity,
            "configuration loaded"
        );
        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("TC_TEST_KEY", Some("secret"), || {
            let mut v = json!({ "gemini": { "api_key": "${TC_TEST_KEY}" } });
            expand_env_in_value(&mut v);
            assert_eq!(v, json!({ "gemini": { "api_key": "secret" } }));
        });
    }

    #[test]
    fn expands_recursively_and_stops_on_cycles() {
        temp_env::with_vars(
            [
                ("TC_INNER", Some("inner")),
                ("TC_OUTER", Some("outer-${TC_INNER}")),
                ("TC_A", Some("${TC_B}")),
                ("TC_B", Some("${TC_A}")),
            ],
            || {
                let mut v = json!(["${TC_OUTER}", "x=${TC_A}"]);
                expand_env_in_value(&mut v);
                assert_eq!(v[0], json!("outer-inner"));
                assert!(v[1].as_str().unwrap().contains("${"));
            },
        );
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${TILECHAT_DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${TILECHAT_DOES_NOT_EXIST}"));
    }

    #[test]
    fn unexpanded_api_key_is_rejected() {
        let err = ChatConfigLoader::new()
            .with_yaml_str("gemini:\n  api_key: \"${TILECHAT_MISSING_KEY}\"")
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ChatConfigLoader::new()
            .with_yaml_str("gemini:\n  api_key: k\nattachments:\n  capacity: 0")
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn explicit_settings_path_wins() {
        let storage = StorageConfig {
            settings_path: Some(PathBuf::from("/tmp/tc/settings.json")),
        };
        assert_eq!(storage.settings_path(), PathBuf::from("/tmp/tc/settings.json"));
    }
}

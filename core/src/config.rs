//! Configuration Management Module
//!
//! Settings store for prosefix: API endpoint/key/model, generation
//! parameters, the prompt list and chat widget placement. Backed by a single
//! file in TOML, JSON or YAML, with environment variable overrides.

use crate::prompts::NamePromptPair;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default OpenAI-compatible base URL
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration file format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    Json,
    #[default]
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from a file extension, defaulting to TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ConfigFormat::Json,
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }
}

impl std::str::FromStr for ConfigFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            _ => Err(anyhow!("Unsupported config format: {}", s)),
        }
    }
}

/// Where the host shows the chat widget
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WidgetPosition {
    #[default]
    Right,
    Left,
    Bottom,
}

impl std::fmt::Display for WidgetPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WidgetPosition::Right => "right",
            WidgetPosition::Left => "left",
            WidgetPosition::Bottom => "bottom",
        };
        f.write_str(s)
    }
}

/// Connection and generation settings for the chat-completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL or full `/chat/completions` URL
    pub endpoint: String,
    /// Bearer token. `env:NAME` reads the key from the environment.
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_seconds: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            timeout_seconds: 30,
        }
    }
}

impl ApiSettings {
    /// API key with `env:NAME` references resolved
    pub fn resolved_api_key(&self) -> String {
        resolve_env_var(&self.api_key)
    }

    /// List every problem that would prevent a request from being sent
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            errors.push("API endpoint is not configured".to_string());
        } else if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(format!(
                "API endpoint must start with http:// or https:// (got '{}')",
                endpoint
            ));
        }

        let key = self.resolved_api_key();
        if key.trim().is_empty() {
            errors.push("API key is not configured".to_string());
        } else if key.starts_with("env:") {
            errors.push(format!("API key environment variable {} is not set", &key[4..]));
        }

        if self.model.trim().is_empty() {
            errors.push("Model is not configured".to_string());
        }
        if self.max_tokens == 0 {
            errors.push("Max tokens must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push(format!(
                "Temperature must be between 0.0 and 2.0 (got {})",
                self.temperature
            ));
        }
        if self.timeout_seconds == 0 {
            errors.push("Request timeout must be greater than 0".to_string());
        }

        errors
    }
}

/// Chat widget settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    pub position: WidgetPosition,
    /// Oldest messages are dropped past this count
    pub max_messages: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            position: WidgetPosition::Right,
            max_messages: 200,
        }
    }
}

/// Full settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub log_level: String,
    /// Prompt used by "process document" (name or id). First prompt when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_prompt: Option<String>,
    pub api: ApiSettings,
    pub chat: ChatSettings,
    pub prompts: Vec<NamePromptPair>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_prompt: None,
            api: ApiSettings::default(),
            chat: ChatSettings::default(),
            prompts: Vec::new(),
        }
    }
}

/// Values taken from `PROSEFIX_*` environment variables
///
/// Overrides only shape the effective settings; they are never written back
/// to the settings file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub log_level: Option<String>,
}

impl EnvOverrides {
    /// Read the overrides from the process environment
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        Self {
            endpoint: var("PROSEFIX_API_ENDPOINT"),
            api_key: var("PROSEFIX_API_KEY"),
            model: var("PROSEFIX_MODEL"),
            max_tokens: var("PROSEFIX_MAX_TOKENS").and_then(|v| v.parse().ok()),
            temperature: var("PROSEFIX_TEMPERATURE").and_then(|v| v.parse().ok()),
            log_level: var("PROSEFIX_LOG_LEVEL"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(&self, settings: &mut Settings) {
        let api = &mut settings.api;
        if let Some(endpoint) = &self.endpoint {
            api.endpoint = endpoint.clone();
        }
        if let Some(api_key) = &self.api_key {
            api.api_key = api_key.clone();
        }
        if let Some(model) = &self.model {
            api.model = model.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            api.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            api.temperature = temperature;
        }
        if let Some(log_level) = &self.log_level {
            settings.log_level = log_level.clone();
        }
    }
}

/// Configuration manager
///
/// Holds two layers: the settings as stored in the file, and the effective
/// settings with environment overrides on top. Edits go to the file layer;
/// `save_config` and `render` only ever serialize the file layer.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    config_format: ConfigFormat,
    file: Settings,
    overrides: EnvOverrides,
    effective: Settings,
}

impl ConfigManager {
    /// Open the settings at the default location
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_path()?)
    }

    /// Open settings at `path`; the format follows the extension
    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut manager = Self::in_memory(path, Settings::default());

        if manager.config_exists() {
            manager.load_config()?;
        }

        manager.apply_env_overrides();

        Ok(manager)
    }

    /// Manager over in-memory settings (nothing is read until `load_config`)
    pub fn in_memory<P: AsRef<Path>>(path: P, settings: Settings) -> Self {
        let config_path = path.as_ref().to_path_buf();
        Self {
            config_format: ConfigFormat::from_path(&config_path),
            config_path,
            effective: settings.clone(),
            file: settings,
            overrides: EnvOverrides::default(),
        }
    }

    /// `<config_dir>/prosefix/settings.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(dir.join("prosefix").join("settings.toml"))
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_format(&self) -> ConfigFormat {
        self.config_format
    }

    /// Load settings from file
    pub fn load_config(&mut self) -> Result<()> {
        let content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config file {:?}", self.config_path))?;

        self.file = match self.config_format {
            ConfigFormat::Toml => {
                toml::from_str(&content).context("Failed to parse TOML config")?
            }
            ConfigFormat::Json => {
                serde_json::from_str(&content).context("Failed to parse JSON config")?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(&content).context("Failed to parse YAML config")?
            }
        };
        self.recompute();

        info!(path = ?self.config_path, "Loaded configuration");
        Ok(())
    }

    /// Re-read the file (if present) and the environment overrides
    pub fn reload(&mut self) -> Result<()> {
        if self.config_exists() {
            self.load_config()?;
        }
        self.apply_env_overrides();
        Ok(())
    }

    /// Save the file layer
    pub fn save_config(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory {:?}", parent))?;
            }
        }

        let content = self.render()?;
        fs::write(&self.config_path, content)
            .with_context(|| format!("Failed to write config file {:?}", self.config_path))?;

        info!(path = ?self.config_path, "Saved configuration");
        Ok(())
    }

    /// Serialize the file layer in the file's format
    pub fn render(&self) -> Result<String> {
        render_settings(&self.file, self.config_format)
    }

    /// Serialize the effective settings (overrides included) in the file's format
    pub fn render_effective(&self) -> Result<String> {
        render_settings(&self.effective, self.config_format)
    }

    /// Read `PROSEFIX_*` overrides from the environment
    pub fn apply_env_overrides(&mut self) {
        self.set_overrides(EnvOverrides::from_env());
    }

    /// Replace the environment overrides
    pub fn set_overrides(&mut self, overrides: EnvOverrides) {
        if !overrides.is_empty() {
            debug!(
                endpoint = overrides.endpoint.is_some(),
                api_key = overrides.api_key.is_some(),
                model = overrides.model.is_some(),
                "Applied environment overrides"
            );
        }
        self.overrides = overrides;
        self.recompute();
    }

    pub fn overrides(&self) -> &EnvOverrides {
        &self.overrides
    }

    fn recompute(&mut self) {
        let mut effective = self.file.clone();
        self.overrides.apply(&mut effective);
        self.effective = effective;
    }

    /// Effective settings: the file layer with environment overrides applied
    pub fn settings(&self) -> &Settings {
        &self.effective
    }

    /// Settings as stored in the file
    pub fn file_settings(&self) -> &Settings {
        &self.file
    }

    /// Change the file layer
    pub fn edit<F: FnOnce(&mut Settings)>(&mut self, f: F) {
        f(&mut self.file);
        self.recompute();
    }

    /// Replace the stored prompt list
    pub fn set_prompts(&mut self, prompts: Vec<NamePromptPair>) {
        self.edit(|settings| settings.prompts = prompts);
    }

    /// Validate the effective API section; empty when the settings are usable
    pub fn validate(&self) -> Vec<String> {
        self.effective.api.validate()
    }

    /// Reset everything except the file location and the overrides
    pub fn reset_to_defaults(&mut self) {
        self.edit(|settings| *settings = Settings::default());
    }
}

fn render_settings(settings: &Settings, format: ConfigFormat) -> Result<String> {
    let content = match format {
        ConfigFormat::Toml => {
            toml::to_string_pretty(settings).context("Failed to serialize TOML config")?
        }
        ConfigFormat::Json => {
            serde_json::to_string_pretty(settings).context("Failed to serialize JSON config")?
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(settings).context("Failed to serialize YAML config")?
        }
    };
    Ok(content)
}

/// Resolve environment variable reference
///
/// If value starts with "env:", read from environment.
/// Otherwise return value as-is.
pub fn resolve_env_var(value: &str) -> String {
    if let Some(rest) = value.strip_prefix("env:") {
        std::env::var(rest).unwrap_or_else(|_| format!("env:{}", rest))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptManager;
    use tempfile::tempdir;

    fn configured() -> ApiSettings {
        ApiSettings {
            api_key: "sk-test".to_string(),
            ..ApiSettings::default()
        }
    }

    #[test]
    fn test_defaults_need_only_a_key() {
        assert_eq!(
            ApiSettings::default().validate(),
            vec!["API key is not configured".to_string()]
        );
        assert!(configured().validate().is_empty());
    }

    #[test]
    fn test_validate_lists_every_missing_field() {
        let api = ApiSettings {
            endpoint: String::new(),
            api_key: String::new(),
            model: " ".to_string(),
            ..ApiSettings::default()
        };
        let errors = api.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("endpoint"));
        assert!(errors[1].contains("API key"));
        assert!(errors[2].contains("Model"));
    }

    #[test]
    fn test_validate_ranges() {
        let mut api = configured();
        api.endpoint = "ftp://example.com".to_string();
        api.temperature = 2.5;
        api.max_tokens = 0;
        let errors = api.validate();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_unset_env_key_is_reported() {
        let mut api = configured();
        api.api_key = "env:PROSEFIX_TEST_SURELY_UNSET_KEY".to_string();
        let errors = api.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("PROSEFIX_TEST_SURELY_UNSET_KEY"));
    }

    #[test]
    fn test_resolve_env_var_direct() {
        assert_eq!(resolve_env_var("direct_value"), "direct_value");
    }

    #[test]
    fn test_resolve_env_var_reference() {
        std::env::set_var("PROSEFIX_TEST_RESOLVE_VAR", "test_value");
        assert_eq!(resolve_env_var("env:PROSEFIX_TEST_RESOLVE_VAR"), "test_value");
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("a")), ConfigFormat::Toml);
        assert!("ini".parse::<ConfigFormat>().is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::with_path(dir.path().join("settings.toml")).unwrap();
        assert!(!manager.config_exists());
        assert_eq!(manager.settings().chat.position, WidgetPosition::Right);
    }

    #[test]
    fn test_save_load_each_format() {
        let dir = tempdir().unwrap();
        for file in ["settings.toml", "settings.json", "settings.yaml"] {
            let path = dir.path().join("nested").join(file);
            let mut manager = ConfigManager::in_memory(&path, Settings::default());
            manager.edit(|s| {
                s.api.model = "gpt-test".to_string();
                s.chat.position = WidgetPosition::Bottom;
            });
            manager.set_prompts(PromptManager::from_stored(Vec::new()).into_inner());
            manager.save_config().unwrap();

            let mut loaded = ConfigManager::in_memory(&path, Settings::default());
            loaded.load_config().unwrap();
            assert_eq!(loaded.settings().api.model, "gpt-test", "{}", file);
            assert_eq!(loaded.settings().chat.position, WidgetPosition::Bottom);
            assert_eq!(loaded.settings().prompts, manager.settings().prompts);
        }
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[api]\nmodel = \"tiny\"\n").unwrap();
        let mut manager = ConfigManager::in_memory(&path, Settings::default());
        manager.load_config().unwrap();
        assert_eq!(manager.settings().api.model, "tiny");
        assert_eq!(manager.settings().api.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(manager.settings().log_level, "info");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let mut manager = ConfigManager::in_memory(&path, Settings::default());
        assert!(manager.load_config().is_err());
    }

    fn key_override(key: &str) -> EnvOverrides {
        EnvOverrides {
            api_key: Some(key.to_string()),
            model: Some("env-model".to_string()),
            ..EnvOverrides::default()
        }
    }

    #[test]
    fn test_overrides_are_never_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[api]\napiKey = \"env:OPENAI_API_KEY\"\n").unwrap();

        let mut manager = ConfigManager::in_memory(&path, Settings::default());
        manager.load_config().unwrap();
        manager.set_overrides(key_override("sk-SECRET-FROM-ENV"));
        assert_eq!(manager.settings().api.api_key, "sk-SECRET-FROM-ENV");
        assert_eq!(manager.settings().api.model, "env-model");

        manager.set_prompts(PromptManager::from_stored(Vec::new()).into_inner());
        manager.save_config().unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("env:OPENAI_API_KEY"));
        assert!(!written.contains("sk-SECRET-FROM-ENV"));
        assert!(!written.contains("env-model"));
        assert!(!manager.render().unwrap().contains("sk-SECRET-FROM-ENV"));
        assert!(manager.render_effective().unwrap().contains("sk-SECRET-FROM-ENV"));
    }

    #[test]
    fn test_edits_survive_override_removal() {
        let dir = tempdir().unwrap();
        let mut manager =
            ConfigManager::in_memory(dir.path().join("settings.toml"), Settings::default());
        manager.set_overrides(key_override("sk-env"));
        manager.edit(|s| s.api.max_tokens = 64);
        assert_eq!(manager.settings().api.api_key, "sk-env");
        assert_eq!(manager.settings().api.max_tokens, 64);

        manager.set_overrides(EnvOverrides::default());
        assert_eq!(manager.settings().api.api_key, "");
        assert_eq!(manager.settings().api.max_tokens, 64);
        assert_eq!(manager.file_settings(), manager.settings());
    }
}

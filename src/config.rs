//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILRENDER_CONFIG` (environment variable)
//! 2. `~/.config/mailrender/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailrender\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::message::Message;
use crate::model::part::{MessagePart, SinglePart};
use crate::render::callback::TemplateCallback;
use crate::render::RenderOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Traversal options.
    pub render: RenderOptions,
    /// Template overrides.
    pub templates: TemplatesConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Templates applied while rendering. Unset entries use the built-in ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Wraps the whole message (`BODY`, `HEADER`, header fields).
    pub message: Option<String>,
    /// Wraps an embedded `message/rfc822` part.
    pub embedded_message: Option<String>,
    /// Wraps each rendered text part (`TEXT`).
    pub text_part: Option<String>,
    /// Renders each attachment (`FILENAME`, `MIMETYPE`, `SIZE`, ...).
    pub attachment: Option<String>,
    /// Rendered once between the text and the first attachment.
    pub attachment_separator: Option<String>,
    /// Used instead of `message` when an attachment precedes text.
    pub mixed_message: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

// ── Templates ───────────────────────────────────────────────────

/// A [`TemplateCallback`] driven by [`TemplatesConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfiguredTemplates {
    templates: TemplatesConfig,
    mixed_mode: bool,
}

impl ConfiguredTemplates {
    pub fn new(templates: TemplatesConfig) -> Self {
        Self {
            templates,
            mixed_mode: false,
        }
    }

    /// Whether the last render saw an attachment before text.
    pub fn mixed_mode(&self) -> bool {
        self.mixed_mode
    }
}

impl TemplateCallback for ConfiguredTemplates {
    fn set_mixed_text_and_attachments_mode(&mut self, enabled: bool) {
        self.mixed_mode = enabled;
    }

    fn template_for_message(&self, _message: &Message) -> String {
        let mixed = self
            .templates
            .mixed_message
            .as_ref()
            .filter(|_| self.mixed_mode);
        mixed
            .or(self.templates.message.as_ref())
            .cloned()
            .unwrap_or_else(|| "{{BODY}}".to_string())
    }

    fn template_for_embedded_message(&self, _part: &MessagePart) -> String {
        self.templates
            .embedded_message
            .clone()
            .unwrap_or_else(|| "{{BODY}}".to_string())
    }

    fn template_for_text_part(&self, _part: &SinglePart) -> String {
        self.templates
            .text_part
            .clone()
            .unwrap_or_else(|| "{{TEXT}}".to_string())
    }

    fn template_for_attachment(&self, _part: &SinglePart) -> String {
        self.templates.attachment.clone().unwrap_or_default()
    }

    fn template_for_attachment_separator(&self) -> String {
        self.templates
            .attachment_separator
            .clone()
            .unwrap_or_default()
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILRENDER_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailrender").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailrender")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailrender.log")
}

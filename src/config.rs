use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_LEAN_CANVAS_CONFIG: &str = "LEAN_CANVAS_CONFIG";
pub const ENV_LEAN_CANVAS_API_KEY: &str = "LEAN_CANVAS_API_KEY";

const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_MODEL_ID: &str = "llama3.2";
const DEFAULT_EXPORT_PATH: &str = "lean-canvas.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

impl ConfigError {
    fn configuration(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[default]
    Ollama,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    pub fn requires_api_key(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeanCanvasConfig {
    #[serde(default)]
    pub service_kind: ServiceKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_export_path")]
    pub export_path: String,
}

impl Default for LeanCanvasConfig {
    fn default() -> Self {
        Self {
            service_kind: ServiceKind::default(),
            base_url: default_base_url(),
            model_id: default_model_id(),
            api_key: String::new(),
            export_path: default_export_path(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_owned()
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_owned()
}

fn default_export_path() -> String {
    DEFAULT_EXPORT_PATH.to_owned()
}

impl LeanCanvasConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("base_url", self.base_url.as_str()),
            ("model_id", self.model_id.as_str()),
            ("export_path", self.export_path.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::configuration(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if self.service_kind.requires_api_key() && self.api_key.trim().is_empty() {
            return Err(ConfigError::configuration(format!(
                "api_key is required for service_kind = \"{}\" (set it in the config file or {ENV_LEAN_CANVAS_API_KEY})",
                self.service_kind.as_str()
            )));
        }
        Ok(())
    }

    pub fn export_path(&self) -> PathBuf {
        PathBuf::from(self.export_path.trim())
    }
}

pub fn load_from_env() -> Result<LeanCanvasConfig, ConfigError> {
    let path = config_path_from_env()?;
    let mut config = load_from_path(path)?;
    if let Ok(api_key) = std::env::var(ENV_LEAN_CANVAS_API_KEY) {
        if !api_key.trim().is_empty() {
            config.api_key = api_key.trim().to_owned();
        }
    }
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<LeanCanvasConfig, ConfigError> {
    load_or_create_config(path.as_ref())
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = resolve_home_dir().ok_or_else(|| {
        ConfigError::configuration("Unable to resolve home directory from HOME or USERPROFILE")
    })?;

    Ok(home.join(".config").join("lean-canvas").join("config.toml"))
}

fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    match std::env::var(ENV_LEAN_CANVAS_CONFIG) {
        Ok(raw) => {
            if raw.trim().is_empty() {
                default_config_path()
            } else {
                Ok(raw.into())
            }
        }
        Err(std::env::VarError::NotPresent) => default_config_path(),
        Err(_) => Err(ConfigError::configuration(
            "LEAN_CANVAS_CONFIG contained invalid UTF-8",
        )),
    }
}

fn resolve_home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("USERPROFILE")
                .ok()
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
}

fn persist_config(path: &Path, config: &LeanCanvasConfig) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config).map_err(|err| {
        ConfigError::configuration(format!("Failed to serialize lean canvas config: {err}"))
    })?;
    std::fs::write(path, rendered).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to write lean canvas config to {}: {err}",
            path.display()
        ))
    })
}

fn load_or_create_config(path: &Path) -> Result<LeanCanvasConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|err| {
                        ConfigError::configuration(format!(
                            "Failed to create parent directory {} for lean canvas config: {err}",
                            parent.display()
                        ))
                    })?;
                }
            }

            let default_config = LeanCanvasConfig::default();
            persist_config(path, &default_config)?;
            tracing::info!(path = %path.display(), "wrote default lean canvas config");
            return Ok(default_config);
        }
        Err(err) => {
            return Err(ConfigError::configuration(format!(
                "Failed to read lean canvas config from {}: {err}",
                path.display()
            )));
        }
    };

    toml::from_str(&raw).map_err(|err| {
        ConfigError::configuration(format!(
            "Failed to parse lean canvas config from {}: {err}",
            path.display()
        ))
    })
}

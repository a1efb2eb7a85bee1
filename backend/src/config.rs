use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "config/smartwaste.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub upload: UploadConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Width and height the classifier was trained on.
    pub input_size: [u32; 2],
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub debug_mode: bool,
    pub bypass_validation: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("model97.pt"),
            input_size: [50, 50],
            confidence_threshold: 60.0,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
        }
    }
}

impl AppConfig {
    /// Resolves the config file, applies environment overrides and validates the result.
    ///
    /// `SMARTWASTE_CONFIG` points at an explicit file which must exist. Without it the
    /// default path is tried and built-in defaults are used when that file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match env::var("SMARTWASTE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    log::warn!(
                        "No config found at {}, using built-in defaults",
                        DEFAULT_CONFIG_PATH
                    );
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(path) = env::var("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(flag) = env_flag("SMARTWASTE_DEBUG") {
            self.diagnostics.debug_mode = flag;
        }
        if let Some(flag) = env_flag("SMARTWASTE_BYPASS_VALIDATION") {
            self.diagnostics.bypass_validation = flag;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.model.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be within [0, 100], got {}",
                self.model.confidence_threshold
            )));
        }
        if self.model.input_size.contains(&0) {
            return Err(ConfigError::Invalid("input_size must be non-zero".into()));
        }
        if self.upload.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one upload extension must be allowed".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name).ok().map(|v| parse_flag(&v))
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_model() {
        let config = AppConfig::default();
        assert_eq!(config.model.input_size, [50, 50]);
        assert_eq!(config.model.confidence_threshold, 60.0);
        assert_eq!(config.upload.allowed_extensions, vec!["jpg", "jpeg", "png"]);
        assert!(!config.diagnostics.debug_mode);
        assert!(!config.diagnostics.bypass_validation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_sections() {
        let config = AppConfig::from_yaml(
            "server:\n  port: 9000\ndiagnostics:\n  debug_mode: true\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.diagnostics.debug_mode);
        assert_eq!(config.model.input_size, [50, 50]);
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.model.confidence_threshold = 120.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_empty_extension_list() {
        let config = AppConfig::from_yaml("upload:\n  allowed_extensions: []\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            AppConfig::from_yaml("server: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn flag_parsing_accepts_common_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}

use secrecy::{ExposeSecret, SecretBox};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::audio::NormalizerConfig;
use crate::detection::{CascadeConfig, ScanConfig};
use crate::exercise::DecisionConfig;
use crate::heuristics::{BreathConfig, SustainConfig, VoicingConfig};
use crate::transcript::AlignerConfig;

/// Environment variable holding the Google Speech-to-Text API key.
pub const GOOGLE_SPEECH_KEY_VAR: &str = "GOOGLE_SPEECH_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid API key format for {service}: {reason}")]
    InvalidKeyFormat { service: String, reason: String },
    #[error("Environment error: {0}")]
    EnvError(#[from] env::VarError),
    #[error("Model file not found for {name}: {path}")]
    MissingModelFile { name: String, path: PathBuf },
    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },
}

/// Credentials for external services
#[derive(Debug)]
pub struct ApiConfig {
    pub google_speech_key: SecretBox<String>,
}

impl ApiConfig {
    /// Load API configuration from environment variables (and `.env` if present)
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let google_speech_key = Self::load_api_key(GOOGLE_SPEECH_KEY_VAR, "Google Speech")?;

        Ok(Self { google_speech_key })
    }

    fn load_api_key(env_var: &str, service_name: &str) -> Result<SecretBox<String>, ConfigError> {
        let key = env::var(env_var).map_err(|_| ConfigError::MissingEnvVar(env_var.to_string()))?;

        if key.trim().is_empty() {
            return Err(ConfigError::InvalidKeyFormat {
                service: service_name.to_string(),
                reason: "API key cannot be empty".to_string(),
            });
        }

        Self::validate_key_format(key.trim(), service_name)?;

        Ok(SecretBox::new(Box::new(key.trim().to_string())))
    }

    fn validate_key_format(key: &str, service: &str) -> Result<(), ConfigError> {
        if service == "Google Speech" && !key.starts_with("AIza") {
            // Google Cloud API keys share this prefix
            return Err(ConfigError::InvalidKeyFormat {
                service: service.to_string(),
                reason: "Google API keys should start with 'AIza'".to_string(),
            });
        }
        Ok(())
    }

    /// Get the Google Speech API key (use only when making API calls)
    pub fn google_speech_key(&self) -> &str {
        self.google_speech_key.expose_secret()
    }
}

/// Load configuration with helpful error messages for development
pub fn load_config() -> Result<ApiConfig, ConfigError> {
    match ApiConfig::load() {
        Ok(config) => {
            log::info!("Successfully loaded API configuration");
            Ok(config)
        }
        Err(ConfigError::MissingEnvVar(var)) => {
            log::error!("Missing required environment variable: {}", var);
            log::error!("Create a .env file in the project root with:");
            log::error!("{}=your_api_key_here", var);
            Err(ConfigError::MissingEnvVar(var))
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Locations of the three model files.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub embedding: PathBuf,
    pub gatekeeper: PathBuf,
    pub specialist: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            embedding: PathBuf::from("models/yamnet.tflite"),
            gatekeeper: PathBuf::from("models/gatekeeper.tflite"),
            specialist: PathBuf::from("models/specialist.tflite"),
        }
    }
}

impl ModelPaths {
    /// Check every model file exists. Loading itself happens lazily.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, path) in [
            ("embedding", &self.embedding),
            ("gatekeeper", &self.gatekeeper),
            ("specialist", &self.specialist),
        ] {
            if !Path::new(path).is_file() {
                return Err(ConfigError::MissingModelFile {
                    name: name.to_string(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Every tuning constant of the analysis pipeline, with production defaults.
#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub normalizer: NormalizerConfig,
    pub cascade: CascadeConfig,
    pub scan: ScanConfig,
    pub sustain: SustainConfig,
    pub breath: BreathConfig,
    pub voicing: VoicingConfig,
    pub aligner: AlignerConfig,
    pub decision: DecisionConfig,
}

fn unit_interval(name: &str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSetting {
            name: name.to_string(),
            reason: format!("{} is outside [0, 1]", value),
        })
    }
}

impl AnalysisConfig {
    /// Reject settings that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        unit_interval("binary_threshold", self.cascade.binary_threshold)?;
        unit_interval("min_type_confidence", self.cascade.min_type_confidence)?;

        if !(self.scan.window_sec > 0.0 && self.scan.step_sec > 0.0) {
            return Err(ConfigError::InvalidSetting {
                name: "scan".to_string(),
                reason: format!(
                    "window ({}s) and step ({}s) must be positive",
                    self.scan.window_sec, self.scan.step_sec
                ),
            });
        }
        if self.normalizer.target_rate == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "target_rate".to_string(),
                reason: "sample rate cannot be zero".to_string(),
            });
        }
        Ok(())
    }
}

//! Configuration types for the voice ordering engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the kiosk voice engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Session lifecycle and timer settings.
    pub session: SessionConfig,
    /// Remote intent classifier settings.
    pub classifier: ClassifierConfig,
    /// Order submission backend settings.
    pub orders: OrderBackendConfig,
}

/// Session lifecycle and timer configuration.
///
/// All three timers are invalidated (not merely cleared) on cancel: a stale
/// callback firing after cancellation is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session is destroyed after this many seconds without activity.
    pub activity_timeout_secs: u64,
    /// Capture auto-stops after this much silence following a partial result.
    pub silence_timeout_ms: u64,
    /// Capture is force-stopped after this many seconds regardless of silence.
    pub max_listening_secs: u64,
    /// Delay before capture re-opens after a `clarify` action.
    pub clarify_reopen_delay_ms: u64,
    /// How long the last recognized utterance stays visible to UI shells.
    pub recognized_text_ttl_secs: u64,
    /// Maximum retained conversation turn pairs (user + assistant).
    pub max_history_pairs: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            activity_timeout_secs: 45,
            silence_timeout_ms: 2_000,
            max_listening_secs: 10,
            clarify_reopen_delay_ms: 1_500,
            recognized_text_ttl_secs: 3,
            max_history_pairs: 5,
        }
    }
}

/// Remote intent classifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Base URL of the generateContent-style endpoint.
    pub api_url: String,
    /// Model name appended to the URL path.
    pub api_model: String,
    /// API key reference.
    pub api_key: SecretRef,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Sampling temperature forwarded to the model.
    pub temperature: f32,
    /// Maximum output tokens requested from the model.
    pub max_output_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_url: "https://generativelanguage.googleapis.com/v1beta/models".to_owned(),
            api_model: "gemini-2.0-flash".to_owned(),
            api_key: SecretRef::Env {
                var: "KIOSK_CLASSIFIER_API_KEY".to_owned(),
            },
            timeout_ms: 8_000,
            temperature: 0.7,
            max_output_tokens: 512,
        }
    }
}

/// Order submission backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderBackendConfig {
    /// Base URL of the café REST backend (orders are POSTed to `{base}/orders`).
    pub base_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for OrderBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001/api".to_owned(),
            timeout_ms: 5_000,
        }
    }
}

/// Secret reference for API credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretRef {
    /// No API key.
    #[default]
    None,
    /// Inline literal key (discouraged; prefer env).
    Literal { value: String },
    /// Resolve the key from an environment variable.
    Env { var: String },
}

impl SecretRef {
    /// Resolve the secret to a concrete value, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if an `env` reference names a missing or empty
    /// variable.
    pub fn resolve(&self) -> crate::error::Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Literal { value } => Ok(Some(value.clone())),
            Self::Env { var } => {
                let value = std::env::var(var).map_err(|_| {
                    crate::error::KioskError::Config(format!(
                        "classifier secret env var is missing: {var}"
                    ))
                })?;
                if value.trim().is_empty() {
                    return Err(crate::error::KioskError::Config(format!(
                        "classifier secret env var is empty: {var}"
                    )));
                }
                Ok(Some(value))
            }
        }
    }
}

impl KioskConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::KioskError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KioskError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/kiosk-voice/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("kiosk-voice").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("kiosk-voice")
                .join("config.toml")
        } else {
            PathBuf::from("kiosk-voice-config.toml")
        }
    }
}

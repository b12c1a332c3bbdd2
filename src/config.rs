//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **impl blocks**: Add methods to structs
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST`, `PORT` and `GROQ_API_KEY` environment variables
//! 2. Environment variables (APP_SERVER__PORT, APP_AI__MODEL, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// ## Why separate config structs:
/// Each section maps to one table in config.toml and one concern in the code:
/// where to listen, which completion service to call, what the dashboard shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ai: AiConfig,
    pub coaching: CoachingConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Completion service settings.
///
/// ## Fields:
/// - `base_url`: OpenAI-compatible API root; `/chat/completions` is appended
/// - `api_key`: bearer token, normally supplied through `GROQ_API_KEY`
/// - `model`: model name sent with every request
/// - `analysis_temperature` / `summary_temperature`: sampling temperature per prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub analysis_temperature: f32,
    pub summary_temperature: f32,
}

impl AiConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Whether the model or a temperature differs from `active`, the settings
    /// the running completion client uses.
    pub fn differs_from(&self, active: &AiConfig) -> bool {
        self.model != active.model
            || self.analysis_temperature != active.analysis_temperature
            || self.summary_temperature != active.summary_temperature
    }
}

/// Static coaching content served by the dashboard endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachingConfig {
    /// Tips listed on the home screen.
    pub ai_plan: Vec<String>,
    pub pitch_hint: String,
    /// How many of the most recent summaries `/reports` returns.
    pub report_window: usize,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration file exists.
/// They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            ai: AiConfig {
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key: String::new(),
                model: "llama-3.1-8b-instant".to_string(),
                analysis_temperature: 0.4,
                summary_temperature: 0.3,
            },
            coaching: CoachingConfig {
                ai_plan: vec![
                    "Lead with value before pricing".to_string(),
                    "Ask about implementation timeline".to_string(),
                    "Avoid discount discussion early".to_string(),
                ],
                pitch_hint: "Ask 'how' questions before explaining features".to_string(),
                report_window: 3,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST, PORT and GROQ_API_KEY
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_AI__MODEL=llama-3.1-70b-versatile`: Override the completion model
    /// - `APP_COACHING__REPORT_WINDOW=5`: Show five summaries on `/reports`
    /// - `GROQ_API_KEY=gsk_...`: API key for the completion service
    ///
    /// The double underscore separates sections so field names keep their own
    /// single underscores.
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        if let Ok(api_key) = env::var("GROQ_API_KEY") {
            settings = settings.set_override("ai.api_key", api_key)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - The completion endpoint and model are set
    /// - Temperatures are within the range providers accept (0.0 to 2.0)
    /// - The report window shows at least one summary
    ///
    /// A missing API key is not an error here: the server can still start, and
    /// every AI call will fail as upstream-unavailable until a key is provided.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.ai.base_url.trim().is_empty() {
            return Err(anyhow::anyhow!("AI base URL cannot be empty"));
        }

        if self.ai.model.trim().is_empty() {
            return Err(anyhow::anyhow!("AI model cannot be empty"));
        }

        for (name, value) in [
            ("analysis_temperature", self.ai.analysis_temperature),
            ("summary_temperature", self.ai.summary_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(anyhow::anyhow!(
                    "{} must be between 0.0 and 2.0, got {}",
                    name,
                    value
                ));
            }
        }

        if self.coaching.report_window == 0 {
            return Err(anyhow::anyhow!("Report window must be greater than 0"));
        }

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## Partial updates:
    /// Only the fields present in the JSON are changed, so
    /// `{"coaching": {"pitch_hint": "Listen first"}}` touches nothing else.
    /// `ai.api_key` and `ai.base_url` cannot be changed here.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = u16::try_from(port)
                    .map_err(|_| anyhow::anyhow!("Server port {} is out of range", port))?;
            }
        }

        if let Some(ai) = partial_config.get("ai") {
            if let Some(model) = ai.get("model").and_then(|v| v.as_str()) {
                self.ai.model = model.to_string();
            }
            if let Some(t) = ai.get("analysis_temperature").and_then(|v| v.as_f64()) {
                self.ai.analysis_temperature = t as f32;
            }
            if let Some(t) = ai.get("summary_temperature").and_then(|v| v.as_f64()) {
                self.ai.summary_temperature = t as f32;
            }
        }

        if let Some(coaching) = partial_config.get("coaching") {
            if let Some(plan) = coaching.get("ai_plan").and_then(|v| v.as_array()) {
                self.coaching.ai_plan = plan
                    .iter()
                    .filter_map(|tip| tip.as_str().map(str::to_string))
                    .collect();
            }
            if let Some(hint) = coaching.get("pitch_hint").and_then(|v| v.as_str()) {
                self.coaching.pitch_hint = hint.to_string();
            }
            if let Some(window) = coaching.get("report_window").and_then(|v| v.as_u64()) {
                self.coaching.report_window = window as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.ai.model, "llama-3.1-8b-instant");
        assert_eq!(config.coaching.ai_plan.len(), 3);
        assert_eq!(config.coaching.report_window, 3);
        assert!(!config.ai.has_api_key());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ai.model = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ai.summary_temperature = 2.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.coaching.report_window = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"server": {"port": 9090}, "coaching": {"pitch_hint": "Listen first"}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.coaching.pitch_hint, "Listen first");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.coaching.ai_plan.len(), 3);
    }

    #[test]
    fn test_config_update_rejects_invalid_values() {
        let mut config = AppConfig::default();
        assert!(config.update_from_json(r#"{"server": {"port": 70000}}"#).is_err());
        assert!(config
            .update_from_json(r#"{"coaching": {"report_window": 0}}"#)
            .is_err());
    }

    #[test]
    fn test_ai_settings_differ_after_temperature_change() {
        let active = AppConfig::default().ai;
        let mut updated = AppConfig::default();
        assert!(!updated.ai.differs_from(&active));

        updated
            .update_from_json(r#"{"ai": {"summary_temperature": 0.9}}"#)
            .unwrap();
        assert!(updated.ai.differs_from(&active));
    }

    #[test]
    fn test_config_update_ignores_api_key() {
        let mut config = AppConfig::default();
        config
            .update_from_json(r#"{"ai": {"api_key": "stolen", "model": "llama-3.1-70b-versatile"}}"#)
            .unwrap();
        assert_eq!(config.ai.api_key, "");
        assert_eq!(config.ai.model, "llama-3.1-70b-versatile");
    }
}

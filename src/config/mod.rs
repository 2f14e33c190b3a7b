//! Configuration management for the livewheel client
//!
//! Configuration is resolved in three layers:
//! - per-environment defaults (development, testing, production)
//! - an optional TOML file for the active environment
//! - `LIVEWHEEL_*` environment variable overrides
//!
//! The result is validated before use.

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    pub animation: AnimationConfig,
    pub settlement: SettlementConfig,
    pub feedback: FeedbackConfig,
    pub logging: LoggingConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub environment: Environment,
    /// How long a failed-request notice stays visible
    #[serde(with = "humantime_serde")]
    pub notice_ttl: Duration,
    /// Chat lines kept in memory
    pub chat_history: usize,
    /// Capacity of the outward event broadcast
    pub event_buffer: usize,
}

/// Game server endpoints and push channel behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// STOMP-over-websocket endpoint
    pub ws_url: String,
    /// Base URL of the REST API
    pub api_url: String,
    /// Bearer token; absent means browsing anonymously
    pub auth_token: Option<String>,
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub heartbeat: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Wheel and ball motion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Wheel counter-rotation in degrees per second
    pub wheel_speed: f64,
    /// Ball co-rotation in degrees per second
    pub ball_speed: f64,
    #[serde(with = "humantime_serde")]
    pub settle_duration: Duration,
    /// Pause between the wheel coming to rest and the result being revealed
    #[serde(with = "humantime_serde")]
    pub reveal_delay: Duration,
    pub outer_radius: f64,
    pub inner_radius: f64,
    pub wheel_extra_turns: u32,
    pub ball_extra_turns: u32,
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,
}

/// Provisional settlement timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Delay between the estimate and the win/lose feedback
    #[serde(with = "humantime_serde")]
    pub verdict_delay: Duration,
    /// Delay between the feedback and the authoritative balance refresh
    #[serde(with = "humantime_serde")]
    pub balance_refresh_delay: Duration,
}

/// Audio feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    pub enabled: bool,
    pub effects_volume: f64,
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "testing" | "test" => Environment::Testing,
            _ => Environment::Development,
        }
    }

    fn file_name(&self) -> &'static str {
        match self {
            Environment::Production => "production.toml",
            Environment::Testing => "testing.toml",
            Environment::Development => "development.toml",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::production_defaults()
    }
}

impl Config {
    /// Load configuration for the environment named by `LIVEWHEEL_ENV`
    pub fn load() -> Result<Self> {
        let environment =
            Environment::from_name(&env::var("LIVEWHEEL_ENV").unwrap_or_default());

        let base_path = env::var("LIVEWHEEL_CONFIG_PATH").unwrap_or_else(|_| "config".to_string());
        let path = PathBuf::from(base_path).join(environment.file_name());

        let mut config = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default_for_environment(environment)
        };

        config.override_from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Override configuration with environment variables
    fn override_from_env(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LIVEWHEEL_WS_URL") {
            self.server.ws_url = val;
        }

        if let Ok(val) = env::var("LIVEWHEEL_API_URL") {
            self.server.api_url = val;
        }

        if let Ok(val) = env::var("LIVEWHEEL_TOKEN") {
            self.server.auth_token = Some(val).filter(|t| !t.is_empty());
        }

        if let Ok(val) = env::var("LIVEWHEEL_RECONNECT_DELAY_MS") {
            let millis: u64 = val
                .parse()
                .map_err(|_| Error::Config("Invalid reconnect delay".to_string()))?;
            self.server.reconnect_delay = Duration::from_millis(millis);
        }

        if let Ok(val) = env::var("LIVEWHEEL_LOG_LEVEL") {
            self.logging.level = val;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.ws_url.is_empty() || self.server.api_url.is_empty() {
            return Err(Error::Config("Server URLs cannot be empty".to_string()));
        }

        url::Url::parse(&self.server.ws_url)?;
        url::Url::parse(&self.server.api_url)?;

        if self.server.reconnect_delay.is_zero() {
            return Err(Error::Config("Reconnect delay must be > 0".to_string()));
        }

        let anim = &self.animation;
        if anim.wheel_speed <= 0.0 || anim.ball_speed <= 0.0 {
            return Err(Error::Config("Wheel and ball speeds must be > 0".to_string()));
        }

        if anim.ball_speed <= anim.wheel_speed {
            return Err(Error::Config(
                "Ball speed must exceed wheel speed".to_string(),
            ));
        }

        if anim.settle_duration.is_zero() {
            return Err(Error::Config("Settle duration must be > 0".to_string()));
        }

        if anim.frame_interval.is_zero() {
            return Err(Error::Config("Frame interval must be > 0".to_string()));
        }

        if anim.inner_radius <= 0.0 || anim.inner_radius >= anim.outer_radius {
            return Err(Error::Config(
                "Inner radius must be positive and below the outer radius".to_string(),
            ));
        }

        if anim.wheel_extra_turns < 3 || anim.ball_extra_turns < 4 {
            return Err(Error::Config(
                "Settling needs at least 3 extra wheel turns and 4 extra ball turns".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.feedback.effects_volume) {
            return Err(Error::Config(
                "Effects volume must be between 0 and 1".to_string(),
            ));
        }

        if self.app.event_buffer == 0 {
            return Err(Error::Config("Event buffer must be > 0".to_string()));
        }

        Ok(())
    }

    /// Generate default configuration for an environment
    pub fn default_for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production_defaults(),
            Environment::Testing => Self::testing_defaults(),
            Environment::Development => Self::development_defaults(),
        }
    }

    fn production_defaults() -> Self {
        Config {
            app: AppConfig {
                name: "LiveWheel".to_string(),
                environment: Environment::Production,
                notice_ttl: Duration::from_secs(3),
                chat_history: 100,
                event_buffer: 256,
            },
            server: ServerConfig {
                ws_url: "wss://api.letmeclean.pl/ws/game/websocket".to_string(),
                api_url: "https://api.letmeclean.pl".to_string(),
                auth_token: None,
                reconnect_delay: Duration::from_secs(5),
                heartbeat: Duration::from_secs(4),
                request_timeout: Duration::from_secs(10),
            },
            animation: AnimationConfig {
                wheel_speed: 180.0,
                ball_speed: 320.0,
                settle_duration: Duration::from_secs(5),
                reveal_delay: Duration::from_secs(3),
                outer_radius: 140.0,
                inner_radius: 115.0,
                wheel_extra_turns: 3,
                ball_extra_turns: 4,
                frame_interval: Duration::from_micros(16_667),
            },
            settlement: SettlementConfig {
                verdict_delay: Duration::from_secs(8),
                balance_refresh_delay: Duration::from_secs(1),
            },
            feedback: FeedbackConfig {
                enabled: true,
                effects_volume: 0.6,
            },
            logging: LoggingConfig::default(),
        }
    }

    fn development_defaults() -> Self {
        let mut config = Self::production_defaults();
        config.app.environment = Environment::Development;
        config.server.ws_url = "ws://localhost:8080/ws/game/websocket".to_string();
        config.server.api_url = "http://localhost:8080".to_string();
        config.logging.level = "debug".to_string();
        config
    }

    fn testing_defaults() -> Self {
        let mut config = Self::development_defaults();
        config.app.environment = Environment::Testing;
        config.server.reconnect_delay = Duration::from_millis(50);
        config.settlement.verdict_delay = Duration::ZERO;
        config.settlement.balance_refresh_delay = Duration::ZERO;
        config.feedback.effects_volume = 1.0;
        config
    }
}

//! Configuration module for the incident backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.
//! Third-party API keys are optional: a missing key disables the matching
//! integration and surfaces as a `SERVICE_NOT_CONFIGURED` error at request time.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_MAPS_API_URL: &str = "https://maps.googleapis.com/maps/api";
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_ROUTE_CORRIDOR_METERS: f64 = 500.0;

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub maps: MapsConfig,
    pub gemini: GeminiConfig,
    /// Half-width of the corridor used to match incidents to a route
    pub route_corridor_meters: f64,
    pub voice_agent_id: Option<String>,
    pub emergency_phone_number: Option<String>,
}

/// Google Maps Platform settings (Places, Directions, Geocoding).
#[derive(Debug, Clone)]
pub struct MapsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Gemini generative AI settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub tts_model: String,
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset so `FOO=` in a .env file disables FOO.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bind_addr_raw = var("CIVIC_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "CIVIC_BIND_ADDR",
                value: bind_addr_raw.clone(),
                reason: e.to_string(),
            })?;

        let route_corridor_meters = match var("ROUTE_CORRIDOR_METERS") {
            Some(raw) => match raw.parse::<f64>() {
                Ok(meters) if meters.is_finite() && meters > 0.0 => meters,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        name: "ROUTE_CORRIDOR_METERS",
                        value: raw,
                        reason: "must be a positive number".to_string(),
                    })
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        name: "ROUTE_CORRIDOR_METERS",
                        value: raw,
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_ROUTE_CORRIDOR_METERS,
        };

        Ok(Self {
            api_psk: var("CIVIC_API_PSK"),
            db_path: var("CIVIC_DB_PATH")
                .unwrap_or_else(|| "./data/incidents.sqlite".to_string())
                .into(),
            bind_addr,
            log_level: var("CIVIC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            maps: MapsConfig {
                api_key: var("GOOGLE_MAPS_API_KEY"),
                base_url: var("GOOGLE_MAPS_API_URL")
                    .unwrap_or_else(|| DEFAULT_MAPS_API_URL.to_string()),
            },
            gemini: GeminiConfig {
                api_key: var("GEMINI_API_KEY"),
                base_url: var("GEMINI_API_URL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
                model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
                tts_model: var("GEMINI_TTS_MODEL")
                    .unwrap_or_else(|| DEFAULT_GEMINI_TTS_MODEL.to_string()),
            },
            route_corridor_meters,
            voice_agent_id: var("VOICE_AGENT_ID"),
            emergency_phone_number: var("EMERGENCY_PHONE_NUMBER"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/incidents.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(config.maps.api_key.is_none());
        assert_eq!(config.maps.base_url, DEFAULT_MAPS_API_URL);
        assert!(config.gemini.api_key.is_none());
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.route_corridor_meters, DEFAULT_ROUTE_CORRIDOR_METERS);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("CIVIC_BIND_ADDR", "0.0.0.0:9000"),
            ("GOOGLE_MAPS_API_KEY", "maps-key"),
            ("GEMINI_API_KEY", "gemini-key"),
            ("GEMINI_MODEL", "gemini-custom"),
            ("ROUTE_CORRIDOR_METERS", "250"),
            ("EMERGENCY_PHONE_NUMBER", "+15550100"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.maps.api_key.as_deref(), Some("maps-key"));
        assert_eq!(config.gemini.api_key.as_deref(), Some("gemini-key"));
        assert_eq!(config.gemini.model, "gemini-custom");
        assert_eq!(config.route_corridor_meters, 250.0);
        assert_eq!(config.emergency_phone_number.as_deref(), Some("+15550100"));
    }

    #[test]
    fn test_blank_key_is_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "  ")]).unwrap();
        assert!(config.gemini.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(config_from(&[("CIVIC_BIND_ADDR", "not-an-addr")]).is_err());
        assert!(config_from(&[("ROUTE_CORRIDOR_METERS", "-5")]).is_err());
        assert!(config_from(&[("ROUTE_CORRIDOR_METERS", "wide")]).is_err());
    }
}

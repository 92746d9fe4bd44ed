use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::rate_limit::RateRule;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_RATE_LIMITS: &str = "10/minute,50/hour,200/day";
pub const DEFAULT_STATUS_RATE_LIMITS: &str = "5/minute";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub development: bool,
    pub rate_limits: Vec<RateRule>,
    pub status_rate_limits: Vec<RateRule>,
    /// Honour `X-Forwarded-For` for rate limiting (only behind a trusted proxy)
    pub trust_proxy: bool,
    pub request_timeout: Duration,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            gemini_api_key: String::new(),
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            development: false,
            rate_limits: RateRule::parse_list(DEFAULT_RATE_LIMITS).unwrap_or_default(),
            status_rate_limits: RateRule::parse_list(DEFAULT_STATUS_RATE_LIMITS).unwrap_or_default(),
            trust_proxy: false,
            request_timeout: Duration::from_secs(90),
            static_dir: PathBuf::from("static"),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gemini_api_key = lookup("GEMINI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not set".to_string()))?;

        let gemini_model = lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let gemini_base_url = lookup("GEMINI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "5000".to_string());
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::Config(format!("Invalid host address: {}", e)))?;

        let development = lookup("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        let rate_limits = lookup("RATE_LIMITS").unwrap_or_else(|| DEFAULT_RATE_LIMITS.to_string());
        let rate_limits = RateRule::parse_list(&rate_limits)?;
        let status_rate_limits = lookup("STATUS_RATE_LIMITS")
            .unwrap_or_else(|| DEFAULT_STATUS_RATE_LIMITS.to_string());
        let status_rate_limits = RateRule::parse_list(&status_rate_limits)?;
        let trust_proxy = lookup("TRUST_PROXY").map(|v| parse_flag(&v)).unwrap_or(false);

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| AppError::Config(format!("Invalid REQUEST_TIMEOUT_SECS: {}", e)))?,
            None => Duration::from_secs(90),
        };

        let static_dir = lookup("STATIC_DIR").unwrap_or_else(|| "static".to_string());

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            development,
            rate_limits,
            status_rate_limits,
            trust_proxy,
            request_timeout,
            static_dir: PathBuf::from(static_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn default_limits_match_the_public_analysis_policy() {
        let config = Config::default();
        let labels: Vec<String> = config.rate_limits.iter().map(|r| r.to_string()).collect();
        assert_eq!(labels, vec!["10/minute", "50/hour", "200/day"]);
        assert_eq!(config.status_rate_limits[0].to_string(), "5/minute");
        assert!(!config.trust_proxy);
        assert_eq!(config.server_addr.port(), 5000);
    }

    #[test]
    fn missing_api_key_names_the_variable() {
        for pairs in [&[][..], &[("GEMINI_API_KEY", "   ")][..]] {
            match Config::from_lookup(lookup_from(pairs)) {
                Err(AppError::Config(msg)) => assert!(msg.contains("GEMINI_API_KEY"), "{}", msg),
                other => panic!("expected config error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("GEMINI_BASE_URL", "http://127.0.0.1:9000/"),
            ("PORT", "8081"),
            ("RATE_LIMITS", ""),
            ("TRUST_PROXY", "true"),
            ("REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.gemini_api_key, "secret");
        assert_eq!(config.gemini_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.server_addr.port(), 8081);
        assert!(config.rate_limits.is_empty());
        assert!(config.trust_proxy);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_invalid_port() {
        let result = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "k"), ("PORT", "http")]));
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("port")));
    }
}

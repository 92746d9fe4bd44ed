pub mod analyzer;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod rate_limit;
pub mod render;
pub mod scraper;

use std::sync::Arc;

use cache::AnalysisCache;
use config::Config;
use error::{AppError, Result};
use llm::{AnalysisClient, GeminiClient};
use rate_limit::RateLimiter;
use scraper::{ContentExtractor, WebExtractor};

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<AnalysisCache>,
    pub extractor: Arc<dyn ContentExtractor>,
    pub analyzer: Arc<dyn AnalysisClient>,
    pub rate_limiter: Arc<RateLimiter>,
    pub status_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Wires the real web extractor and Gemini client.
    pub fn new(config: Config) -> Result<Self> {
        let extractor = WebExtractor::new()
            .map_err(|e| AppError::Config(format!("HTTP client: {}", e)))?;
        let analyzer = GeminiClient::new(
            &config.gemini_api_key,
            &config.gemini_model,
            &config.gemini_base_url,
        )
        .map_err(|e| AppError::Config(format!("Gemini client: {}", e)))?;

        Ok(Self::with_components(
            config,
            Arc::new(extractor),
            Arc::new(analyzer),
        ))
    }

    pub fn with_components(
        config: Config,
        extractor: Arc<dyn ContentExtractor>,
        analyzer: Arc<dyn AnalysisClient>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limits.clone());
        let status_limiter = RateLimiter::new(config.status_rate_limits.clone());
        Self {
            config: Arc::new(config),
            cache: Arc::new(AnalysisCache::new()),
            extractor,
            analyzer,
            rate_limiter: Arc::new(rate_limiter),
            status_limiter: Arc::new(status_limiter),
        }
    }
}

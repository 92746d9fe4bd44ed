//! The analysis pipeline behind `POST /analyze`.
//!
//! Each stage returns a `Result`, so a failure short-circuits straight to the
//! error response:
//!
//! ```text
//! validate ─► resolve text (extract URL?) ─► length gate ─► cache ─► generate ─► respond
//! ```

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::api::models::{AnalyzeRequest, AnalyzeResponse, ResponseFormat};
use crate::cache::cache_key;
use crate::error::{AppError, Result};
use crate::prompt::{build_prompt, source_label};
use crate::render::render_html;
use crate::scraper::is_http_url;
use crate::AppState;

pub const MIN_TEXT_CHARS: usize = 50;
pub const MAX_TEXT_CHARS: usize = 10_000;

pub const MSG_INVALID_BODY: &str = "Μη έγκυρα δεδομένα";
pub const MSG_MISSING_INPUT: &str = "Παρακαλώ εισάγετε κείμενο ή URL";
pub const MSG_INVALID_URL: &str = "Μη έγκυρη διεύθυνση URL";
pub const MSG_TOO_SHORT: &str =
    "Το κείμενο είναι πολύ σύντομο για ανάλυση (ελάχιστο 50 χαρακτήρες)";
pub const MSG_TOO_LARGE: &str = "Το κείμενο είναι πολύ μεγάλο (μέγιστο 10,000 χαρακτήρες)";

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Text(String),
    Url(String),
}

#[derive(Debug)]
pub struct ValidatedRequest {
    pub input: Input,
    pub source: String,
    pub format: ResponseFormat,
}

fn trimmed(field: &Option<String>) -> String {
    field.as_deref().map(str::trim).unwrap_or_default().to_string()
}

/// Trims the fields and decides what drives the analysis. Text wins over URL.
pub fn validate(req: &AnalyzeRequest) -> Result<ValidatedRequest> {
    let text = trimmed(&req.text);
    let url = trimmed(&req.url);
    let source = trimmed(&req.source);

    let input = if !text.is_empty() {
        Input::Text(text)
    } else if url.is_empty() {
        return Err(AppError::BadRequest(MSG_MISSING_INPUT.to_string()));
    } else if !is_http_url(&url) {
        return Err(AppError::BadRequest(MSG_INVALID_URL.to_string()));
    } else {
        Input::Url(url)
    };

    Ok(ValidatedRequest {
        input,
        source,
        format: req.format.unwrap_or_default(),
    })
}

/// Returns the text length in characters, or the matching rejection.
pub fn check_length(text: &str) -> Result<usize> {
    let len = text.chars().count();
    if len < MIN_TEXT_CHARS {
        return Err(AppError::BadRequest(MSG_TOO_SHORT.to_string()));
    }
    if len > MAX_TEXT_CHARS {
        return Err(AppError::BadRequest(MSG_TOO_LARGE.to_string()));
    }
    Ok(len)
}

async fn resolve_text(state: &AppState, input: Input) -> Result<String> {
    match input {
        Input::Text(text) => Ok(text),
        Input::Url(url) => {
            info!(url = %url, "Extracting article text");
            state.extractor.extract(&url).await.map_err(|err| {
                warn!(url = %url, "Extraction failed: {}", err);
                AppError::from(err)
            })
        }
    }
}

pub async fn analyze(state: &AppState, req: &AnalyzeRequest) -> Result<AnalyzeResponse> {
    let validated = validate(req)?;
    let text = resolve_text(state, validated.input).await?;
    let text_length = check_length(&text)?;
    let source = validated.source;

    // Fingerprint covers a 1000-char prefix, the prompt a 2000-char one.
    let key = cache_key(&text, &source);
    let analysis = match state.cache.get(&key) {
        Some(cached) => {
            debug!(key = %key, "Cache hit");
            cached
        }
        None => {
            debug!(key = %key, "Cache miss");
            let prompt = build_prompt(&text, &source);

            let llm_start = Instant::now();
            let analysis = state.analyzer.analyze(&prompt).await?;
            info!(
                text_length,
                source = %source_label(&source),
                "Generation call completed in {:?}",
                llm_start.elapsed()
            );

            state.cache.put(key, analysis.clone());
            analysis
        }
    };

    let analysis = match validated.format {
        ResponseFormat::Text => analysis,
        ResponseFormat::Html => render_html(&analysis),
    };

    Ok(AnalyzeResponse {
        analysis,
        text_length,
        source: source_label(&source).to_string(),
        success: true,
    })
}

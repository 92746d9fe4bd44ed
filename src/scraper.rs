use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{header, redirect, Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

pub const MIN_EXTRACTED_CHARS: usize = 100;
pub const MAX_EXTRACTED_CHARS: usize = 3000;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "el-GR,el;q=0.9,en;q=0.8";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Μη έγκυρη διεύθυνση URL: {0}")]
    InvalidUrl(String),

    #[error("Σφάλμα εξαγωγής κειμένου: {0}")]
    Fetch(String),

    #[error("Σφάλμα εξαγωγής κειμένου: η σελίδα απάντησε με κωδικό {0}")]
    Status(u16),

    #[error("Σφάλμα εξαγωγής κειμένου: ανεπαρκές περιεχόμενο ({0} χαρακτήρες)")]
    InsufficientContent(usize),
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Fetch(err.to_string())
    }
}

/// Turns a URL into the plain text of the page's main content.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, ExtractError>;
}

// Elements that never carry article text
static NOISE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "script, style, noscript, nav, footer, header, aside, iframe, form, \
         .ad, .ads, .advertisement, .banner, .cookie-banner",
    )
    .expect("Failed to parse noise selector")
});

// Candidate content regions, most specific first
static CONTENT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "main",
        "article",
        "[role=\"main\"]",
        ".article-content",
        ".article-body",
        ".post-content",
        ".entry-content",
        "div.content",
        "#content",
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Failed to parse content selector"))
    .collect()
});

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

pub fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub struct WebExtractor {
    client: Client,
}

impl WebExtractor {
    pub fn new() -> Result<Self, ExtractError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static(ACCEPT_LANGUAGE),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );

        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .redirect(redirect::Policy::limited(10))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client })
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ExtractError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ContentExtractor for WebExtractor {
    async fn extract(&self, url: &str) -> Result<String, ExtractError> {
        if !is_http_url(url) {
            return Err(ExtractError::InvalidUrl(url.to_string()));
        }

        let fetch_start = std::time::Instant::now();
        let html = self.fetch_html(url).await?;
        debug!(url, bytes = html.len(), "Fetched page in {:?}", fetch_start.elapsed());

        let text = extract_main_text(&html)?;
        info!(url, chars = text.chars().count(), "Extracted article text");
        Ok(text)
    }
}

/// Strips page chrome, picks the main content region and returns its text,
/// whitespace-collapsed and capped at `MAX_EXTRACTED_CHARS`.
pub fn extract_main_text(html: &str) -> Result<String, ExtractError> {
    let mut document = Html::parse_document(html);

    let noise: Vec<_> = document.select(&NOISE_SELECTOR).map(|el| el.id()).collect();
    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let region = CONTENT_SELECTORS
        .iter()
        .find_map(|selector| document.select(selector).next())
        .or_else(|| document.select(&BODY_SELECTOR).next());

    let raw = match region {
        Some(element) => element_text(element),
        None => element_text(document.root_element()),
    };

    let text = collapse_whitespace(&raw);
    let len = text.chars().count();
    if len < MIN_EXTRACTED_CHARS {
        return Err(ExtractError::InsufficientContent(len));
    }

    Ok(truncate_chars(&text, MAX_EXTRACTED_CHARS).to_string())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Character-safe prefix of at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

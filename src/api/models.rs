use serde::{Deserialize, Serialize};

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Html,
}

#[derive(Deserialize, Debug, Default)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub format: Option<ResponseFormat>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct AnalyzeResponse {
    pub analysis: String,
    pub text_length: usize,
    pub source: String,
    pub success: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub status: &'static str,
    pub limits: Vec<String>,
    pub message: &'static str,
}

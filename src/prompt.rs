use once_cell::sync::Lazy;

use crate::scraper::truncate_chars;

pub const PROMPT_TEXT_CHARS: usize = 2000;
pub const UNKNOWN_SOURCE: &str = "Άγνωστη";

const TEMPLATE: &str = include_str!("prompts/analysis_el.txt");

// Template split around its two placeholders, so user text is never re-scanned
static TEMPLATE_PARTS: Lazy<(&'static str, &'static str, &'static str)> = Lazy::new(|| {
    let (head, rest) = TEMPLATE
        .split_once("{text}")
        .expect("Prompt template is missing {text}");
    let (middle, tail) = rest
        .split_once("{source}")
        .expect("Prompt template is missing {source}");
    (head, middle, tail)
});

pub fn source_label(source: &str) -> &str {
    if source.trim().is_empty() {
        UNKNOWN_SOURCE
    } else {
        source
    }
}

pub fn build_prompt(text: &str, source: &str) -> String {
    let (head, middle, tail) = *TEMPLATE_PARTS;
    let text = truncate_chars(text, PROMPT_TEXT_CHARS);
    let source = source_label(source);

    let mut result = String::with_capacity(TEMPLATE.len() + text.len() + source.len());
    result.push_str(head);
    result.push_str(text);
    result.push_str(middle);
    result.push_str(source);
    result.push_str(tail);
    result
}

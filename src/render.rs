//! HTML rendering of the model's Markdown analysis.

use pulldown_cmark::{html, Options, Parser};

/// Renders Markdown to HTML and sanitises the result, since the text comes
/// from the generation service and ends up in the page via `innerHTML`.
pub fn render_html(analysis: &str) -> String {
    let parser = Parser::new_ext(
        analysis.trim(),
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES,
    );

    let mut rendered = String::with_capacity(analysis.len() * 3 / 2);
    html::push_html(&mut rendered, parser);

    ammonia::clean(&rendered)
}

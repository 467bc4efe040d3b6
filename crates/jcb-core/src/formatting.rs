//! Formatting utilities (HTML escaping, truncation, Markdown → Circuit HTML).

use pulldown_cmark::{html, Event, Parser};

/// Escape HTML special characters for Circuit rich text.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Keep the first `max_chars` characters, appending `...` when anything was cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let mut out: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

/// Render an issue description (Markdown) to HTML.
///
/// Raw HTML in the description is escaped rather than passed through.
pub fn markdown_to_html(markdown: &str) -> String {
    let events = Parser::new(markdown).map(|ev| match ev {
        Event::Html(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, events);
    out.trim_end().to_string()
}

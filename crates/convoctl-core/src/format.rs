//! Message body formatting.
//!
//! Maps raw message text plus a format mode to the body handed to the
//! daemon. Pure functions, no I/O.

use pulldown_cmark::{Options, Parser, html};

/// How a message body is rendered before sending.
///
/// When several format flags are set at once the effective mode is decided
/// by a fixed priority: CODE > MARKDOWN > HTML > EMOJI > TEXT. The flags are
/// mutually exclusive in well-formed input; the total order keeps the
/// outcome deterministic when they are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Text,
    /// Wrap the text in a fenced code block.
    Code,
    /// Convert Markdown to HTML.
    Markdown,
    /// Pass through unchanged. Placeholder for a richer transform later.
    Html,
    /// Expand `:shortcode:` emoji tokens.
    Emoji,
}

impl FormatMode {
    /// Resolve the effective mode from the four CLI format flags.
    pub fn from_flags(code: bool, markdown: bool, hypertext: bool, emojize: bool) -> Self {
        if code {
            FormatMode::Code
        } else if markdown {
            FormatMode::Markdown
        } else if hypertext {
            FormatMode::Html
        } else if emojize {
            FormatMode::Emoji
        } else {
            FormatMode::Text
        }
    }
}

/// Render `text` according to `mode`.
pub fn format(text: &str, mode: FormatMode) -> String {
    match mode {
        FormatMode::Text | FormatMode::Html => text.to_string(),
        FormatMode::Code => format!("```\n{text}\n```"),
        FormatMode::Markdown => markdown_to_html(text),
        FormatMode::Emoji => expand_shortcodes(text),
    }
}

fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::all());
    let mut out = String::with_capacity(text.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Replace every `:name:` token with its emoji when `name` is a known
/// shortcode. Unknown or malformed tokens are left untouched.
fn expand_shortcodes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(':') {
            Some(end) => {
                let name = &after[..end];
                let plausible = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'));
                if plausible {
                    if let Some(emoji) = emojis::get_by_shortcode(name) {
                        out.push_str(emoji.as_str());
                        rest = &after[end + 1..];
                        continue;
                    }
                }
                // Not a shortcode; keep the opening colon and rescan from
                // the closing one, which may open a real token.
                out.push(':');
                rest = after;
            }
            None => {
                out.push(':');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

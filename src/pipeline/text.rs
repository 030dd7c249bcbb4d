//! Text heuristics for degenerate provider output.
//!
//! These are approximate content hacks, not principled algorithms. Changing
//! them changes pipeline semantics.

/// True when the text is empty after trimming.
#[must_use]
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Reverse the order of lines. Used as the mutation stand-in when a backend
/// returns nothing.
#[must_use]
pub fn reverse_lines(text: &str) -> String {
    text.split('\n').rev().collect::<Vec<_>>().join("\n")
}

/// Remove a wrapping Markdown code fence (```` ```lang ... ``` ````).
///
/// Text that is not fully wrapped is returned unchanged, leading indentation
/// included.
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|after_open| after_open.strip_suffix("```"))
    else {
        return text.to_string();
    };

    // Drop the info string (language tag) on the opening line.
    let body = match body.find('\n') {
        Some(newline) if !body[..newline].contains(char::is_whitespace) => &body[newline + 1..],
        _ => body,
    };

    body.trim_matches('\n').to_string()
}

/// Best-effort isolation of a JSON object inside model chatter.
#[must_use]
pub fn extract_json_object(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

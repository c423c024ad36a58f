//! Deterministic vehicle description rewriting
//!
//! No model is called. Preview mode shows the prompt that would be sent;
//! otherwise the description is normalized and capped locally.

/// Header prefixed to every prompt and rewrite
pub const HEADER: &str = "Vehicle Description:";

/// Word cap for rewritten text
pub const MAX_WORDS: usize = 120;

/// Prompt shown in preview mode
pub fn build_prompt(description: &str) -> String {
    format!("{HEADER}\nDescription:\n{description}")
}

/// Normalized description with the header prefix
pub fn rewrite_description(description: &str) -> String {
    format!("{HEADER} {}", clean(description))
}

/// Collapse whitespace, cap at [`MAX_WORDS`], capitalize sentences and
/// ensure terminal punctuation.
pub fn clean(description: &str) -> String {
    let words: Vec<&str> = description.split_whitespace().collect();

    let mut text = if words.len() > MAX_WORDS {
        format!("{}...", words[..MAX_WORDS].join(" "))
    } else {
        words.join(" ")
    };

    text = capitalize_sentences(&text);

    if !text.is_empty() && !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

fn capitalize_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut sentence_start = true;

    for c in text.chars() {
        if sentence_start && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            sentence_start = false;
            continue;
        }
        if matches!(c, '.' | '!' | '?') {
            sentence_start = true;
        } else if !c.is_whitespace() && sentence_start && c.is_alphanumeric() {
            // Sentences opening with a number keep it as is
            sentence_start = false;
        }
        out.push(c);
    }
    out
}

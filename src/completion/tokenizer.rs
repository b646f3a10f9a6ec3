//! Extraction of the token under the cursor
//!
//! The input buffer is split into runs of non-delimiter characters. The run
//! whose `[start, end]` span (inclusive on both sides, in chars) contains the
//! cursor is the current token; a cursor sitting right after a token still
//! selects it, so typing at the end of `sin` yields `sin`.
//!
//! `*` is a delimiter on its own, so `**` never forms a token and produces no
//! empty token either. `^` is a delimiter as well, which makes `x^2` and
//! `x**2` split the same way.

/// A token and its char span in the input buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Check if a character separates tokens
pub fn is_delimiter(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '^' | '(' | ')' | ',' | '=') || c.is_whitespace()
}

/// Split `text` into tokens at delimiter boundaries
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (i, c) in text.chars().enumerate() {
        if is_delimiter(c) {
            if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    start,
                    end: i,
                });
            }
        } else {
            if current.is_empty() {
                start = i;
            }
            current.push(c);
        }
    }

    if !current.is_empty() {
        let end = text.chars().count();
        tokens.push(Token { text: current, start, end });
    }

    tokens
}

/// Return the token surrounding `cursor` (defaults to the end of `text`)
///
/// Falls back to the last token when the cursor sits inside a delimiter run,
/// and to the trimmed input when there are no tokens at all.
pub fn current_token(text: &str, cursor: Option<usize>) -> String {
    if text.is_empty() {
        return String::new();
    }

    let cursor = cursor.unwrap_or_else(|| text.chars().count());
    let tokens = tokenize(text);

    if let Some(token) = tokens.iter().find(|t| t.start <= cursor && cursor <= t.end) {
        return token.text.clone();
    }

    match tokens.last() {
        Some(token) => token.text.clone(),
        None => text.trim().to_string(),
    }
}

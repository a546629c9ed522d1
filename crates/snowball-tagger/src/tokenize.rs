//! Word and sentence tokenization

use std::sync::OnceLock;

use regex::Regex;

use crate::{Result, TaggerError};

const WORD_PATTERN: &str = r"\w+(?:['’.\-]\w+)*|[^\w\s]";

/// Punctuation tokens that close a sentence
const SENTENCE_END: [&str; 3] = [".", "!", "?"];

fn word_regex() -> Result<&'static Regex> {
    static RGX: OnceLock<Regex> = OnceLock::new();
    if let Some(rgx) = RGX.get() {
        return Ok(rgx);
    }
    let rgx = Regex::new(WORD_PATTERN).map_err(|e| TaggerError::InvalidRule(e.to_string()))?;
    Ok(RGX.get_or_init(|| rgx))
}

/// Split text into word and punctuation tokens
pub fn words(text: &str) -> Result<Vec<String>> {
    Ok(word_regex()?
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect())
}

/// Split text into sentences of tokens.
///
/// A sentence ends after `.`, `!` or `?`, and at every blank line.
pub fn sentences(text: &str) -> Result<Vec<Vec<String>>> {
    let mut out = Vec::new();

    for paragraph in text.split("\n\n") {
        let mut current = Vec::new();
        for token in words(paragraph)? {
            let ends = SENTENCE_END.contains(&token.as_str());
            current.push(token);
            if ends {
                out.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    Ok(out)
}

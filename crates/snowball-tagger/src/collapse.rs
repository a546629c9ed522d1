//! Entity span collapsing
//!
//! Merges runs of tokens sharing the same entity label into one token,
//! joined by `_`, and wraps it in `<TAG>...</TAG>` in the tagged sequence.

use snowball_core::tag_token;

use crate::{Result, TaggedSentence, TaggerError};

/// Label for tokens outside any entity
pub const OUTSIDE: &str = "O";

/// Collapse labelled tokens into aligned surface and tagged sequences.
///
/// A span ends when the label changes or the sentence ends.
pub fn collapse<T, L>(tokens: &[T], labels: &[L]) -> Result<TaggedSentence>
where
    T: AsRef<str>,
    L: AsRef<str>,
{
    if tokens.len() != labels.len() {
        return Err(TaggerError::LengthMismatch {
            tokens: tokens.len(),
            labels: labels.len(),
        });
    }

    let mut out = TaggedSentence::default();
    let mut span: Option<(&str, String)> = None;

    for (token, label) in tokens.iter().zip(labels) {
        let (token, label) = (token.as_ref(), label.as_ref());

        match span.as_mut() {
            Some((current, text)) if *current == label => {
                text.push('_');
                text.push_str(token);
                continue;
            }
            _ => {}
        }

        if let Some((tag, text)) = span.take() {
            push_entity(&mut out, tag, text);
        }

        if label == OUTSIDE {
            out.tokens.push(token.to_string());
            out.tagged_tokens.push(token.to_string());
        } else {
            span = Some((label, token.to_string()));
        }
    }

    if let Some((tag, text)) = span {
        push_entity(&mut out, tag, text);
    }

    Ok(out)
}

fn push_entity(out: &mut TaggedSentence, tag: &str, text: String) {
    out.tagged_tokens.push(tag_token(tag, &text));
    out.tokens.push(text);
}

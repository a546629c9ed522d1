//! Gazetteer tagger
//!
//! Labels entities by dictionary lookup (longest phrase first) and falls
//! back to per-token regex rules. Dictionary format, one entry per line:
//! `TAG<TAB>phrase`, `#` starts a comment.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::collapse::{collapse, OUTSIDE};
use crate::tokenize;
use crate::{EntityTagger, Result, TaggedSentence, TaggerError};

/// Rule-based tagger using a phrase dictionary and regex rules
pub struct GazetteerTagger {
    /// Lowercased phrase words -> tag
    phrases: HashMap<Vec<String>, String>,
    /// Longest phrase in words
    max_len: usize,
    /// Token rules (regex -> tag)
    rules: Vec<(Regex, String)>,
}

impl GazetteerTagger {
    /// Create an empty tagger
    pub fn new() -> Self {
        Self {
            phrases: HashMap::new(),
            max_len: 0,
            rules: Vec::new(),
        }
    }

    /// Load a gazetteer file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| TaggerError::IoError {
            path: path.to_path_buf(),
            source,
        })?;
        let tagger = Self::parse(&content)?;
        debug!(
            "Loaded {} gazetteer phrases from {}",
            tagger.len(),
            path.display()
        );
        Ok(tagger)
    }

    /// Parse gazetteer text
    pub fn parse(content: &str) -> Result<Self> {
        let mut tagger = Self::new();

        for (n, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let invalid = |reason: &str| TaggerError::InvalidGazetteer {
                line: n + 1,
                reason: reason.to_string(),
            };

            let (tag, phrase) = line
                .split_once('\t')
                .ok_or_else(|| invalid("expected `TAG<TAB>phrase`"))?;
            let tag = tag.trim();
            if tag.is_empty() || tag == OUTSIDE {
                return Err(invalid("missing or reserved tag"));
            }
            if !tagger.add_phrase(phrase, tag)? {
                return Err(invalid("empty phrase"));
            }
        }

        Ok(tagger)
    }

    /// Add a dictionary phrase; returns `false` when it has no words
    pub fn add_phrase(&mut self, phrase: &str, tag: &str) -> Result<bool> {
        let words: Vec<String> = tokenize::words(phrase)?
            .into_iter()
            .map(|w| w.to_lowercase())
            .collect();
        if words.is_empty() {
            return Ok(false);
        }

        self.max_len = self.max_len.max(words.len());
        self.phrases.insert(words, tag.to_string());
        Ok(true)
    }

    /// Add a regex rule matched against whole tokens not covered by the
    /// dictionary
    pub fn with_rule(mut self, pattern: &str, tag: &str) -> Result<Self> {
        let anchored = format!("^(?:{pattern})$");
        let regex = Regex::new(&anchored).map_err(|e| TaggerError::InvalidRule(e.to_string()))?;
        self.rules.push((regex, tag.to_string()));
        Ok(self)
    }

    /// Number of dictionary phrases
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.rules.is_empty()
    }

    /// One label per token, `O` outside entities
    pub fn label(&self, tokens: &[String]) -> Vec<String> {
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let mut labels = vec![OUTSIDE.to_string(); tokens.len()];

        let mut i = 0;
        while i < tokens.len() {
            match self.longest_phrase(&lowered[i..]) {
                Some((len, tag)) => {
                    labels[i..i + len].fill(tag.to_string());
                    i += len;
                }
                None => {
                    let rule = self.rules.iter().find(|(r, _)| r.is_match(&tokens[i]));
                    if let Some((_, tag)) = rule {
                        labels[i] = tag.clone();
                    }
                    i += 1;
                }
            }
        }

        labels
    }

    fn longest_phrase(&self, window: &[String]) -> Option<(usize, &str)> {
        let longest = self.max_len.min(window.len());
        (1..=longest)
            .rev()
            .find_map(|len| self.phrases.get(&window[..len]).map(|tag| (len, tag.as_str())))
    }
}

impl Default for GazetteerTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTagger for GazetteerTagger {
    fn tag(&self, text: &str) -> Result<Vec<TaggedSentence>> {
        tokenize::sentences(text)?
            .into_iter()
            .map(|tokens| {
                let labels = self.label(&tokens);
                collapse(&tokens, &labels)
            })
            .collect()
    }

    fn name(&self) -> &str {
        "gazetteer"
    }
}

//! # Content moderation
//!
//! A light filter aimed at slurs, explicit sexual content, self-harm
//! incitement and scam boilerplate. News vocabulary (violence, drugs,
//! politics) is deliberately absent from the default lexicon.
//!
//! The lexicon is data: the embedded `lexicon/default.json` or any JSON file
//! with the same shape. A built filter is immutable and can be shared
//! across request tasks behind an `Arc`.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_LEXICON: &str = include_str!("../lexicon/default.json");

/// Characters treated as word separators in addition to whitespace.
const SEPARATORS: &[char] = &[
    '.', ',', '!', '?', ';', ':', '\'', '"', '(', ')', '[', ']', '{', '}', '/', '\\', '|', '-',
    '_',
];

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed lexicon: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw term and pattern lists as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Lexicon {
    #[serde(default)]
    pub terms: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Lexicon {
    pub fn embedded() -> Result<Self, LexiconError> {
        Ok(serde_json::from_str(DEFAULT_LEXICON)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LexiconError> {
        let raw = std::fs::read_to_string(path).map_err(|source| LexiconError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Which submitted field tripped the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Content,
    Url,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "Title",
            Field::Content => "Content",
            Field::Url => "URL",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { field: Field, matched: String },
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Human-readable reason, `None` when accepted.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected { field, matched } => {
                Some(format!("{field} contains prohibited content: {matched}"))
            }
        }
    }
}

pub struct ModerationFilter {
    terms: HashSet<String>,
    phrases: Vec<String>,
    patterns: Vec<Regex>,
}

impl ModerationFilter {
    pub fn new(lexicon: Lexicon) -> Self {
        let mut terms = HashSet::new();
        let mut phrases = Vec::new();
        for term in lexicon.terms {
            let term = term.trim().to_lowercase();
            if term.is_empty() {
                continue;
            }
            if term.contains(char::is_whitespace) {
                phrases.push(term);
            } else {
                terms.insert(term);
            }
        }

        let patterns = lexicon
            .patterns
            .iter()
            .filter_map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| tracing::warn!(pattern = %p, error = %e, "skipping invalid moderation pattern"))
                    .ok()
            })
            .collect();

        Self {
            terms,
            phrases,
            patterns,
        }
    }

    /// Filter over the embedded default lexicon.
    pub fn with_default_lexicon() -> Result<Self, LexiconError> {
        Ok(Self::new(Lexicon::embedded()?))
    }

    /// Returns the first prohibited match in `text`, if any.
    pub fn find_violation(&self, text: &str) -> Option<String> {
        if text.is_empty() {
            return None;
        }
        let lower = text.to_lowercase();

        if let Some(word) = tokenize(&lower).find(|w| self.terms.contains(*w)) {
            return Some(word.to_string());
        }

        if let Some(phrase) = self.phrases.iter().find(|p| lower.contains(p.as_str())) {
            return Some(phrase.clone());
        }

        self.patterns
            .iter()
            .find_map(|re| re.find(&lower).map(|m| m.as_str().to_string()))
    }

    /// Checks title, content and url in that order; the first failing field wins.
    pub fn validate(&self, title: &str, content: &str, url: &str) -> Verdict {
        for (field, text) in [
            (Field::Title, title),
            (Field::Content, content),
            (Field::Url, url),
        ] {
            if let Some(matched) = self.find_violation(text) {
                return Verdict::Rejected { field, matched };
            }
        }
        Verdict::Accepted
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .filter(|w| !w.is_empty())
}

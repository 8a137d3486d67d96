//! Legal compliance - prohibited-term screening.
//!
//! Terms match case-insensitively on whole words, with the same boundary rule
//! as a regex `\b`: a boundary sits between a word character (alphanumeric or
//! `_`) and anything else.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ComplianceResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory.
    #[default]
    Warning,
    /// Disqualifying.
    Blocking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Blocking => f.write_str("blocking"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegalConfig {
    #[serde(default)]
    pub prohibited_words: Vec<String>,
    #[serde(default)]
    pub severity_levels: HashMap<String, Severity>,
}

/// One prohibited term found in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalFinding {
    pub term: String,
    pub severity: Severity,
}

impl LegalFinding {
    pub fn message(&self) -> String {
        format!("Prohibited word '{}' found (severity: {})", self.term, self.severity)
    }
}

impl LegalConfig {
    pub fn new<I, S>(prohibited_words: I, severity_levels: HashMap<String, Severity>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prohibited_words: prohibited_words.into_iter().map(Into::into).collect(),
            severity_levels,
        }
    }

    /// Exact key first, then a case-insensitive key; unmapped terms warn.
    pub fn severity_of(&self, term: &str) -> Severity {
        self.severity_levels.get(term).copied().unwrap_or_else(|| {
            self.severity_levels
                .iter()
                .find(|(k, _)| k.to_lowercase() == term.to_lowercase())
                .map(|(_, s)| *s)
                .unwrap_or_default()
        })
    }

    /// Findings in configured term order.
    pub fn scan(&self, text: &str) -> Vec<LegalFinding> {
        let haystack = text.to_lowercase();
        self.prohibited_words
            .iter()
            .filter(|term| !term.trim().is_empty())
            .filter(|term| contains_whole_word(&haystack, &term.to_lowercase()))
            .map(|term| LegalFinding { term: term.clone(), severity: self.severity_of(term) })
            .collect()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_boundary(s: &str, idx: usize) -> bool {
    let before = s[..idx].chars().next_back().is_some_and(is_word_char);
    let after = s[idx..].chars().next().is_some_and(is_word_char);
    before != after
}

fn contains_whole_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(offset) = haystack[start..].find(needle) {
        let idx = start + offset;
        if is_boundary(haystack, idx) && is_boundary(haystack, idx + needle.len()) {
            return true;
        }
        // Advance one character so overlapping candidates are still tried
        start = idx + haystack[idx..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Screen `text` against the prohibited-term list.
pub fn check_legal(config: &LegalConfig, text: &str) -> ComplianceResult {
    if config.prohibited_words.is_empty() {
        return ComplianceResult::pass("No prohibited words configured");
    }

    let violations: Vec<String> = config.scan(text).iter().map(LegalFinding::message).collect();
    let details = if violations.is_empty() {
        format!("No prohibited terms found (checked {} terms)", config.prohibited_words.len())
    } else {
        format!("Found {} prohibited term(s)", violations.len())
    };
    ComplianceResult::from_violations(details, violations)
}

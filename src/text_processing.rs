//! # Text Processing Module
//!
//! Reduces raw recognized text to a single result string.
//!
//! ## Pipeline
//!
//! 1. Split on line breaks, trim, drop empty lines
//! 2. With the `tokens` policy, split every line again on whitespace runs and
//!    a fixed set of half/full-width punctuation
//! 3. Pick the first candidate matching the user's term (`prefix` or `suffix`)
//!
//! An empty result means "no candidate" and is committed as a failure.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

/// Characters that split a line into tokens, in addition to any whitespace run
pub const DEFAULT_SEPARATORS: &[char] = &[
    '\t', ',', '，', '、', '。', '.', '．', ':', '：', ';', '；', '/', '／', '|', '｜', '-', '－',
    '‐', '(', ')', '（', '）', '「', '」', '【', '】', '・',
];

lazy_static! {
    static ref DEFAULT_SPLITTER: Regex = Regex::new(&build_separator_pattern(DEFAULT_SEPARATORS))
        .expect("Default separator pattern should be valid");
}

/// Build `[\s<escaped separators>]+`
fn build_separator_pattern(separators: &[char]) -> String {
    let escaped: String = separators
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    format!(r"[\s{}]+", escaped)
}

/// Which end of a candidate the match term must sit at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Candidate starts with the term
    Prefix,
    /// Candidate ends with the term
    #[default]
    Suffix,
}

impl MatchMode {
    /// `prefix` selects prefix matching; anything else falls back to suffix
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("prefix") {
            MatchMode::Prefix
        } else {
            MatchMode::Suffix
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Prefix => "prefix",
            MatchMode::Suffix => "suffix",
        }
    }

    fn matches(&self, candidate: &str, term: &str) -> bool {
        match self {
            MatchMode::Prefix => candidate.starts_with(term),
            MatchMode::Suffix => candidate.ends_with(term),
        }
    }
}

/// Granularity of match candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CandidatePolicy {
    /// Lines split further on separators
    #[default]
    Tokens,
    /// Whole trimmed lines
    Lines,
}

impl CandidatePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tokens" => Some(CandidatePolicy::Tokens),
            "lines" => Some(CandidatePolicy::Lines),
            _ => None,
        }
    }
}

/// Match mode and term in effect for a batch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchSettings {
    pub mode: MatchMode,
    pub term: String,
}

impl MatchSettings {
    pub fn new(mode: MatchMode, term: impl Into<String>) -> Self {
        Self {
            mode,
            term: term.into(),
        }
    }
}

/// Splits raw recognized text into ordered candidates
#[derive(Debug, Clone)]
pub struct CandidateSplitter {
    pattern: Regex,
    policy: CandidatePolicy,
}

impl Default for CandidateSplitter {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_SPLITTER.clone(),
            policy: CandidatePolicy::Tokens,
        }
    }
}

impl CandidateSplitter {
    pub fn new(policy: CandidatePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Token splitter using a custom separator set; whitespace always separates
    pub fn with_separators(separators: &[char]) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&build_separator_pattern(separators))?;
        Ok(Self {
            pattern,
            policy: CandidatePolicy::Tokens,
        })
    }

    pub fn policy(&self) -> CandidatePolicy {
        self.policy
    }

    /// Ordered, trimmed, non-empty candidates
    pub fn candidates<'a>(&self, raw: &'a str) -> Vec<&'a str> {
        let lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());

        match self.policy {
            CandidatePolicy::Lines => lines.collect(),
            CandidatePolicy::Tokens => lines
                .flat_map(|line| self.pattern.split(line))
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    /// Pick the result for `raw`; empty when nothing qualifies
    pub fn find_match(&self, raw: &str, settings: &MatchSettings) -> String {
        let candidates = self.candidates(raw);
        let term = settings.term.trim();
        trace!(candidates = candidates.len(), term = %term, "Scanning candidates");

        let found = if term.is_empty() {
            candidates.first().copied()
        } else {
            candidates
                .iter()
                .copied()
                .find(|candidate| settings.mode.matches(candidate, term))
        };

        match found {
            Some(candidate) => candidate.to_string(),
            None => {
                debug!(
                    candidates = candidates.len(),
                    mode = settings.mode.as_str(),
                    "No candidate matched"
                );
                String::new()
            }
        }
    }
}

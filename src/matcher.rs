//! Filtering and scoring stored records against include/exclude keywords.

use std::cmp::Reverse;
use std::str::FromStr;

use thiserror::Error;

use crate::model::{MatchedRecord, TenderRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("Include keywords are required.")]
    EmptyInclude,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Any,
    All,
}

impl FromStr for MatchMode {
    type Err = std::convert::Infallible;

    /// `ALL` in any case selects [`MatchMode::All`]; anything else is `Any`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("all") {
            MatchMode::All
        } else {
            MatchMode::Any
        })
    }
}

/// Comma-separated list, trimmed, lower-cased, blanks dropped.
pub fn normalize_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Searchable text of a record: its non-empty fields, space-joined, whitespace collapsed, lower-case.
pub fn haystack(t: &TenderRecord) -> String {
    let parts = [
        t.bid_number.as_str(),
        t.ra_number.as_str(),
        t.title.as_str(),
        t.department.as_str(),
        t.buyer.as_str(),
        t.start_date.as_str(),
        t.end_date.as_str(),
        t.url(),
    ];
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub struct KeywordQuery {
    include: Vec<String>,
    exclude: Vec<String>,
    mode: MatchMode,
}

impl KeywordQuery {
    pub fn new(include: &str, exclude: &str, mode: MatchMode) -> Result<Self, MatchError> {
        let include = normalize_keywords(include);
        if include.is_empty() {
            return Err(MatchError::EmptyInclude);
        }
        Ok(Self { include, exclude: normalize_keywords(exclude), mode })
    }

    fn check(&self, record: &TenderRecord) -> Option<Vec<String>> {
        let text = haystack(record);
        if self.exclude.iter().any(|w| text.contains(w.as_str())) {
            return None;
        }
        let hits: Vec<String> = self
            .include
            .iter()
            .filter(|w| text.contains(w.as_str()))
            .cloned()
            .collect();
        let ok = match self.mode {
            MatchMode::All => hits.len() == self.include.len(),
            MatchMode::Any => !hits.is_empty(),
        };
        ok.then_some(hits)
    }
}

/// Records passing `query`, best score first; equal scores keep input order.
pub fn match_records(records: &[TenderRecord], query: &KeywordQuery) -> Vec<MatchedRecord> {
    let mut matched: Vec<MatchedRecord> = records
        .iter()
        .filter_map(|r| {
            let hits = query.check(r)?;
            Some(MatchedRecord {
                url: r.url().to_string(),
                score: hits.len(),
                matched_keywords: hits,
                record: r.clone(),
            })
        })
        .collect();
    matched.sort_by_key(|m| Reverse(m.score));
    matched
}

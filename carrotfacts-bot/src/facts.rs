//! Fact databases.
//!
//! Two on-disk formats are understood, picked by file extension:
//!
//! - `.json`: an array of objects with a `"text"` key holding the fact and an
//!   `"id"` key holding an integer identifier.
//! - `.txt`: one fact per line. The zero-based line number is the identifier.

use std::ops::Deref;
use std::path::Path;

use serde::Deserialize;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Fact {
    pub text: String,
    pub id: i64,
}

/// An ordered, non-empty list of facts. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facts(Vec<Fact>);

impl Facts {
    /// Wrap a list of facts, rejecting an empty one.
    pub fn new(facts: Vec<Fact>) -> Result<Self, LoadError> {
        if facts.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(Self(facts))
    }

    /// Build a collection from bare strings, numbering them from zero.
    pub fn from_lines<I, S>(lines: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let facts = lines
            .into_iter()
            .enumerate()
            .map(|(i, text)| Fact {
                id: i as i64,
                text: text.into(),
            })
            .collect();
        Self::new(facts)
    }
}

impl Deref for Facts {
    type Target = [Fact];

    fn deref(&self) -> &[Fact] {
        &self.0
    }
}

/// Load facts from `path`, choosing the parser by extension.
pub fn load(path: &Path) -> Result<Facts, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();

    match extension.as_str() {
        "json" => {
            let raw = std::fs::read_to_string(path)?;
            Facts::new(serde_json::from_str(&raw)?)
        }
        "txt" => {
            let raw = std::fs::read_to_string(path)?;
            Facts::from_lines(raw.lines())
        }
        _ => Err(LoadError::UnsupportedFormat { extension }),
    }
}

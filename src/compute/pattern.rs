//! Hierarchical code patterns.
//!
//! A pattern list is a comma separated string such as `"06037*, 06059"`.
//! Each entry is either an exact code or a code followed by a single `*`,
//! meaning "every code starting with this prefix". Because a unit's code
//! always begins with its ancestors' codes, `"06*"` selects everything in
//! state 06 at whatever category is being queried.

use crate::error::{CensusError, Result};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

pub const WILDCARD: char = '*';

/// One parsed code pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CodePattern {
    Exact(String),
    /// Matches every code that starts with the prefix. An empty prefix
    /// matches everything.
    Prefix(String),
}

/// SQL dialect a predicate is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `GLOB` with a trailing `*`.
    Sqlite,
    /// `LIKE` with a trailing `%`.
    Postgres,
}

/// A `geo_id <operator> <value>` predicate for one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub operator: &'static str,
    pub value: String,
}

impl CodePattern {
    /// Parse a single, already trimmed pattern.
    ///
    /// Codes are ASCII alphanumeric. Anything a backend would treat as a
    /// wildcard of its own (`%`, `_`, `?`, `[`) is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CensusError::pattern(raw, "empty pattern"));
        }

        let (code, is_prefix) = match raw.strip_suffix(WILDCARD) {
            Some(code) => (code, true),
            None => (raw, false),
        };

        if let Some(bad) = code.chars().find(|c| !c.is_ascii_alphanumeric()) {
            let reason = if bad == WILDCARD {
                "wildcard is only allowed as the last character".to_string()
            } else {
                format!("unsupported character {:?}", bad)
            };
            return Err(CensusError::pattern(raw, reason));
        }

        Ok(if is_prefix {
            CodePattern::Prefix(code.to_string())
        } else {
            CodePattern::Exact(code.to_string())
        })
    }

    /// The literal code part, without any wildcard.
    pub fn code(&self) -> &str {
        match self {
            CodePattern::Exact(code) | CodePattern::Prefix(code) => code,
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self, CodePattern::Prefix(_))
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            CodePattern::Exact(code) => id == code,
            CodePattern::Prefix(prefix) => id.starts_with(prefix.as_str()),
        }
    }

    /// Render the backend's native match predicate for this pattern.
    pub fn predicate(&self, dialect: Dialect) -> Predicate {
        match (self, dialect) {
            (CodePattern::Exact(code), _) => Predicate {
                operator: "=",
                value: code.clone(),
            },
            (CodePattern::Prefix(prefix), Dialect::Sqlite) => Predicate {
                operator: "GLOB",
                value: format!("{}*", prefix),
            },
            (CodePattern::Prefix(prefix), Dialect::Postgres) => Predicate {
                operator: "LIKE",
                value: format!("{}%", prefix),
            },
        }
    }
}

impl fmt::Display for CodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodePattern::Exact(code) => f.write_str(code),
            CodePattern::Prefix(prefix) => write!(f, "{}{}", prefix, WILDCARD),
        }
    }
}

/// An ordered pattern list. Order and repeats are kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodePatterns(SmallVec<[CodePattern; 4]>);

impl CodePatterns {
    /// Split on commas, trim, and parse each entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use censusdb::compute::pattern::{CodePattern, CodePatterns};
    ///
    /// let patterns = CodePatterns::parse("0610*, 06037")?;
    /// assert_eq!(patterns.len(), 2);
    /// assert!(patterns.iter().next().unwrap().is_prefix());
    /// assert!(CodePatterns::parse("06,,07").is_err());
    /// # Ok::<(), censusdb::CensusError>(())
    /// ```
    pub fn parse(list: &str) -> Result<Self> {
        if list.trim().is_empty() {
            return Err(CensusError::pattern(list, "no patterns given"));
        }
        list.split(',')
            .map(|raw| CodePattern::parse(raw.trim()))
            .collect::<Result<SmallVec<_>>>()
            .map(CodePatterns)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodePattern> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run `fetch` once per pattern and concatenate the results in pattern
    /// order, stopping once `cap` rows have been collected.
    ///
    /// `fetch` receives the pattern, the number of rows still wanted and the
    /// offset to apply. The caller's `offset` is handed to the first pattern
    /// only; later patterns always start at zero. Rows matched by more than
    /// one pattern appear once per match.
    pub fn collect_capped<T>(
        &self,
        cap: usize,
        offset: usize,
        mut fetch: impl FnMut(&CodePattern, usize, usize) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for (idx, pattern) in self.iter().enumerate() {
            let remaining = cap.saturating_sub(out.len());
            if remaining == 0 {
                break;
            }
            let pattern_offset = if idx == 0 { offset } else { 0 };
            let rows = fetch(pattern, remaining, pattern_offset)?;
            out.extend(rows.into_iter().take(remaining));
        }
        Ok(out)
    }

    /// Run `fetch` once per pattern and concatenate everything.
    pub fn collect_all<T>(
        &self,
        mut fetch: impl FnMut(&CodePattern) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for pattern in self.iter() {
            out.extend(fetch(pattern)?);
        }
        Ok(out)
    }
}

impl FromStr for CodePatterns {
    type Err = CensusError;

    fn from_str(s: &str) -> Result<Self> {
        CodePatterns::parse(s)
    }
}

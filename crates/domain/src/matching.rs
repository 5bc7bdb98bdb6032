//! Event matching: does a binding's rule apply to an event summary?
//!
//! Match kinds form a closed set. Unrecognised kinds coming from
//! configuration deserialize into [`MatchKind::Unknown`] and never match.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::CalendarId;

/// How a rule value is compared against an event summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MatchKind {
    /// Case-sensitive equality.
    Exact,
    /// Case-insensitive substring.
    Contains,
    /// Regular expression matched from the start of the summary.
    Regex,
    /// Any other name found in configuration.
    Unknown(String),
}

impl From<String> for MatchKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "exact" | "summary" => Self::Exact,
            "contains" | "summary_contains" => Self::Contains,
            "regex" => Self::Regex,
            _ => Self::Unknown(value),
        }
    }
}

impl From<MatchKind> for String {
    fn from(kind: MatchKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => f.write_str("exact"),
            Self::Contains => f.write_str("contains"),
            Self::Regex => f.write_str("regex"),
            Self::Unknown(name) => f.write_str(name),
        }
    }
}

/// A `{type, value}` pattern attached to a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    #[serde(rename = "type")]
    pub kind: MatchKind,
    pub value: String,
}

impl MatchRule {
    #[must_use]
    pub fn exact(value: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Exact,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn contains(value: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Contains,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn regex(value: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Regex,
            value: value.into(),
        }
    }

    /// Check that the rule can ever match.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for empty values, unknown kinds or
    /// regexes that do not compile.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.compile().map(|_| ())
    }

    /// Turn the rule into a reusable matcher.
    ///
    /// # Errors
    ///
    /// Same conditions as [`validate`](Self::validate).
    pub fn compile(&self) -> Result<CompiledMatcher, ValidationError> {
        if self.value.is_empty() {
            return Err(ValidationError::EmptyMatchValue);
        }
        match &self.kind {
            MatchKind::Exact => Ok(CompiledMatcher::Exact(self.value.clone())),
            MatchKind::Contains => Ok(CompiledMatcher::Contains(self.value.to_lowercase())),
            MatchKind::Regex => Regex::new(&self.value)
                .map(CompiledMatcher::Regex)
                .map_err(|err| ValidationError::InvalidPattern {
                    pattern: self.value.clone(),
                    reason: err.to_string(),
                }),
            MatchKind::Unknown(name) => Err(ValidationError::UnsupportedMatchType(name.clone())),
        }
    }
}

/// A rule ready to be evaluated against summaries.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    Exact(String),
    /// Holds the lower-cased needle.
    Contains(String),
    Regex(Regex),
}

impl CompiledMatcher {
    /// Evaluate the matcher against an event summary.
    #[must_use]
    pub fn matches(&self, summary: &str) -> bool {
        match self {
            Self::Exact(expected) => summary == expected,
            Self::Contains(needle) => summary.to_lowercase().contains(needle.as_str()),
            // The leftmost match starts at 0 whenever any match does.
            Self::Regex(regex) => regex.find(summary).is_some_and(|m| m.start() == 0),
        }
    }
}

/// One-shot evaluation of `rule` against `summary`.
///
/// Invalid rules fail closed. Hot paths cache [`CompiledMatcher`]s instead.
#[must_use]
pub fn matches(rule: &MatchRule, summary: &str) -> bool {
    rule.compile().is_ok_and(|matcher| matcher.matches(summary))
}

/// Which calendars a binding listens to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ScopeRepr", into = "ScopeRepr")]
pub enum CalendarScope {
    /// The `"*"` wildcard.
    #[default]
    All,
    Only(BTreeSet<CalendarId>),
}

impl CalendarScope {
    /// Scope limited to the given calendars.
    pub fn only(calendars: impl IntoIterator<Item = CalendarId>) -> Self {
        Self::Only(calendars.into_iter().collect())
    }

    /// Whether an event from `calendar_id` is eligible.
    #[must_use]
    pub fn includes(&self, calendar_id: &CalendarId) -> bool {
        match self {
            Self::All => true,
            Self::Only(calendars) => calendars.contains(calendar_id),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ScopeRepr {
    One(String),
    Many(Vec<String>),
}

const WILDCARD: &str = "*";

impl TryFrom<ScopeRepr> for CalendarScope {
    type Error = ValidationError;

    fn try_from(repr: ScopeRepr) -> Result<Self, Self::Error> {
        let names = match repr {
            ScopeRepr::One(name) => vec![name],
            ScopeRepr::Many(names) => names,
        };
        if names.iter().any(|name| name == WILDCARD) {
            return Ok(Self::All);
        }
        names
            .into_iter()
            .map(CalendarId::new)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self::Only)
    }
}

impl From<CalendarScope> for ScopeRepr {
    fn from(scope: CalendarScope) -> Self {
        match scope {
            CalendarScope::All => Self::One(WILDCARD.to_string()),
            CalendarScope::Only(ids) => Self::Many(ids.into_iter().map(String::from).collect()),
        }
    }
}

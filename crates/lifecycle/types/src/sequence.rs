//! Sequence definitions: scoped, gap-free document numbering metadata
//!
//! A sequence produces human-readable document numbers ("PO-2024-00001")
//! from a dedicated counter row per scope key. The counter is the only
//! source of numbers — deriving the next value from "max existing +
//! increment" is forbidden, it loses updates under concurrency.

use crate::{LifecycleError, LifecycleResult};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

// ── Sequence Code ────────────────────────────────────────────────────

/// Unique code of a sequence definition ("PO", "INV")
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceCode(pub String);

impl SequenceCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl std::fmt::Display for SequenceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Sequence Definition ──────────────────────────────────────────────

/// Metadata for one numbering sequence.
///
/// The pattern substitutes `{prefix}`, `{year}`, `{month}` (two digits)
/// and `{sequence}` (zero-padded to `padding`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceDefinition {
    /// Unique sequence code
    pub code: SequenceCode,
    /// Literal prefix substituted for `{prefix}`
    pub prefix: String,
    /// Format pattern, e.g. `"{prefix}{year}-{sequence}"`
    pub pattern: String,
    /// Partition the counter by calendar year
    pub by_year: bool,
    /// Partition the counter by calendar month
    pub by_month: bool,
    /// Partition the counter by location
    pub by_location: bool,
    /// First value handed out per scope
    pub start_number: i64,
    /// Step between consecutive values
    pub increment_by: i64,
    /// Zero-padding width for `{sequence}`
    pub padding: usize,
}

impl SequenceDefinition {
    pub fn new(code: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            code: SequenceCode::new(code),
            prefix: String::new(),
            pattern: pattern.into(),
            by_year: false,
            by_month: false,
            by_location: false,
            start_number: 1,
            increment_by: 1,
            padding: 5,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn scope_by_year(mut self) -> Self {
        self.by_year = true;
        self
    }

    pub fn scope_by_month(mut self) -> Self {
        self.by_month = true;
        self
    }

    pub fn scope_by_location(mut self) -> Self {
        self.by_location = true;
        self
    }

    pub fn with_start(mut self, start: i64) -> Self {
        self.start_number = start;
        self
    }

    pub fn with_increment(mut self, increment: i64) -> Self {
        self.increment_by = increment;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn validate(&self) -> LifecycleResult<()> {
        if self.increment_by < 1 {
            return Err(LifecycleError::Validation(format!(
                "sequence '{}' has non-positive increment {}",
                self.code, self.increment_by
            )));
        }
        if self.padding == 0 {
            return Err(LifecycleError::Validation(format!(
                "sequence '{}' has zero padding width",
                self.code
            )));
        }
        Ok(())
    }

    /// Compute the counter scope key for a caller context.
    ///
    /// Scope flags filter the context: an unset flag forces that part
    /// of the key to its neutral value no matter what the caller sent.
    /// A set flag with no context value defaults year/month from the
    /// current date and location to the empty string.
    pub fn scope_key(&self, context: &ScopeContext) -> ScopeKey {
        let now = Utc::now();
        ScopeKey {
            sequence: self.code.clone(),
            year: self.by_year.then(|| context.year.unwrap_or_else(|| now.year())),
            month: self.by_month.then(|| context.month.unwrap_or(now.month())),
            location: self
                .by_location
                .then(|| context.location.clone().unwrap_or_default()),
        }
    }
}

// ── Scope Context ────────────────────────────────────────────────────

/// The caller-supplied scope values for one `next_number` call
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ScopeContext {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub location: Option<String>,
}

impl ScopeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_month(mut self, month: u32) -> Self {
        self.month = Some(month);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

// ── Scope Key ────────────────────────────────────────────────────────

/// The tuple that partitions a sequence's counter into independent
/// streams. One counter row exists per distinct key actually used.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeKey {
    pub sequence: SequenceCode,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub location: Option<String>,
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.sequence,
            self.year.map_or("-".to_string(), |y| y.to_string()),
            self.month.map_or("-".to_string(), |m| m.to_string()),
            self.location.as_deref().unwrap_or("-"),
        )
    }
}

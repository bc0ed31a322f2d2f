//! Ledger record types.
//!
//! `LedgerEntry` is one tracked expense line; `HistoryEntry` is the
//! write-once audit record of a single field edit on an entry.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// One tracked task/expense line.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Opaque, immutable identifier assigned at creation.
    pub id: String,
    pub title: String,
    /// Planned amount (செலவு). Never stored negative.
    pub planned: f64,
    /// Actually spent amount (செலவானது). Never stored negative.
    pub actual: f64,
    pub completed: bool,
    /// Display position. Collisions and gaps are tolerated.
    pub order: i64,
}

/// Field tag carried by a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangedField {
    Title,
    Planned,
    Actual,
}

impl ChangedField {
    /// Tag persisted in the history table.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangedField::Title => "title",
            ChangedField::Planned => "planned",
            ChangedField::Actual => "actual",
        }
    }
}

impl fmt::Display for ChangedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangedField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(ChangedField::Title),
            "planned" => Ok(ChangedField::Planned),
            "actual" => Ok(ChangedField::Actual),
            other => Err(other.to_string()),
        }
    }
}

/// A single field edit: the tag and the new value travel together, so an
/// amount can never be written to the title column or vice versa.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Title(String),
    Planned(f64),
    Actual(f64),
}

impl FieldUpdate {
    pub fn field(&self) -> ChangedField {
        match self {
            FieldUpdate::Title(_) => ChangedField::Title,
            FieldUpdate::Planned(_) => ChangedField::Planned,
            FieldUpdate::Actual(_) => ChangedField::Actual,
        }
    }
}

/// Immutable audit record of one field-level edit.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    /// Id of the owning `LedgerEntry`.
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub changed_field: ChangedField,
    /// Human-readable rendering of the new value.
    pub description: String,
}

/// One `(id, order)` pair of a reorder batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub id: String,
    pub order: i64,
}

impl OrderUpdate {
    pub fn new(id: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            order,
        }
    }
}

impl<S: Into<String>> From<(S, i64)> for OrderUpdate {
    fn from((id, order): (S, i64)) -> Self {
        Self::new(id, order)
    }
}

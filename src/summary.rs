//! Derived ledger totals.
//!
//! Read-only projections computed from a collection snapshot and the
//! income preference. Nothing here is persisted.

use crate::model::LedgerEntry;

/// Totals shown above the entry list.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LedgerSummary {
    /// வரவு
    pub income: f64,
    /// Sum of planned amounts (செலவு).
    pub spent: f64,
    /// Sum of actual amounts (செலவானது).
    pub actual: f64,
    /// Income minus planned (சேமிப்பு).
    pub savings: f64,
    /// Income minus actual (இருப்பு).
    pub balance: f64,
    pub completed: usize,
    pub pending: usize,
}

impl LedgerSummary {
    pub fn from_entries(entries: &[LedgerEntry], income: f64) -> Self {
        let spent: f64 = entries.iter().map(|e| e.planned).sum();
        let actual: f64 = entries.iter().map(|e| e.actual).sum();
        let completed = entries.iter().filter(|e| e.completed).count();

        Self {
            income,
            spent,
            actual,
            savings: income - spent,
            balance: income - actual,
            completed,
            pending: entries.len() - completed,
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.savings < 0.0
    }
}

/// Parse the stored income string.
///
/// Takes the leading integer (optional sign, then digits) and ignores the
/// rest, so `"1200.75"` reads as 1200. Anything without a leading integer
/// reads as 0.
pub fn parse_income(raw: &str) -> f64 {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1.0, &trimmed[1..]),
        Some(b'+') => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    match digits[..end].parse::<f64>() {
        Ok(value) => sign * value,
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(planned: f64, actual: f64, completed: bool) -> LedgerEntry {
        LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            title: "item".to_string(),
            planned,
            actual,
            completed,
            order: 0,
        }
    }

    #[test]
    fn test_summary_totals() {
        let entries = vec![
            entry(100.0, 40.0, true),
            entry(250.0, 300.0, false),
            entry(50.0, 0.0, false),
        ];

        let summary = LedgerSummary::from_entries(&entries, 1000.0);
        assert_eq!(summary.spent, 400.0);
        assert_eq!(summary.actual, 340.0);
        assert_eq!(summary.savings, 600.0);
        assert_eq!(summary.balance, 660.0);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.pending, 2);
        assert!(!summary.is_over_budget());
    }

    #[test]
    fn test_summary_empty() {
        let summary = LedgerSummary::from_entries(&[], 0.0);
        assert_eq!(summary, LedgerSummary::default());
    }

    #[test]
    fn test_summary_over_budget() {
        let summary = LedgerSummary::from_entries(&[entry(500.0, 0.0, false)], 200.0);
        assert_eq!(summary.savings, -300.0);
        assert!(summary.is_over_budget());
    }

    #[test]
    fn test_parse_income_plain() {
        assert_eq!(parse_income("25000"), 25000.0);
    }

    #[test]
    fn test_parse_income_takes_integer_prefix() {
        assert_eq!(parse_income("1200.75"), 1200.0);
        assert_eq!(parse_income("  42abc"), 42.0);
        assert_eq!(parse_income("-15"), -15.0);
    }

    #[test]
    fn test_parse_income_garbage_is_zero() {
        assert_eq!(parse_income(""), 0.0);
        assert_eq!(parse_income("abc"), 0.0);
        assert_eq!(parse_income("-"), 0.0);
    }
}

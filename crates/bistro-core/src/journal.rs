//! # Journal Drafts
//!
//! Builds journal entries in memory and enforces the double-entry rule
//! before anything reaches the database.
//!
//! ## Balance Check
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  JournalDraft "Invoice INV-20261019-000007"                             │
//! │                                                                         │
//! │   line  account            debit        credit                          │
//! │   ────  ───────────────    ─────────    ─────────                       │
//! │   1     1110 Cash            115.00                                     │
//! │   2     4100 Sales                         100.00                       │
//! │   3     2110 Output VAT                     15.00                       │
//! │                            ─────────    ─────────                       │
//! │                              115.00   ==   115.00   ✅ balanced          │
//! │                                                                         │
//! │  validate():                                                            │
//! │   • ≥ 2 lines                                                           │
//! │   • each line: exactly one side > 0, nothing negative                   │
//! │   • Σ debit == Σ credit, otherwise UnbalancedEntry { debit, credit }    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The repository calls [`JournalDraft::validate`] first, then resolves
//! account keys and inserts the entry and its postings in one transaction.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{EntryReference, JournalEntry, JournalPosting};

// =============================================================================
// Account Key
// =============================================================================

/// How a draft line names its account.
///
/// Generated postings use codes (`"1110"`); manual entries from the UI
/// usually carry ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    Id(i64),
    Code(String),
}

impl From<&str> for AccountKey {
    fn from(code: &str) -> Self {
        AccountKey::Code(code.to_string())
    }
}

impl From<String> for AccountKey {
    fn from(code: String) -> Self {
        AccountKey::Code(code)
    }
}

impl From<i64> for AccountKey {
    fn from(id: i64) -> Self {
        AccountKey::Id(id)
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountKey::Id(id) => write!(f, "#{}", id),
            AccountKey::Code(code) => f.write_str(code),
        }
    }
}

// =============================================================================
// Draft
// =============================================================================

/// One line of a draft entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account: AccountKey,
    #[serde(default)]
    pub debit: Money,
    #[serde(default)]
    pub credit: Money,
    #[serde(default)]
    pub memo: Option<String>,
}

/// An entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalDraft {
    pub description: String,
    pub reference: EntryReference,
    /// Defaults to the current date in the repository when `None`.
    pub entry_date: Option<NaiveDate>,
    /// Defaults to the configured default branch when `None`.
    pub branch: Option<String>,
    pub lines: Vec<JournalLine>,
}

impl JournalDraft {
    pub fn new(description: impl Into<String>, reference: EntryReference) -> Self {
        JournalDraft {
            description: description.into(),
            reference,
            entry_date: None,
            branch: None,
            lines: Vec::new(),
        }
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.entry_date = Some(date);
        self
    }

    pub fn in_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Adds a debit line. Zero amounts are skipped.
    pub fn debit(self, account: impl Into<AccountKey>, amount: Money) -> Self {
        self.line(account.into(), amount, Money::zero(), None)
    }

    /// Adds a credit line. Zero amounts are skipped.
    pub fn credit(self, account: impl Into<AccountKey>, amount: Money) -> Self {
        self.line(account.into(), Money::zero(), amount, None)
    }

    /// Adds a line with a memo. Lines with both sides zero are skipped.
    pub fn line(
        mut self,
        account: AccountKey,
        debit: Money,
        credit: Money,
        memo: Option<String>,
    ) -> Self {
        if debit.is_zero() && credit.is_zero() {
            return self;
        }
        self.lines.push(JournalLine {
            account,
            debit,
            credit,
            memo,
        });
        self
    }

    pub fn total_debit(&self) -> Money {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Checks every rule an entry must satisfy before it is stored.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::journal::JournalDraft;
    /// use bistro_core::{CoreError, EntryReference, Money};
    ///
    /// let draft = JournalDraft::new("Typo", EntryReference::Manual)
    ///     .debit("5300", Money::from_cents(10000))
    ///     .credit("1110", Money::from_cents(9950));
    ///
    /// assert!(matches!(draft.validate(), Err(CoreError::UnbalancedEntry { .. })));
    /// ```
    pub fn validate(&self) -> CoreResult<()> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "description".to_string(),
            }
            .into());
        }

        if self.lines.len() < 2 {
            return Err(CoreError::TooFewPostings {
                count: self.lines.len(),
            });
        }

        for (idx, line) in self.lines.iter().enumerate() {
            validate_line(idx + 1, &line.account.to_string(), line.debit, line.credit)?;
        }

        check_balance(self.total_debit(), self.total_credit())
    }
}

fn validate_line(line: usize, account: &str, debit: Money, credit: Money) -> CoreResult<()> {
    let reason = if debit.is_negative() || credit.is_negative() {
        Some("amounts cannot be negative")
    } else if debit.is_positive() && credit.is_positive() {
        Some("a line cannot carry both a debit and a credit")
    } else if debit.is_zero() && credit.is_zero() {
        Some("a line needs a debit or a credit")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CoreError::InvalidPosting {
            line,
            account: account.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// The double-entry rule on already-summed totals.
pub fn check_balance(debit: Money, credit: Money) -> CoreResult<()> {
    if debit != credit {
        return Err(CoreError::UnbalancedEntry { debit, credit });
    }
    if debit.is_zero() {
        return Err(CoreError::ZeroEntry);
    }
    Ok(())
}

/// Re-checks stored postings, used before posting and by ledger diagnostics.
pub fn verify_postings(postings: &[JournalPosting]) -> CoreResult<()> {
    if postings.len() < 2 {
        return Err(CoreError::TooFewPostings {
            count: postings.len(),
        });
    }
    for (idx, p) in postings.iter().enumerate() {
        validate_line(idx + 1, &p.account_code, p.debit(), p.credit())?;
    }
    let debit: Money = postings.iter().map(JournalPosting::debit).sum();
    let credit: Money = postings.iter().map(JournalPosting::credit).sum();
    check_balance(debit, credit)
}

/// Builds the correcting entry for a posted one: same accounts, sides swapped.
pub fn reversal_of(entry: &JournalEntry, date: NaiveDate) -> JournalDraft {
    let mut draft = JournalDraft::new(
        format!("Reversal of {}", entry.entry_number),
        EntryReference::Reversal(entry.id),
    )
    .dated(date)
    .in_branch(entry.branch.clone());

    for p in &entry.postings {
        draft = draft.line(
            AccountKey::Id(p.account_id),
            p.credit(),
            p.debit(),
            p.memo.clone(),
        );
    }
    draft
}

/// Formats a document number: `JE-20261019-000042`.
pub fn document_number(prefix: &str, date: NaiveDate, seq: i64) -> String {
    format!("{}-{}-{:06}", prefix, date.format("%Y%m%d"), seq)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryStatus;
    use chrono::Utc;

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    #[test]
    fn test_balanced_draft_validates() {
        let draft = JournalDraft::new("Cash sale", EntryReference::Manual)
            .debit("1110", cents(11500))
            .credit("4100", cents(10000))
            .credit("2110", cents(1500));
        assert!(draft.validate().is_ok());
        assert_eq!(draft.total_debit(), draft.total_credit());
    }

    #[test]
    fn test_unbalanced_draft_reports_both_totals() {
        let draft = JournalDraft::new("Oops", EntryReference::Manual)
            .debit("5300", cents(10000))
            .credit("1110", cents(9950));
        match draft.validate() {
            Err(CoreError::UnbalancedEntry { debit, credit }) => {
                assert_eq!(debit.cents(), 10000);
                assert_eq!(credit.cents(), 9950);
            }
            other => panic!("expected UnbalancedEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_single_line_rejected() {
        let draft = JournalDraft::new("Half", EntryReference::Manual).debit("1110", cents(100));
        assert!(matches!(
            draft.validate(),
            Err(CoreError::TooFewPostings { count: 1 })
        ));
    }

    #[test]
    fn test_zero_lines_are_skipped() {
        let draft = JournalDraft::new("No VAT", EntryReference::Manual)
            .debit("1110", cents(1000))
            .credit("4100", cents(1000))
            .credit("2110", Money::zero());
        assert_eq!(draft.lines.len(), 2);
    }

    #[test]
    fn test_line_with_both_sides_rejected() {
        let draft = JournalDraft::new("Bad", EntryReference::Manual)
            .line(AccountKey::from("1110"), cents(100), cents(100), None)
            .credit("4100", cents(0))
            .debit("5300", cents(50))
            .credit("1120", cents(50));
        assert!(matches!(
            draft.validate(),
            Err(CoreError::InvalidPosting { line: 1, .. })
        ));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let draft = JournalDraft::new("Negative", EntryReference::Manual)
            .debit("1110", cents(-100))
            .credit("4100", cents(-100));
        assert!(matches!(
            draft.validate(),
            Err(CoreError::InvalidPosting { .. })
        ));
    }

    #[test]
    fn test_missing_description_rejected() {
        let draft = JournalDraft::new("  ", EntryReference::Manual)
            .debit("1110", cents(100))
            .credit("4100", cents(100));
        assert!(matches!(draft.validate(), Err(CoreError::Validation(_))));
    }

    fn posting(id: i64, account_id: i64, code: &str, debit: i64, credit: i64) -> JournalPosting {
        JournalPosting {
            id,
            entry_id: 1,
            account_id,
            account_code: code.to_string(),
            account_name: code.to_string(),
            debit_cents: debit,
            credit_cents: credit,
            memo: None,
        }
    }

    #[test]
    fn test_verify_postings_detects_tampering() {
        let ok = vec![posting(1, 10, "1110", 500, 0), posting(2, 20, "4100", 0, 500)];
        assert!(verify_postings(&ok).is_ok());

        let bad = vec![posting(1, 10, "1110", 500, 0), posting(2, 20, "4100", 0, 499)];
        assert!(matches!(
            verify_postings(&bad),
            Err(CoreError::UnbalancedEntry { .. })
        ));
    }

    #[test]
    fn test_reversal_swaps_sides() {
        let now = Utc::now();
        let entry = JournalEntry {
            id: 42,
            entry_number: "JE-20261019-000042".to_string(),
            description: "Cash sale".to_string(),
            entry_date: now.date_naive(),
            reference: EntryReference::Invoice(7),
            branch: "main".to_string(),
            status: EntryStatus::Posted,
            posted_at: Some(now),
            created_at: now,
            updated_at: now,
            postings: vec![posting(1, 10, "1110", 1150, 0), posting(2, 20, "4100", 0, 1150)],
        };

        let rev = reversal_of(&entry, now.date_naive());
        assert_eq!(rev.reference, EntryReference::Reversal(42));
        assert_eq!(rev.lines[0].account, AccountKey::Id(10));
        assert_eq!(rev.lines[0].credit.cents(), 1150);
        assert_eq!(rev.lines[1].debit.cents(), 1150);
        assert!(rev.validate().is_ok());
    }

    #[test]
    fn test_document_number_format() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(document_number("JE", date, 42), "JE-20261019-000042");
        assert_eq!(document_number("INV", date, 7), "INV-20261019-000007");
    }

    #[test]
    fn test_account_key_deserializes_id_or_code() {
        let id: AccountKey = serde_json::from_str("12").unwrap();
        assert_eq!(id, AccountKey::Id(12));
        let code: AccountKey = serde_json::from_str("\"2130\"").unwrap();
        assert_eq!(code, AccountKey::Code("2130".to_string()));
    }
}

//! # Reports
//!
//! Report shapes and the arithmetic behind them. The database layer
//! aggregates postings; this module turns the sums into balances.
//!
//! ## Sign Convention
//! ```text
//! balance = opening + (debit - credit)   for debit-natured accounts
//! balance = opening + (credit - debit)   for credit-natured accounts
//! ```
//! A positive balance is always "normal" for the account.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{AccountNature, AccountType};

// =============================================================================
// Trial Balance
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TrialBalanceRow {
    pub account_id: i64,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub opening_cents: i64,
    pub debit_cents: i64,
    pub credit_cents: i64,
    /// Closing balance signed by the account's nature.
    pub balance_cents: i64,
}

impl TrialBalanceRow {
    #[allow(clippy::too_many_arguments)]
    pub fn compute(
        account_id: i64,
        code: String,
        name: String,
        account_type: AccountType,
        nature: AccountNature,
        opening: Money,
        debit: Money,
        credit: Money,
    ) -> Self {
        TrialBalanceRow {
            account_id,
            code,
            name,
            account_type,
            opening_cents: opening.cents(),
            debit_cents: debit.cents(),
            credit_cents: credit.cents(),
            balance_cents: (opening + nature.signed(debit, credit)).cents(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TrialBalance {
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit_cents: i64,
    pub total_credit_cents: i64,
    /// Total debits equal total credits over the period.
    pub balanced: bool,
}

impl TrialBalance {
    pub fn from_rows(rows: Vec<TrialBalanceRow>) -> Self {
        let total_debit: i64 = rows.iter().map(|r| r.debit_cents).sum();
        let total_credit: i64 = rows.iter().map(|r| r.credit_cents).sum();
        TrialBalance {
            rows,
            total_debit_cents: total_debit,
            total_credit_cents: total_credit,
            balanced: total_debit == total_credit,
        }
    }
}

// =============================================================================
// Account Statement
// =============================================================================

/// One posting as it feeds a statement, in date order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub entry_id: i64,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementLine {
    pub entry_id: i64,
    pub entry_number: String,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub description: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub running_balance_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountStatement {
    pub account_id: i64,
    pub code: String,
    pub name: String,
    pub opening_cents: i64,
    pub lines: Vec<StatementLine>,
    pub closing_cents: i64,
}

/// Builds a statement with a running balance.
pub fn build_statement(
    account_id: i64,
    code: String,
    name: String,
    nature: AccountNature,
    opening: Money,
    movements: Vec<Movement>,
) -> AccountStatement {
    let mut running = opening;
    let lines = movements
        .into_iter()
        .map(|m| {
            running += nature.signed(m.debit, m.credit);
            StatementLine {
                entry_id: m.entry_id,
                entry_number: m.entry_number,
                entry_date: m.entry_date,
                description: m.description,
                debit_cents: m.debit.cents(),
                credit_cents: m.credit.cents(),
                running_balance_cents: running.cents(),
            }
        })
        .collect();

    AccountStatement {
        account_id,
        code,
        name,
        opening_cents: opening.cents(),
        lines,
        closing_cents: running.cents(),
    }
}

// =============================================================================
// VAT & Sales
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VatSummary {
    /// VAT collected on sales (2110 credits net of debits).
    pub output_vat_cents: i64,
    /// VAT paid on purchases (2120 debits net of credits).
    pub input_vat_cents: i64,
    /// Positive: owed to the authority. Negative: refundable.
    pub net_payable_cents: i64,
}

impl VatSummary {
    pub fn new(output_vat: Money, input_vat: Money) -> Self {
        VatSummary {
            output_vat_cents: output_vat.cents(),
            input_vat_cents: input_vat.cents(),
            net_payable_cents: (output_vat - input_vat).cents(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesDay {
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub branch: String,
    pub invoice_count: i64,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(id: i64, day: u32, debit: i64, credit: i64) -> Movement {
        Movement {
            entry_id: id,
            entry_number: format!("JE-202610{:02}-{:06}", day, id),
            entry_date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            description: "test".to_string(),
            debit: Money::from_cents(debit),
            credit: Money::from_cents(credit),
        }
    }

    #[test]
    fn test_statement_running_balance_debit_nature() {
        let stmt = build_statement(
            1,
            "1110".to_string(),
            "Cash".to_string(),
            AccountNature::Debit,
            Money::from_cents(1000),
            vec![movement(1, 1, 500, 0), movement(2, 2, 0, 300)],
        );
        let running: Vec<i64> = stmt.lines.iter().map(|l| l.running_balance_cents).collect();
        assert_eq!(running, vec![1500, 1200]);
        assert_eq!(stmt.closing_cents, 1200);
    }

    #[test]
    fn test_statement_credit_nature() {
        let stmt = build_statement(
            2,
            "4100".to_string(),
            "Sales".to_string(),
            AccountNature::Credit,
            Money::zero(),
            vec![movement(1, 1, 0, 10000), movement(2, 3, 2000, 0)],
        );
        assert_eq!(stmt.closing_cents, 8000);
    }

    #[test]
    fn test_trial_balance_totals() {
        let rows = vec![
            TrialBalanceRow::compute(
                1,
                "1110".into(),
                "Cash".into(),
                AccountType::Asset,
                AccountNature::Debit,
                Money::zero(),
                Money::from_cents(11500),
                Money::zero(),
            ),
            TrialBalanceRow::compute(
                2,
                "4100".into(),
                "Sales".into(),
                AccountType::Revenue,
                AccountNature::Credit,
                Money::zero(),
                Money::zero(),
                Money::from_cents(10000),
            ),
            TrialBalanceRow::compute(
                3,
                "2110".into(),
                "Output VAT".into(),
                AccountType::Liability,
                AccountNature::Credit,
                Money::zero(),
                Money::zero(),
                Money::from_cents(1500),
            ),
        ];
        let tb = TrialBalance::from_rows(rows);
        assert!(tb.balanced);
        assert_eq!(tb.total_debit_cents, 11500);
        assert_eq!(tb.rows[1].balance_cents, 10000);
    }

    #[test]
    fn test_vat_summary_net() {
        let s = VatSummary::new(Money::from_cents(1500), Money::from_cents(3000));
        assert_eq!(s.net_payable_cents, -1500);
    }
}

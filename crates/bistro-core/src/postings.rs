//! # Posting Generation
//!
//! Turns business documents into balanced journal drafts.
//!
//! ## Posting Rules
//! ```text
//! ┌──────────────────┬─────────────────────────────────┬──────────────────────────────────┐
//! │ Source           │ Debit                           │ Credit                           │
//! ├──────────────────┼─────────────────────────────────┼──────────────────────────────────┤
//! │ Invoice          │ 1110 cash / 1120 bank /         │ 4100 sales: total - VAT          │
//! │                  │ 1200 receivable: total          │ 2110 output VAT: VAT             │
//! ├──────────────────┼─────────────────────────────────┼──────────────────────────────────┤
//! │ Expense          │ expense account: amount         │ 1110 cash / 1120 bank /          │
//! │                  │ 2120 input VAT: VAT             │ 2400 payable: total              │
//! ├──────────────────┼─────────────────────────────────┼──────────────────────────────────┤
//! │ Payroll accrual  │ 5200 salaries: gross            │ 2430 accrued salaries: net       │
//! │                  │ 5210 GOSI expense: employer     │ 2431 GOSI payable: employee +    │
//! │                  │                                 │      employer                    │
//! ├──────────────────┼─────────────────────────────────┼──────────────────────────────────┤
//! │ Payroll payment  │ 2430 accrued salaries: net      │ 1120 bank: net                   │
//! └──────────────────┴─────────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Zero-amount lines are dropped by the draft builder. Every draft produced
//! here passes [`JournalDraft::validate`] when the document amounts are
//! consistent; callers still validate before writing.

use crate::chart;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::journal::{AccountKey, JournalDraft};
use crate::money::Money;
use crate::types::{
    EntryReference, Expense, Invoice, PaymentMethod, PayrollRun, Rate, Settings,
};

// =============================================================================
// Invoice
// =============================================================================

/// Computed amounts of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    /// Sum of line totals as entered.
    pub subtotal: Money,
    pub discount: Money,
    /// Revenue after discount, excluding VAT.
    pub net: Money,
    pub vat: Money,
    /// Amount the customer pays.
    pub total: Money,
}

/// Computes invoice totals.
///
/// The discount must leave something to pay (`0 ≤ discount < subtotal`); a
/// fully comped table is cancelled rather than invoiced.
///
/// ## VAT Modes
/// ```text
/// prices_include_vat = false       prices_include_vat = true
/// ──────────────────────────       ─────────────────────────
/// net   = subtotal - discount      total = subtotal - discount
/// vat   = net × rate               vat   = total × rate / (1 + rate)
/// total = net + vat                net   = total - vat
/// ```
///
/// ## Example
/// ```rust
/// use bistro_core::postings::invoice_totals;
/// use bistro_core::{Money, Settings};
///
/// let totals = invoice_totals(Money::from_cents(10000), Money::zero(), &Settings::default()).unwrap();
/// assert_eq!(totals.vat.cents(), 1500);
/// assert_eq!(totals.total.cents(), 11500);
/// ```
pub fn invoice_totals(
    subtotal: Money,
    discount: Money,
    settings: &Settings,
) -> CoreResult<InvoiceTotals> {
    // Every invoice posts an entry, and an entry needs a non-zero total.
    if !subtotal.is_positive() {
        return Err(CoreError::ZeroEntry);
    }
    if discount.is_negative() || discount >= subtotal {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal.cents() - 1,
        }
        .into());
    }

    let rate = settings.vat_rate();
    let after_discount = subtotal - discount;

    let (net, vat, total) = if settings.prices_include_vat {
        let vat = after_discount.inclusive_tax(rate);
        (after_discount - vat, vat, after_discount)
    } else {
        let vat = after_discount.apply_rate(rate);
        (after_discount, vat, after_discount + vat)
    };

    Ok(InvoiceTotals {
        subtotal,
        discount,
        net,
        vat,
        total,
    })
}

/// Debit account receiving an invoice's payment.
pub fn invoice_debit_account(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => chart::CASH,
        PaymentMethod::Card | PaymentMethod::Bank => chart::BANK,
        PaymentMethod::Credit => chart::RECEIVABLES,
    }
}

/// Journal for an issued invoice.
pub fn invoice_journal(invoice: &Invoice) -> JournalDraft {
    let total = Money::from_cents(invoice.total_cents);
    let vat = Money::from_cents(invoice.vat_cents);

    JournalDraft::new(
        format!("Invoice {}", invoice.invoice_number),
        EntryReference::Invoice(invoice.id),
    )
    .dated(invoice.issued_at.date_naive())
    .in_branch(invoice.branch.clone())
    .debit(invoice_debit_account(invoice.payment_method), total)
    .credit(chart::SALES, total - vat)
    .credit(chart::OUTPUT_VAT, vat)
}

// =============================================================================
// Expense
// =============================================================================

/// Credit account settling an expense.
pub fn expense_credit_account(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => chart::CASH,
        PaymentMethod::Card | PaymentMethod::Bank => chart::BANK,
        PaymentMethod::Credit => chart::ACCOUNTS_PAYABLE,
    }
}

/// VAT on an expense: explicit when the supplier invoice states it,
/// otherwise computed from the net amount.
pub fn expense_vat(amount: Money, explicit: Option<Money>, rate: Rate) -> CoreResult<Money> {
    match explicit {
        Some(vat) if vat.is_negative() => Err(ValidationError::OutOfRange {
            field: "vat".to_string(),
            min: 0,
            max: amount.cents(),
        }
        .into()),
        Some(vat) => Ok(vat),
        None => Ok(amount.apply_rate(rate)),
    }
}

pub fn expense_journal(expense: &Expense) -> JournalDraft {
    let amount = Money::from_cents(expense.amount_cents);
    let vat = Money::from_cents(expense.vat_cents);
    let total = Money::from_cents(expense.total_cents);

    JournalDraft::new(
        format!("Expense: {}", expense.description),
        EntryReference::Expense(expense.id),
    )
    .dated(expense.expense_date)
    .in_branch(expense.branch.clone())
    .debit(AccountKey::Id(expense.expense_account_id), amount)
    .debit(chart::INPUT_VAT, vat)
    .credit(expense_credit_account(expense.payment_method), total)
}

// =============================================================================
// Payroll
// =============================================================================

/// Inputs for one employee's payslip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayslipInput {
    pub basic: Money,
    pub allowances: Money,
    pub deductions: Money,
    pub gosi_enrolled: bool,
}

/// Computed payslip amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payslip {
    pub gross: Money,
    pub gosi_employee: Money,
    pub gosi_employer: Money,
    pub net: Money,
}

/// Computes one payslip.
///
/// ```text
/// gross         = basic + allowances - deductions
/// gosi base     = basic + allowances          (0 when not enrolled)
/// gosi_employee = base × employee rate
/// gosi_employer = base × employer rate
/// net           = gross - gosi_employee
/// ```
pub fn compute_payslip(input: PayslipInput, settings: &Settings) -> CoreResult<Payslip> {
    if input.basic.is_negative() || input.allowances.is_negative() || input.deductions.is_negative()
    {
        return Err(ValidationError::MustBePositive {
            field: "salary".to_string(),
        }
        .into());
    }

    let base = input.basic + input.allowances;
    let gross = base - input.deductions;

    let (gosi_employee, gosi_employer) = if input.gosi_enrolled {
        (
            base.apply_rate(Rate::from_bps(settings.gosi_employee_rate_bps)),
            base.apply_rate(Rate::from_bps(settings.gosi_employer_rate_bps)),
        )
    } else {
        (Money::zero(), Money::zero())
    };

    let net = gross - gosi_employee;
    if net.is_negative() {
        return Err(ValidationError::invalid("deductions", "deductions exceed pay").into());
    }

    Ok(Payslip {
        gross,
        gosi_employee,
        gosi_employer,
        net,
    })
}

/// Accrual journal for a payroll run.
pub fn payroll_accrual_journal(run: &PayrollRun) -> CoreResult<JournalDraft> {
    if run.items.is_empty() {
        return Err(CoreError::InvalidState {
            entity: "Payroll run".to_string(),
            id: run.id,
            status: "empty".to_string(),
            operation: "post".to_string(),
        });
    }

    let gross: Money = run.items.iter().map(|i| i.gross()).sum();
    let employee: Money = run
        .items
        .iter()
        .map(|i| Money::from_cents(i.gosi_employee_cents))
        .sum();
    let employer: Money = run
        .items
        .iter()
        .map(|i| Money::from_cents(i.gosi_employer_cents))
        .sum();

    Ok(JournalDraft::new(
        format!("Payroll accrual {}", run.period),
        EntryReference::Payroll(run.id),
    )
    .in_branch(run.branch.clone())
    .debit(chart::SALARIES_EXPENSE, gross)
    .debit(chart::GOSI_EXPENSE, employer)
    .credit(chart::ACCRUED_SALARIES, run.total_net())
    .credit(chart::GOSI_PAYABLE, employee + employer))
}

/// Payment journal settling a run's accrued salaries from the bank.
pub fn payroll_payment_journal(run: &PayrollRun) -> JournalDraft {
    let net = run.total_net();
    JournalDraft::new(
        format!("Payroll payment {}", run.period),
        EntryReference::PayrollPayment(run.id),
    )
    .in_branch(run.branch.clone())
    .debit(chart::ACCRUED_SALARIES, net)
    .credit(chart::BANK, net)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExpenseStatus, InvoiceStatus, PayrollItem, PayrollStatus};
    use chrono::{NaiveDate, Utc};

    fn cents(c: i64) -> Money {
        Money::from_cents(c)
    }

    fn invoice(method: PaymentMethod, totals: InvoiceTotals) -> Invoice {
        Invoice {
            id: 7,
            invoice_number: "INV-20261019-000007".to_string(),
            branch: "china_town".to_string(),
            order_id: Some(3),
            partner_id: None,
            payment_method: method,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            vat_cents: totals.vat.cents(),
            total_cents: totals.total.cents(),
            status: InvoiceStatus::Posted,
            journal_entry_id: None,
            issued_at: Utc::now(),
            lines: vec![],
        }
    }

    #[test]
    fn test_exclusive_totals_with_discount() {
        let totals = invoice_totals(cents(10000), cents(1000), &Settings::default()).unwrap();
        assert_eq!(totals.net.cents(), 9000);
        assert_eq!(totals.vat.cents(), 1350);
        assert_eq!(totals.total.cents(), 10350);
    }

    #[test]
    fn test_inclusive_totals() {
        let settings = Settings {
            prices_include_vat: true,
            ..Settings::default()
        };
        let totals = invoice_totals(cents(11500), Money::zero(), &settings).unwrap();
        assert_eq!(totals.total.cents(), 11500);
        assert_eq!(totals.vat.cents(), 1500);
        assert_eq!(totals.net.cents(), 10000);
    }

    #[test]
    fn test_discount_bounds() {
        let s = Settings::default();
        assert!(invoice_totals(cents(1000), cents(-1), &s).is_err());
        assert!(invoice_totals(cents(1000), cents(1001), &s).is_err());
        assert!(invoice_totals(cents(1000), cents(999), &s).is_ok());
    }

    #[test]
    fn test_full_discount_is_rejected() {
        let s = Settings::default();
        let err = invoice_totals(cents(1000), cents(1000), &s).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: discount must be between 0 and 999");

        let inclusive = Settings {
            prices_include_vat: true,
            ..Settings::default()
        };
        assert!(invoice_totals(cents(1000), cents(1000), &inclusive).is_err());
        assert!(matches!(
            invoice_totals(Money::zero(), Money::zero(), &s),
            Err(CoreError::ZeroEntry)
        ));
    }

    #[test]
    fn test_invoice_journal_balances_for_every_method() {
        let totals = invoice_totals(cents(2390), Money::zero(), &Settings::default()).unwrap();
        for (method, account) in [
            (PaymentMethod::Cash, "1110"),
            (PaymentMethod::Card, "1120"),
            (PaymentMethod::Credit, "1200"),
        ] {
            let draft = invoice_journal(&invoice(method, totals));
            assert!(draft.validate().is_ok());
            assert_eq!(draft.lines[0].account, AccountKey::from(account));
            assert_eq!(draft.lines[0].debit, totals.total);
            assert_eq!(draft.reference, EntryReference::Invoice(7));
        }
    }

    #[test]
    fn test_zero_vat_invoice_has_two_lines() {
        let settings = Settings {
            vat_rate_bps: 0,
            ..Settings::default()
        };
        let totals = invoice_totals(cents(5000), Money::zero(), &settings).unwrap();
        let draft = invoice_journal(&invoice(PaymentMethod::Cash, totals));
        assert_eq!(draft.lines.len(), 2);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_expense_journal() {
        let amount = cents(20000);
        let vat = expense_vat(amount, None, Rate::from_bps(1500)).unwrap();
        let expense = Expense {
            id: 11,
            branch: "main".to_string(),
            partner_id: Some(2),
            expense_account_id: 55,
            description: "Gas bottles".to_string(),
            amount_cents: amount.cents(),
            vat_cents: vat.cents(),
            total_cents: (amount + vat).cents(),
            payment_method: PaymentMethod::Credit,
            expense_date: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
            status: ExpenseStatus::Draft,
            journal_entry_id: None,
            created_at: Utc::now(),
        };
        let draft = expense_journal(&expense);
        assert!(draft.validate().is_ok());
        assert_eq!(draft.lines[0].account, AccountKey::Id(55));
        assert_eq!(draft.lines[1].account, AccountKey::from("2120"));
        assert_eq!(draft.lines[2].account, AccountKey::from("2400"));
        assert_eq!(draft.lines[2].credit.cents(), 23000);
    }

    #[test]
    fn test_expense_vat_explicit_wins() {
        let vat = expense_vat(cents(1000), Some(cents(0)), Rate::from_bps(1500)).unwrap();
        assert!(vat.is_zero());
        assert!(expense_vat(cents(1000), Some(cents(-1)), Rate::from_bps(1500)).is_err());
    }

    #[test]
    fn test_payslip_with_gosi() {
        let slip = compute_payslip(
            PayslipInput {
                basic: cents(400000),
                allowances: cents(100000),
                deductions: cents(5000),
                gosi_enrolled: true,
            },
            &Settings::default(),
        )
        .unwrap();
        assert_eq!(slip.gross.cents(), 495000);
        assert_eq!(slip.gosi_employee.cents(), 48750);
        assert_eq!(slip.gosi_employer.cents(), 58750);
        assert_eq!(slip.net.cents(), 446250);
    }

    #[test]
    fn test_payslip_without_gosi() {
        let slip = compute_payslip(
            PayslipInput {
                basic: cents(300000),
                allowances: Money::zero(),
                deductions: Money::zero(),
                gosi_enrolled: false,
            },
            &Settings::default(),
        )
        .unwrap();
        assert!(slip.gosi_employee.is_zero());
        assert_eq!(slip.net, slip.gross);
    }

    #[test]
    fn test_payslip_rejects_excessive_deductions() {
        let result = compute_payslip(
            PayslipInput {
                basic: cents(1000),
                allowances: Money::zero(),
                deductions: cents(2000),
                gosi_enrolled: false,
            },
            &Settings::default(),
        );
        assert!(result.is_err());
    }

    fn run_with(items: Vec<PayrollItem>) -> PayrollRun {
        PayrollRun {
            id: 4,
            period: "2026-09".to_string(),
            branch: "main".to_string(),
            status: PayrollStatus::Draft,
            journal_entry_id: None,
            payment_entry_id: None,
            created_at: Utc::now(),
            items,
        }
    }

    fn item(employee_id: i64, slip: &Payslip, basic: i64) -> PayrollItem {
        PayrollItem {
            id: employee_id,
            run_id: 4,
            employee_id,
            employee_name: format!("Employee {}", employee_id),
            basic_cents: basic,
            allowances_cents: slip.gross.cents() - basic,
            deductions_cents: 0,
            gosi_employee_cents: slip.gosi_employee.cents(),
            gosi_employer_cents: slip.gosi_employer.cents(),
            net_cents: slip.net.cents(),
        }
    }

    #[test]
    fn test_payroll_journals_balance() {
        let settings = Settings::default();
        let a = compute_payslip(
            PayslipInput {
                basic: cents(400000),
                allowances: cents(100000),
                deductions: Money::zero(),
                gosi_enrolled: true,
            },
            &settings,
        )
        .unwrap();
        let b = compute_payslip(
            PayslipInput {
                basic: cents(333333),
                allowances: Money::zero(),
                deductions: Money::zero(),
                gosi_enrolled: true,
            },
            &settings,
        )
        .unwrap();
        let run = run_with(vec![item(1, &a, 400000), item(2, &b, 333333)]);

        let accrual = payroll_accrual_journal(&run).unwrap();
        assert!(accrual.validate().is_ok());
        assert_eq!(accrual.reference, EntryReference::Payroll(4));

        let payment = payroll_payment_journal(&run);
        assert!(payment.validate().is_ok());
        assert_eq!(payment.total_debit(), run.total_net());
    }

    #[test]
    fn test_empty_payroll_cannot_accrue() {
        assert!(payroll_accrual_journal(&run_with(vec![])).is_err());
    }
}

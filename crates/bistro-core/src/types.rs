//! # Domain Types
//!
//! Core domain types used throughout Bistro ERP.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Accounting                 POS                     Business records    │
//! │  ──────────                 ───                     ────────────────    │
//! │  Account ◄─┐ parent_id      Product                 Partner             │
//! │     │      └──────┘         Order ──► OrderItem     Employee            │
//! │     │                         │                     Expense             │
//! │  JournalPosting               ▼                     PayrollRun          │
//! │     │                       Invoice ──► InvoiceLine   └─► PayrollItem   │
//! │     ▼                                                                   │
//! │  JournalEntry ──► EntryReference { Expense | Invoice | Payroll | ... }  │
//! │                                                                         │
//! │  Access: User, Role, Permission          Config: Branch, Settings      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Amounts
//! Persisted amounts are `*_cents: i64` fields (minor units) mirroring the
//! database columns; accessor methods wrap them in [`Money`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

/// Declares `as_str`, `Display` and case-insensitive `FromStr` for an enum
/// persisted as lowercase text.
macro_rules! text_enum {
    ($name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every accepted textual form, in declaration order.
            pub const ALL: &'static [&'static str] = &[$($text),+];

            /// Returns the stored/serialized form.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ValidationError::not_allowed($field, $name::ALL)),
                }
            }
        }
    };
}

// =============================================================================
// Rate
// =============================================================================

/// A percentage rate in basis points (bps).
///
/// 1 basis point = 0.01%, so 1500 bps = 15% (Saudi VAT) and
/// 975 bps = 9.75% (GOSI employee share).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        Rate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

// =============================================================================
// Branch
// =============================================================================

/// A physical location / till context partitioning orders and accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Branch {
    /// Stable code used in URLs and storage keys (e.g. `china_town`).
    pub code: String,
    pub name: String,
    pub is_default: bool,
}

// =============================================================================
// Chart of Accounts
// =============================================================================

/// Classification of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

text_enum!(AccountType, "account_type", {
    Asset => "asset",
    Liability => "liability",
    Equity => "equity",
    Revenue => "revenue",
    Expense => "expense",
});

impl AccountType {
    /// The side on which balances of this type normally increase.
    pub const fn natural_nature(&self) -> AccountNature {
        match self {
            AccountType::Asset | AccountType::Expense => AccountNature::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                AccountNature::Credit
            }
        }
    }
}

/// Normal balance side of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AccountNature {
    Debit,
    Credit,
}

text_enum!(AccountNature, "nature", {
    Debit => "debit",
    Credit => "credit",
});

impl AccountNature {
    /// Signed balance movement of a posting for an account of this nature.
    pub fn signed(&self, debit: Money, credit: Money) -> Money {
        match self {
            AccountNature::Debit => debit - credit,
            AccountNature::Credit => credit - debit,
        }
    }
}

/// A node of the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Account {
    pub id: i64,
    /// Unique business code, e.g. `2130`.
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub nature: AccountNature,
    /// Parent in the account tree; `None` for top-level groups.
    pub parent_id: Option<i64>,
    pub opening_balance_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Account {
    #[inline]
    pub fn opening_balance(&self) -> Money {
        Money::from_cents(self.opening_balance_cents)
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Lifecycle of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Editable, not yet part of the books.
    #[default]
    Draft,
    /// Part of the books; immutable.
    Posted,
}

text_enum!(EntryStatus, "status", {
    Draft => "draft",
    Posted => "posted",
});

/// The business document a journal entry originates from.
///
/// Stored as `reference_type` / `reference_id` columns; each variant is
/// resolved through its own lookup rather than a duck-typed join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntryReference {
    /// Entered by hand, no source document.
    #[default]
    Manual,
    Expense(i64),
    Invoice(i64),
    /// Payroll accrual for a run.
    Payroll(i64),
    /// Salary payment for a run.
    PayrollPayment(i64),
    /// Reversal of another journal entry.
    Reversal(i64),
}

impl EntryReference {
    /// The `reference_type` column value, `None` for manual entries.
    pub const fn reference_type(&self) -> Option<&'static str> {
        match self {
            EntryReference::Manual => None,
            EntryReference::Expense(_) => Some("expense"),
            EntryReference::Invoice(_) => Some("invoice"),
            EntryReference::Payroll(_) => Some("payroll"),
            EntryReference::PayrollPayment(_) => Some("payroll_payment"),
            EntryReference::Reversal(_) => Some("reversal"),
        }
    }

    /// The `reference_id` column value, `None` for manual entries.
    pub const fn reference_id(&self) -> Option<i64> {
        match self {
            EntryReference::Manual => None,
            EntryReference::Expense(id)
            | EntryReference::Invoice(id)
            | EntryReference::Payroll(id)
            | EntryReference::PayrollPayment(id)
            | EntryReference::Reversal(id) => Some(*id),
        }
    }

    /// Rebuilds a reference from its stored columns.
    pub fn from_parts(
        reference_type: Option<&str>,
        reference_id: Option<i64>,
    ) -> Result<Self, ValidationError> {
        match (reference_type, reference_id) {
            (None, _) => Ok(EntryReference::Manual),
            (Some(kind), Some(id)) => match kind {
                "expense" => Ok(EntryReference::Expense(id)),
                "invoice" => Ok(EntryReference::Invoice(id)),
                "payroll" => Ok(EntryReference::Payroll(id)),
                "payroll_payment" => Ok(EntryReference::PayrollPayment(id)),
                "reversal" => Ok(EntryReference::Reversal(id)),
                _ => Err(ValidationError::not_allowed(
                    "reference_type",
                    &["expense", "invoice", "payroll", "payroll_payment", "reversal"],
                )),
            },
            (Some(_), None) => Err(ValidationError::Required {
                field: "reference_id".to_string(),
            }),
        }
    }
}

/// One debit or credit line of a journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JournalPosting {
    pub id: i64,
    pub entry_id: i64,
    pub account_id: i64,
    pub account_code: String,
    pub account_name: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub memo: Option<String>,
}

impl JournalPosting {
    #[inline]
    pub fn debit(&self) -> Money {
        Money::from_cents(self.debit_cents)
    }

    #[inline]
    pub fn credit(&self) -> Money {
        Money::from_cents(self.credit_cents)
    }
}

/// A dated accounting record composed of balanced postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct JournalEntry {
    pub id: i64,
    /// Unique human-readable number, e.g. `JE-20261019-000042`.
    pub entry_number: String,
    pub description: String,
    #[ts(as = "String")]
    pub entry_date: NaiveDate,
    pub reference: EntryReference,
    pub branch: String,
    pub status: EntryStatus,
    #[ts(as = "Option<String>")]
    pub posted_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    pub postings: Vec<JournalPosting>,
}

impl JournalEntry {
    pub fn total_debit(&self) -> Money {
        self.postings.iter().map(JournalPosting::debit).sum()
    }

    pub fn total_credit(&self) -> Money {
        self.postings.iter().map(JournalPosting::credit).sum()
    }

    /// The accounting identity: debits equal credits.
    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }
}

// =============================================================================
// Products
// =============================================================================

/// A sellable menu item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// POS Orders
// =============================================================================

/// Status of a POS order. Transitions live in [`crate::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Has items, persisted, table not yet marked occupied.
    #[default]
    Draft,
    /// Table occupied, order open for more items.
    Open,
    /// Table occupied and being served.
    Busy,
    /// Invoice issued.
    Closed,
    /// Abandoned without an invoice.
    Cancelled,
}

text_enum!(OrderStatus, "status", {
    Draft => "draft",
    Open => "open",
    Busy => "busy",
    Closed => "closed",
    Cancelled => "cancelled",
});

/// A line on a POS order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_no: i32,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// A POS order for one table in one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: i64,
    pub branch: String,
    pub table_number: String,
    pub status: OrderStatus,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub invoice_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Always populated by the repository layer.
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Invoices
// =============================================================================

/// How a document was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    /// Card terminal; settles to the bank account.
    Card,
    /// Bank transfer.
    Bank,
    /// On account: receivable for invoices, payable for expenses.
    Credit,
}

text_enum!(PaymentMethod, "payment_method", {
    Cash => "cash",
    Card => "card",
    Bank => "bank",
    Credit => "credit",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Posted,
    Cancelled,
}

text_enum!(InvoiceStatus, "status", {
    Posted => "posted",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceLine {
    pub id: i64,
    pub invoice_id: i64,
    pub product_id: Option<i64>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

/// A sales invoice, usually issued from a POS order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: String,
    pub branch: String,
    pub order_id: Option<i64>,
    pub partner_id: Option<i64>,
    pub payment_method: PaymentMethod,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,
    pub status: InvoiceStatus,
    pub journal_entry_id: Option<i64>,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<InvoiceLine>,
}

// =============================================================================
// Partners & Employees
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PartnerType {
    Customer,
    Supplier,
    Both,
}

text_enum!(PartnerType, "partner_type", {
    Customer => "customer",
    Supplier => "supplier",
    Both => "both",
});

/// Active/inactive flag shared by partners and employees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

text_enum!(RecordStatus, "status", {
    Active => "active",
    Inactive => "inactive",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub partner_type: PartnerType,
    pub vat_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub branch: Option<String>,
    pub status: RecordStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Employee {
    pub id: i64,
    pub employee_number: String,
    pub full_name: String,
    pub branch: String,
    pub basic_salary_cents: i64,
    pub allowances_cents: i64,
    /// Whether GOSI contributions are withheld for this employee.
    pub gosi_enrolled: bool,
    pub status: RecordStatus,
    #[ts(as = "Option<String>")]
    pub hired_on: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Expenses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseStatus {
    #[default]
    Draft,
    Posted,
}

text_enum!(ExpenseStatus, "status", {
    Draft => "draft",
    Posted => "posted",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: i64,
    pub branch: String,
    pub partner_id: Option<i64>,
    pub expense_account_id: i64,
    pub description: String,
    /// Net amount before VAT.
    pub amount_cents: i64,
    pub vat_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub status: ExpenseStatus,
    pub journal_entry_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payroll
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PayrollStatus {
    #[default]
    Draft,
    /// Accrual posted to the ledger.
    Posted,
    /// Salaries paid out.
    Paid,
}

text_enum!(PayrollStatus, "status", {
    Draft => "draft",
    Posted => "posted",
    Paid => "paid",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayrollItem {
    pub id: i64,
    pub run_id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub basic_cents: i64,
    pub allowances_cents: i64,
    pub deductions_cents: i64,
    pub gosi_employee_cents: i64,
    pub gosi_employer_cents: i64,
    pub net_cents: i64,
}

impl PayrollItem {
    /// Gross pay: basic + allowances - deductions.
    pub fn gross(&self) -> Money {
        Money::from_cents(self.basic_cents + self.allowances_cents - self.deductions_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PayrollRun {
    pub id: i64,
    /// Pay period, `YYYY-MM`.
    pub period: String,
    pub branch: String,
    pub status: PayrollStatus,
    pub journal_entry_id: Option<i64>,
    pub payment_entry_id: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub items: Vec<PayrollItem>,
}

impl PayrollRun {
    pub fn total_net(&self) -> Money {
        self.items.iter().map(|i| Money::from_cents(i.net_cents)).sum()
    }
}

// =============================================================================
// Users & Permissions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Bypasses explicit permission checks.
    Admin,
    Manager,
    Cashier,
    Accountant,
}

text_enum!(Role, "role", {
    Admin => "admin",
    Manager => "manager",
    Cashier => "cashier",
    Accountant => "accountant",
});

/// A backend user. The password hash never leaves bistro-db.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub default_branch: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    View,
    Create,
    Edit,
    Delete,
}

text_enum!(PermissionAction, "action", {
    View => "view",
    Create => "create",
    Edit => "edit",
    Delete => "delete",
});

/// One explicit grant or denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Permission {
    /// Screen identifier, e.g. `journal`, `pos`, `payroll`.
    pub screen: String,
    pub branch: String,
    pub action: PermissionAction,
    pub allowed: bool,
}

// =============================================================================
// Settings
// =============================================================================

/// Typed view over the key/value settings table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct Settings {
    pub company_name: String,
    pub vat_number: Option<String>,
    pub vat_rate_bps: u32,
    /// Menu prices already include VAT.
    pub prices_include_vat: bool,
    pub gosi_employee_rate_bps: u32,
    pub gosi_employer_rate_bps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            company_name: "Bistro".to_string(),
            vat_number: None,
            vat_rate_bps: crate::DEFAULT_VAT_RATE_BPS,
            prices_include_vat: false,
            gosi_employee_rate_bps: crate::DEFAULT_GOSI_EMPLOYEE_RATE_BPS,
            gosi_employer_rate_bps: crate::DEFAULT_GOSI_EMPLOYER_RATE_BPS,
        }
    }
}

impl Settings {
    pub fn vat_rate(&self) -> Rate {
        Rate::from_bps(self.vat_rate_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_from_percentage() {
        let rate = Rate::from_percentage(9.75);
        assert_eq!(rate.bps(), 975);
        assert!((rate.percentage() - 9.75).abs() < 0.001);
    }

    #[test]
    fn test_account_type_nature() {
        assert_eq!(AccountType::Asset.natural_nature(), AccountNature::Debit);
        assert_eq!(AccountType::Expense.natural_nature(), AccountNature::Debit);
        assert_eq!(AccountType::Liability.natural_nature(), AccountNature::Credit);
        assert_eq!(AccountType::Revenue.natural_nature(), AccountNature::Credit);
    }

    #[test]
    fn test_text_enum_parsing_is_case_insensitive() {
        assert_eq!("DRAFT".parse::<OrderStatus>().unwrap(), OrderStatus::Draft);
        assert_eq!(" Open ".parse::<OrderStatus>().unwrap(), OrderStatus::Open);
        assert!("pending".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_entry_reference_round_trip_through_columns() {
        let refs = [
            EntryReference::Manual,
            EntryReference::Expense(7),
            EntryReference::Invoice(12),
            EntryReference::Payroll(3),
            EntryReference::PayrollPayment(3),
            EntryReference::Reversal(99),
        ];
        for r in refs {
            let rebuilt =
                EntryReference::from_parts(r.reference_type(), r.reference_id()).unwrap();
            assert_eq!(rebuilt, r);
        }
    }

    #[test]
    fn test_entry_reference_rejects_unknown_type() {
        assert!(EntryReference::from_parts(Some("voucher"), Some(1)).is_err());
        assert!(EntryReference::from_parts(Some("invoice"), None).is_err());
    }

    #[test]
    fn test_entry_reference_json_shape() {
        let json = serde_json::to_value(EntryReference::Invoice(5)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "invoice", "id": 5}));
        let json = serde_json::to_value(EntryReference::Manual).unwrap();
        assert_eq!(json, serde_json::json!({"type": "manual"}));
    }

    #[test]
    fn test_nature_signed_balance() {
        let d = Money::from_cents(500);
        let c = Money::from_cents(200);
        assert_eq!(AccountNature::Debit.signed(d, c).cents(), 300);
        assert_eq!(AccountNature::Credit.signed(d, c).cents(), -300);
    }

    #[test]
    fn test_settings_defaults() {
        let s = Settings::default();
        assert_eq!(s.vat_rate().bps(), 1500);
        assert!(!s.prices_include_vat);
        let partial: Settings = serde_json::from_str(r#"{"vat_rate_bps": 500}"#).unwrap();
        assert_eq!(partial.vat_rate_bps, 500);
        assert_eq!(partial.gosi_employee_rate_bps, 975);
    }
}

//! # Chart of Accounts
//!
//! The required account list, tree assembly and cycle detection.
//!
//! ## Required Chart
//! ```text
//! 1000 Assets                 2000 Liabilities              3000 Equity
//! ├── 1110 Cash               ├── 2100 Taxes                └── 3100 Capital
//! ├── 1120 Bank               │   ├── 2110 Output VAT
//! └── 1200 Receivables        │   ├── 2120 Input VAT        4000 Revenue
//!                             │   ├── 2130 VAT Settlement   └── 4100 Sales
//!                             │   └── 2140 VAT Payable
//!                             ├── 2400 Accounts Payable     5000 Expenses
//!                             ├── 2430 Accrued Salaries     ├── 5100 Cost of Sales
//!                             └── 2431 GOSI Payable         ├── 5200 Salaries
//!                                                           ├── 5210 GOSI Expense
//!                                                           └── 5300 General Expenses
//! ```
//!
//! Provisioning walks [`REQUIRED_ACCOUNTS`] in order, so every parent is
//! ensured before its children.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::{Account, AccountType};

// =============================================================================
// Required Accounts
// =============================================================================

/// An account the ledger cannot work without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredAccount {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub parent_code: Option<&'static str>,
}

const fn req(
    code: &'static str,
    name: &'static str,
    account_type: AccountType,
    parent_code: Option<&'static str>,
) -> RequiredAccount {
    RequiredAccount {
        code,
        name,
        account_type,
        parent_code,
    }
}

pub const CASH: &str = "1110";
pub const BANK: &str = "1120";
pub const RECEIVABLES: &str = "1200";
pub const OUTPUT_VAT: &str = "2110";
pub const INPUT_VAT: &str = "2120";
pub const VAT_SETTLEMENT: &str = "2130";
pub const VAT_PAYABLE: &str = "2140";
pub const ACCOUNTS_PAYABLE: &str = "2400";
pub const ACCRUED_SALARIES: &str = "2430";
pub const GOSI_PAYABLE: &str = "2431";
pub const SALES: &str = "4100";
pub const SALARIES_EXPENSE: &str = "5200";
pub const GOSI_EXPENSE: &str = "5210";
pub const GENERAL_EXPENSES: &str = "5300";

/// Parents precede children.
pub const REQUIRED_ACCOUNTS: &[RequiredAccount] = &[
    req("1000", "Assets", AccountType::Asset, None),
    req("2000", "Liabilities", AccountType::Liability, None),
    req("3000", "Equity", AccountType::Equity, None),
    req("4000", "Revenue", AccountType::Revenue, None),
    req("5000", "Expenses", AccountType::Expense, None),
    req(CASH, "Cash", AccountType::Asset, Some("1000")),
    req(BANK, "Bank", AccountType::Asset, Some("1000")),
    req(RECEIVABLES, "Accounts Receivable", AccountType::Asset, Some("1000")),
    req("2100", "Taxes", AccountType::Liability, Some("2000")),
    req(OUTPUT_VAT, "Output VAT", AccountType::Liability, Some("2100")),
    req(INPUT_VAT, "Input VAT", AccountType::Liability, Some("2100")),
    req(VAT_SETTLEMENT, "VAT Settlement", AccountType::Liability, Some("2100")),
    req(VAT_PAYABLE, "VAT Payable", AccountType::Liability, Some("2100")),
    req(ACCOUNTS_PAYABLE, "Accounts Payable", AccountType::Liability, Some("2000")),
    req(ACCRUED_SALARIES, "Accrued Salaries", AccountType::Liability, Some("2000")),
    req(GOSI_PAYABLE, "GOSI Payable", AccountType::Liability, Some("2000")),
    req("3100", "Capital", AccountType::Equity, Some("3000")),
    req(SALES, "Sales", AccountType::Revenue, Some("4000")),
    req("5100", "Cost of Sales", AccountType::Expense, Some("5000")),
    req(SALARIES_EXPENSE, "Salaries", AccountType::Expense, Some("5000")),
    req(GOSI_EXPENSE, "GOSI Expense", AccountType::Expense, Some("5000")),
    req(GENERAL_EXPENSES, "General Expenses", AccountType::Expense, Some("5000")),
];

/// Looks up a required account by code.
pub fn required_account(code: &str) -> Option<&'static RequiredAccount> {
    REQUIRED_ACCOUNTS.iter().find(|a| a.code == code)
}

// =============================================================================
// Tree
// =============================================================================

/// An account with its children, for the tree view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountNode {
    #[serde(flatten)]
    pub account: Account,
    pub children: Vec<AccountNode>,
}

/// Assembles accounts into a forest ordered by code.
///
/// Accounts whose parent is missing from `accounts` become roots; use
/// [`find_orphans`] to report them. Accounts caught in a cycle are left
/// out, since no root reaches them.
pub fn build_tree(accounts: &[Account]) -> Vec<AccountNode> {
    let ids: HashSet<i64> = accounts.iter().map(|a| a.id).collect();
    let mut children: HashMap<Option<i64>, Vec<&Account>> = HashMap::new();

    for account in accounts {
        let parent = account.parent_id.filter(|p| ids.contains(p));
        children.entry(parent).or_default().push(account);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.code.cmp(&b.code));
    }

    fn attach(
        account: &Account,
        children: &HashMap<Option<i64>, Vec<&Account>>,
        seen: &mut HashSet<i64>,
    ) -> AccountNode {
        seen.insert(account.id);
        let mut kids = Vec::new();
        if let Some(list) = children.get(&Some(account.id)) {
            for child in list {
                if !seen.contains(&child.id) {
                    kids.push(attach(child, children, seen));
                }
            }
        }
        AccountNode {
            account: account.clone(),
            children: kids,
        }
    }

    let mut seen = HashSet::new();
    let mut forest = Vec::new();
    if let Some(roots) = children.get(&None) {
        for root in roots {
            forest.push(attach(root, &children, &mut seen));
        }
    }
    forest
}

/// Accounts whose `parent_id` points at an account that does not exist.
pub fn find_orphans(accounts: &[Account]) -> Vec<&Account> {
    let ids: HashSet<i64> = accounts.iter().map(|a| a.id).collect();
    accounts
        .iter()
        .filter(|a| a.parent_id.is_some_and(|p| !ids.contains(&p)))
        .collect()
}

// =============================================================================
// Cycles
// =============================================================================

/// Would setting `account_id`'s parent to `new_parent` create a cycle?
///
/// `parents` maps every account id to its current parent. Walks up from
/// the proposed parent; reaching `account_id` means the account would
/// become its own ancestor.
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use bistro_core::chart::would_create_cycle;
///
/// // 1 ── 2 ── 3
/// let parents = HashMap::from([(1, None), (2, Some(1)), (3, Some(2))]);
/// assert!(would_create_cycle(&parents, 1, 3));
/// assert!(!would_create_cycle(&parents, 3, 1));
/// ```
pub fn would_create_cycle(
    parents: &HashMap<i64, Option<i64>>,
    account_id: i64,
    new_parent: i64,
) -> bool {
    let mut current = Some(new_parent);
    let mut steps = 0usize;

    while let Some(id) = current {
        if id == account_id {
            return true;
        }
        steps += 1;
        if steps > parents.len() {
            // Existing cycle above the new parent.
            return true;
        }
        current = parents.get(&id).copied().flatten();
    }
    false
}

/// Ids of every account that sits on a parent cycle.
pub fn find_cycles(parents: &HashMap<i64, Option<i64>>) -> Vec<i64> {
    let mut on_cycle: HashSet<i64> = HashSet::new();
    let mut cleared: HashSet<i64> = HashSet::new();

    for &start in parents.keys() {
        if cleared.contains(&start) || on_cycle.contains(&start) {
            continue;
        }
        let mut path: Vec<i64> = Vec::new();
        let mut index: HashMap<i64, usize> = HashMap::new();
        let mut current = Some(start);

        while let Some(id) = current {
            if cleared.contains(&id) || on_cycle.contains(&id) {
                break;
            }
            if let Some(&pos) = index.get(&id) {
                on_cycle.extend(path[pos..].iter().copied());
                break;
            }
            index.insert(id, path.len());
            path.push(id);
            current = parents.get(&id).copied().flatten();
        }

        for id in path {
            if !on_cycle.contains(&id) {
                cleared.insert(id);
            }
        }
    }

    let mut ids: Vec<i64> = on_cycle.into_iter().collect();
    ids.sort_unstable();
    ids
}

// =============================================================================
// Unit Tests
// =============================================================================

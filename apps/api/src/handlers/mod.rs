//! HTTP handlers, one module per screen.
//!
//! Every handler except `health` and `auth::login` takes an
//! [`AuthUser`](crate::auth::AuthUser) and checks a permission before
//! touching the database. Records that belong to a branch are checked
//! against their own branch; branchless screens (accounts, products,
//! settings) against the caller's default branch.
//!
//! List filters without a branch are pinned to the caller's default branch
//! for everyone but admins, so the branch that was checked is the branch
//! that gets queried:
//!
//! ```text
//! GET /api/orders               cashier@china_town → branch = china_town
//! GET /api/orders?branch=main   cashier@china_town → checked against main
//! GET /api/orders               admin              → every branch
//! ```

pub mod accounts;
pub mod auth;
pub mod branches;
pub mod employees;
pub mod expenses;
pub mod health;
pub mod invoices;
pub mod journal;
pub mod orders;
pub mod partners;
pub mod payroll;
pub mod pos;
pub mod products;
pub mod reports;
pub mod settings;
pub mod users;

/// Branch a list request is checked against: the filter's, else the caller's.
///
/// A missing filter branch is filled in with the caller's default branch
/// unless the caller is an admin.
pub(crate) fn scope_branch(branch: &mut Option<String>, auth: &crate::auth::AuthUser) -> String {
    if let Some(requested) = branch {
        return requested.clone();
    }
    if !auth.is_admin() {
        *branch = Some(auth.branch.clone());
    }
    auth.branch.clone()
}

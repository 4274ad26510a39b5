//! # Maintenance
//!
//! Provisioning and ledger diagnostics behind `bistro-admin`.
//!
//! ## provision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. default branch        BranchRepository::ensure_default              │
//! │  2. required accounts     AccountRepository::ensure_required            │
//! │  3. bootstrap admin       UserRepository::ensure_admin (optional)       │
//! │                                                                         │
//! │  Every step is idempotent: running provision twice changes nothing    │
//! │  the second time.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tracing::{info, warn};

use bistro_core::chart;

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::account::{EnsureOutcome, EnsuredAccount};

/// Inputs for [`provision`].
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub branch_code: String,
    pub branch_name: String,
    /// `(email, password)` of the bootstrap admin.
    pub admin: Option<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub branch_created: bool,
    pub accounts: Vec<EnsuredAccount>,
    pub admin_created: bool,
}

impl ProvisionReport {
    pub fn count(&self, outcome: EnsureOutcome) -> usize {
        self.accounts.iter().filter(|a| a.outcome == outcome).count()
    }
}

/// Ensures the default branch, the required chart and the admin user.
pub async fn provision(db: &Database, options: &ProvisionOptions) -> DbResult<ProvisionReport> {
    let branch_created = db
        .branches()
        .ensure_default(&options.branch_code, &options.branch_name)
        .await?;

    let accounts = db.accounts().ensure_required().await?;

    let admin_created = match &options.admin {
        Some((email, password)) => {
            db.users()
                .ensure_admin(email, password, &options.branch_code)
                .await?
        }
        None => false,
    };

    let report = ProvisionReport {
        branch_created,
        accounts,
        admin_created,
    };
    info!(
        branch_created,
        created = report.count(EnsureOutcome::Created),
        reparented = report.count(EnsureOutcome::Reparented),
        admin_created,
        "Provisioning complete"
    );
    Ok(report)
}

// =============================================================================
// Ledger check
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UnbalancedEntry {
    pub entry_number: String,
    pub debit_cents: i64,
    pub credit_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanAccount {
    pub code: String,
    pub parent_id: i64,
}

/// Findings of [`check_ledger`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerReport {
    pub unbalanced: Vec<UnbalancedEntry>,
    pub orphans: Vec<OrphanAccount>,
    /// Account ids on a parent cycle.
    pub cycles: Vec<i64>,
    /// Required account codes not present.
    pub missing_required: Vec<String>,
}

impl LedgerReport {
    pub fn is_clean(&self) -> bool {
        self.unbalanced.is_empty()
            && self.orphans.is_empty()
            && self.cycles.is_empty()
            && self.missing_required.is_empty()
    }
}

/// Checks posted entries balance and the account tree is well formed.
pub async fn check_ledger(db: &Database) -> DbResult<LedgerReport> {
    let unbalanced = db
        .journal()
        .unbalanced_posted()
        .await?
        .into_iter()
        .map(|(entry_number, debit_cents, credit_cents)| UnbalancedEntry {
            entry_number,
            debit_cents,
            credit_cents,
        })
        .collect::<Vec<_>>();

    let accounts = db.accounts().list().await?;
    let orphans = chart::find_orphans(&accounts)
        .into_iter()
        .filter_map(|a| {
            a.parent_id.map(|parent_id| OrphanAccount {
                code: a.code.clone(),
                parent_id,
            })
        })
        .collect::<Vec<_>>();

    let cycles = chart::find_cycles(&db.accounts().parent_map().await?);

    let missing_required = chart::REQUIRED_ACCOUNTS
        .iter()
        .filter(|req| !accounts.iter().any(|a| a.code == req.code))
        .map(|req| req.code.to_string())
        .collect::<Vec<_>>();

    let report = LedgerReport {
        unbalanced,
        orphans,
        cycles,
        missing_required,
    };
    if report.is_clean() {
        info!(accounts = accounts.len(), "Ledger check passed");
    } else {
        warn!(
            unbalanced = report.unbalanced.len(),
            orphans = report.orphans.len(),
            cycles = report.cycles.len(),
            missing = report.missing_required.len(),
            "Ledger check found problems"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_is_clean() {
        assert!(LedgerReport::default().is_clean());
    }

    #[test]
    fn test_any_finding_is_not_clean() {
        let report = LedgerReport {
            cycles: vec![4, 7],
            ..LedgerReport::default()
        };
        assert!(!report.is_clean());
    }

    #[test]
    fn test_provision_report_counts() {
        let report = ProvisionReport {
            branch_created: true,
            accounts: vec![
                EnsuredAccount {
                    code: "1000".into(),
                    id: 1,
                    outcome: EnsureOutcome::Created,
                },
                EnsuredAccount {
                    code: "1110".into(),
                    id: 2,
                    outcome: EnsureOutcome::Unchanged,
                },
            ],
            admin_created: false,
        };
        assert_eq!(report.count(EnsureOutcome::Created), 1);
        assert_eq!(report.count(EnsureOutcome::Reparented), 0);
    }
}

//! # Permissions
//!
//! Screen / branch / action permission evaluation.
//!
//! ```text
//! allows(screen, branch, action)
//!   │
//!   ├── role == admin ───────────────────────────► ✅
//!   ├── grant for (screen, branch, action) ──────► its `allowed` flag
//!   ├── grant for (screen, "*", action) ─────────► its `allowed` flag
//!   └── nothing matches ─────────────────────────► ❌ (deny by default)
//! ```

use serde::Serialize;

use crate::types::{Permission, PermissionAction, Role};

/// Branch value matching every branch in a grant.
pub const ANY_BRANCH: &str = "*";

/// Every screen a permission can name.
pub const SCREENS: &[&str] = &[
    "accounts", "journal", "products", "pos", "orders", "invoices", "expenses", "partners",
    "employees", "payroll", "reports", "settings", "users",
];

/// A user's role plus their explicit grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSet {
    pub role: Role,
    pub grants: Vec<Permission>,
}

impl PermissionSet {
    pub fn new(role: Role, grants: Vec<Permission>) -> Self {
        PermissionSet { role, grants }
    }

    /// Whether the user may perform `action` on `screen` in `branch`.
    ///
    /// ## Example
    /// ```rust
    /// use bistro_core::permissions::PermissionSet;
    /// use bistro_core::{Permission, PermissionAction, Role};
    ///
    /// let cashier = PermissionSet::new(Role::Cashier, vec![Permission {
    ///     screen: "pos".to_string(),
    ///     branch: "china_town".to_string(),
    ///     action: PermissionAction::Create,
    ///     allowed: true,
    /// }]);
    /// assert!(cashier.allows("pos", "china_town", PermissionAction::Create));
    /// assert!(!cashier.allows("pos", "main", PermissionAction::Create));
    ///
    /// let admin = PermissionSet::new(Role::Admin, vec![]);
    /// assert!(admin.allows("payroll", "main", PermissionAction::Delete));
    /// ```
    pub fn allows(&self, screen: &str, branch: &str, action: PermissionAction) -> bool {
        if self.role == Role::Admin {
            return true;
        }

        let find = |b: &str| {
            self.grants
                .iter()
                .find(|g| g.screen == screen && g.branch == b && g.action == action)
        };

        match find(branch).or_else(|| find(ANY_BRANCH)) {
            Some(grant) => grant.allowed,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(screen: &str, branch: &str, action: PermissionAction, allowed: bool) -> Permission {
        Permission {
            screen: screen.to_string(),
            branch: branch.to_string(),
            action,
            allowed,
        }
    }

    #[test]
    fn test_admin_bypasses_everything() {
        let set = PermissionSet::new(Role::Admin, vec![grant("pos", "main", PermissionAction::View, false)]);
        assert!(set.allows("pos", "main", PermissionAction::View));
        assert!(set.allows("users", "anywhere", PermissionAction::Delete));
    }

    #[test]
    fn test_default_deny() {
        let set = PermissionSet::new(Role::Manager, vec![]);
        assert!(!set.allows("journal", "main", PermissionAction::View));
    }

    #[test]
    fn test_exact_branch_beats_wildcard() {
        let set = PermissionSet::new(
            Role::Accountant,
            vec![
                grant("journal", ANY_BRANCH, PermissionAction::Edit, true),
                grant("journal", "china_town", PermissionAction::Edit, false),
            ],
        );
        assert!(set.allows("journal", "main", PermissionAction::Edit));
        assert!(!set.allows("journal", "china_town", PermissionAction::Edit));
        assert!(!set.allows("journal", "main", PermissionAction::Delete));
    }
}

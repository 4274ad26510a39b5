//! # Routes
//!
//! Canonical route table, legacy aliases and the middleware stack.
//!
//! ## Aliases
//! Older frontend builds call a few endpoints by other names. Each alias is
//! registered with the canonical route's handler, so both paths behave the
//! same. An alias whose target is not a canonical route, or which collides
//! with one, stops the server at startup.
//!
//! ```text
//! /api/pos/issue-invoice        ──► /api/pos/issueInvoice
//! /api/pos/save-draft           ──► /api/pos/saveDraft
//! /api/journal-entries          ──► /api/journal
//! /api/reports/trial_balance    ──► /api/reports/trial-balance
//! ```

use std::collections::HashMap;

use axum::http::{header, Method};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post, put, MethodRouter};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::ApiError;
use crate::handlers::{
    accounts, auth, branches, employees, expenses, health, invoices, journal, orders, partners,
    payroll, pos, products, reports, settings, users,
};
use crate::{rate_limit, security, AppState};

/// A second path serving a canonical route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteAlias {
    pub alias: &'static str,
    pub target: &'static str,
}

pub const ROUTE_ALIASES: &[RouteAlias] = &[
    RouteAlias {
        alias: "/api/pos/issue-invoice",
        target: "/api/pos/issueInvoice",
    },
    RouteAlias {
        alias: "/api/pos/save-draft",
        target: "/api/pos/saveDraft",
    },
    RouteAlias {
        alias: "/api/journal-entries",
        target: "/api/journal",
    },
    RouteAlias {
        alias: "/api/reports/trial_balance",
        target: "/api/reports/trial-balance",
    },
];

/// Route table errors, raised while building the router.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("alias {alias} points to unregistered route {target}")]
    UnknownTarget {
        alias: &'static str,
        target: &'static str,
    },

    #[error("alias {0} shadows a canonical route")]
    Shadowed(&'static str),

    #[error("alias {0} is declared twice")]
    Duplicate(&'static str),
}

/// Every canonical route, path and handlers.
fn canonical_routes() -> Vec<(&'static str, MethodRouter<AppState>)> {
    vec![
        ("/api/health", get(health::health)),
        // Auth
        ("/api/auth/login", post(auth::login)),
        ("/api/auth/me", get(auth::me)),
        ("/api/branches", get(branches::list)),
        // Chart of accounts
        ("/api/accounts", get(accounts::list).post(accounts::create)),
        ("/api/accounts/tree", get(accounts::tree)),
        ("/api/accounts/ensure-required", post(accounts::ensure_required)),
        (
            "/api/accounts/{id}",
            get(accounts::get).put(accounts::update).delete(accounts::delete),
        ),
        ("/api/accounts/{id}/parent", post(accounts::set_parent)),
        // Journal
        ("/api/journal", get(journal::list).post(journal::create)),
        ("/api/journal/{id}", get(journal::get).delete(journal::delete)),
        ("/api/journal/{id}/post", post(journal::post)),
        ("/api/journal/{id}/reverse", post(journal::reverse)),
        ("/api/journal/{id}/source", get(journal::source)),
        // Products
        ("/api/products", get(products::list).post(products::create)),
        ("/api/products/{id}", put(products::update)),
        // Orders & POS
        ("/api/orders", get(orders::list)),
        ("/api/orders/{id}", get(orders::get)),
        ("/api/orders/{id}/status", axum::routing::patch(orders::update_status)),
        ("/api/pos/saveDraft", post(pos::save_draft)),
        ("/api/pos/issueInvoice", post(pos::issue_invoice)),
        ("/api/pos/tables", get(pos::tables)),
        ("/api/invoices", get(invoices::list)),
        ("/api/invoices/{id}", get(invoices::get)),
        // Back office
        ("/api/expenses", get(expenses::list).post(expenses::create)),
        ("/api/expenses/{id}", get(expenses::get)),
        ("/api/expenses/{id}/post", post(expenses::post)),
        ("/api/partners", get(partners::list).post(partners::create)),
        ("/api/partners/{id}", get(partners::get).put(partners::update)),
        ("/api/employees", get(employees::list).post(employees::create)),
        ("/api/employees/{id}", get(employees::get).put(employees::update)),
        ("/api/payroll", get(payroll::list).post(payroll::create)),
        ("/api/payroll/{id}", get(payroll::get)),
        ("/api/payroll/{id}/post", post(payroll::post)),
        ("/api/payroll/{id}/pay", post(payroll::pay)),
        ("/api/settings", get(settings::get).put(settings::update)),
        // Users
        ("/api/users", get(users::list).post(users::create)),
        ("/api/users/{id}/active", put(users::set_active)),
        (
            "/api/users/{id}/permissions",
            get(users::permissions).put(users::set_permissions),
        ),
        // Reports
        ("/api/reports/trial-balance", get(reports::trial_balance)),
        ("/api/reports/account-statement/{id}", get(reports::account_statement)),
        ("/api/reports/vat-summary", get(reports::vat_summary)),
        ("/api/reports/sales-summary", get(reports::sales_summary)),
    ]
}

/// Checks an alias table against the registered paths.
pub fn validate_aliases(aliases: &[RouteAlias], registered: &[&str]) -> Result<(), RouteError> {
    for (i, alias) in aliases.iter().enumerate() {
        if !registered.contains(&alias.target) {
            return Err(RouteError::UnknownTarget {
                alias: alias.alias,
                target: alias.target,
            });
        }
        if registered.contains(&alias.alias) {
            return Err(RouteError::Shadowed(alias.alias));
        }
        if aliases[..i].iter().any(|a| a.alias == alias.alias) {
            return Err(RouteError::Duplicate(alias.alias));
        }
    }
    Ok(())
}

/// Builds the application router with aliases and middleware.
pub fn build_router(state: AppState) -> Result<Router, RouteError> {
    let routes = canonical_routes();
    let paths: Vec<&str> = routes.iter().map(|(path, _)| *path).collect();
    validate_aliases(ROUTE_ALIASES, &paths)?;

    let mut handlers: HashMap<&str, MethodRouter<AppState>> = HashMap::new();
    let mut router = Router::new();
    for (path, method_router) in routes {
        handlers.insert(path, method_router.clone());
        router = router.route(path, method_router);
    }
    for alias in ROUTE_ALIASES {
        let target = handlers
            .get(alias.target)
            .cloned()
            .ok_or(RouteError::UnknownTarget {
                alias: alias.alias,
                target: alias.target,
            })?;
        debug!(alias = alias.alias, target = alias.target, "Route alias registered");
        router = router.route(alias.alias, target);
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    Ok(router
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce))
        // CORS answers preflights itself, so the headers layer wraps it.
        .layer(cors)
        .layer(from_fn_with_state(state.clone(), security::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn not_found() -> impl IntoResponse {
    ApiError::NotFound("Route not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_alias_targets_a_canonical_route() {
        let routes = canonical_routes();
        let paths: Vec<&str> = routes.iter().map(|(path, _)| *path).collect();
        assert_eq!(validate_aliases(ROUTE_ALIASES, &paths), Ok(()));
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let aliases = [RouteAlias {
            alias: "/api/pos/issue",
            target: "/api/pos/issue-invoice-v2",
        }];
        assert!(matches!(
            validate_aliases(&aliases, &["/api/pos/issueInvoice"]),
            Err(RouteError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn test_alias_may_not_shadow_or_repeat() {
        let registered = ["/api/journal", "/api/orders"];
        let shadow = [RouteAlias {
            alias: "/api/orders",
            target: "/api/journal",
        }];
        assert_eq!(
            validate_aliases(&shadow, &registered),
            Err(RouteError::Shadowed("/api/orders"))
        );

        let twice = [
            RouteAlias {
                alias: "/api/journal-entries",
                target: "/api/journal",
            },
            RouteAlias {
                alias: "/api/journal-entries",
                target: "/api/orders",
            },
        ];
        assert_eq!(
            validate_aliases(&twice, &registered),
            Err(RouteError::Duplicate("/api/journal-entries"))
        );
    }

    #[test]
    fn test_canonical_paths_are_unique() {
        let routes = canonical_routes();
        let mut paths: Vec<&str> = routes.iter().map(|(path, _)| *path).collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }
}

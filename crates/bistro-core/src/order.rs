//! # POS Order Lifecycle
//!
//! Status transitions, line-item normalisation and the draft storage key.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   (no order) ──saveDraft──► DRAFT ──────┬──────────► OPEN               │
//! │                               │         │             ▲  │              │
//! │                               │         └──► BUSY ◄───┘  │              │
//! │                               │               │    ◄─────┘              │
//! │                               │               │                         │
//! │                 issueInvoice  │  issueInvoice │  issueInvoice (OPEN)    │
//! │                               ▼               ▼                         │
//! │                             CLOSED  (terminal, invoice linked)          │
//! │                                                                         │
//! │   DRAFT / OPEN / BUSY ──cancel──► CANCELLED  (terminal)                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! CLOSED is reachable only through invoice issuance; a plain status update
//! to `closed` is rejected.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::OrderStatus;
use crate::validation::{validate_order_size, validate_price_cents, validate_quantity};

// =============================================================================
// Transitions
// =============================================================================

impl OrderStatus {
    /// Draft, open or busy: the table is still in session.
    pub const fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Open | OrderStatus::Busy)
    }

    /// Closed or cancelled.
    pub const fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Transitions allowed through a status update.
    pub const fn can_transition_to(&self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::Draft, OrderStatus::Open)
                | (OrderStatus::Draft, OrderStatus::Busy)
                | (OrderStatus::Draft, OrderStatus::Cancelled)
                | (OrderStatus::Open, OrderStatus::Busy)
                | (OrderStatus::Busy, OrderStatus::Open)
                | (OrderStatus::Open, OrderStatus::Cancelled)
                | (OrderStatus::Busy, OrderStatus::Cancelled)
        )
    }
}

/// Validates a status update requested by a client.
pub fn ensure_transition(order_id: i64, from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if from.is_terminal() {
        return Err(CoreError::OrderFinished {
            order_id,
            status: from.to_string(),
        });
    }
    if !from.can_transition_to(to) {
        return Err(CoreError::InvalidOrderTransition {
            order_id,
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(())
}

/// An order can be edited or invoiced while it is active.
pub fn ensure_active(order_id: i64, status: OrderStatus) -> CoreResult<()> {
    if status.is_terminal() {
        return Err(CoreError::OrderFinished {
            order_id,
            status: status.to_string(),
        });
    }
    Ok(())
}

/// Parses a case-insensitive, comma-separated status filter.
///
/// ## Example
/// ```rust
/// use bistro_core::order::parse_status_filter;
/// use bistro_core::OrderStatus;
///
/// let statuses = parse_status_filter("DRAFT,open").unwrap();
/// assert_eq!(statuses, vec![OrderStatus::Draft, OrderStatus::Open]);
/// ```
pub fn parse_status_filter(raw: &str) -> CoreResult<Vec<OrderStatus>> {
    let mut statuses = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let status: OrderStatus = part.parse()?;
        if !statuses.contains(&status) {
            statuses.push(status);
        }
    }
    Ok(statuses)
}

// =============================================================================
// Draft Items
// =============================================================================

/// A line as sent by the POS client.
///
/// Accepts the short `{id, qty}` form; missing price and name are filled
/// from the product catalogue by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItemInput {
    #[serde(alias = "id")]
    pub product_id: i64,
    #[serde(alias = "qty")]
    pub quantity: i64,
    #[serde(default, alias = "price")]
    pub unit_price_cents: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A line with price and name resolved, ready to store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewOrderItem {
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// Validates and merges draft lines.
///
/// - every quantity in 1..=999, every price in 0..=MAX_PRICE_CENTS
/// - lines with the same product and price merge, quantities summed
/// - order of first appearance is kept
/// - merged quantities are re-checked against the limit
/// - the order total must fit in `i64` cents
pub fn normalize_items(items: Vec<NewOrderItem>) -> CoreResult<Vec<NewOrderItem>> {
    let mut merged: Vec<NewOrderItem> = Vec::with_capacity(items.len());

    for item in items {
        validate_quantity(item.quantity)?;
        validate_price_cents(item.unit_price_cents)?;

        match merged
            .iter_mut()
            .find(|m| m.product_id == item.product_id && m.unit_price_cents == item.unit_price_cents)
        {
            Some(existing) => {
                existing.quantity += item.quantity;
                validate_quantity(existing.quantity)?;
            }
            None => merged.push(item),
        }
    }

    validate_order_size(merged.len())?;
    items_subtotal(&merged)?;
    Ok(merged)
}

/// Fails when there is nothing to store for a new order.
pub fn ensure_not_empty(items: &[NewOrderItem]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(CoreError::EmptyOrder);
    }
    Ok(())
}

/// Sum of line totals, failing instead of overflowing.
pub fn items_subtotal(items: &[NewOrderItem]) -> CoreResult<Money> {
    items.iter().try_fold(Money::zero(), |total, item| -> CoreResult<Money> {
        Money::from_cents(item.unit_price_cents)
            .checked_multiply_quantity(item.quantity)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| ValidationError::invalid("items", "order total is too large").into())
    })
}

/// Key under which the POS client persists the open order for a table.
///
/// ## Example
/// ```rust
/// use bistro_core::order::draft_storage_key;
///
/// assert_eq!(draft_storage_key("china_town", "5"), "pos_order_china_town_5");
/// ```
pub fn draft_storage_key(branch: &str, table: &str) -> String {
    format!("pos_order_{}_{}", branch, table)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product_id: i64, quantity: i64, price: i64) -> NewOrderItem {
        NewOrderItem {
            product_id,
            name: format!("Product {}", product_id),
            quantity,
            unit_price_cents: price,
        }
    }

    #[test]
    fn test_allowed_transitions() {
        use OrderStatus::*;
        assert!(Draft.can_transition_to(Open));
        assert!(Draft.can_transition_to(Busy));
        assert!(Open.can_transition_to(Busy));
        assert!(Busy.can_transition_to(Open));
        assert!(Busy.can_transition_to(Cancelled));
        assert!(!Open.can_transition_to(Draft));
        assert!(!Draft.can_transition_to(Closed));
        assert!(!Open.can_transition_to(Closed));
    }

    #[test]
    fn test_terminal_orders_reject_updates() {
        assert!(matches!(
            ensure_transition(1, OrderStatus::Closed, OrderStatus::Open),
            Err(CoreError::OrderFinished { .. })
        ));
        assert!(matches!(
            ensure_transition(1, OrderStatus::Cancelled, OrderStatus::Draft),
            Err(CoreError::OrderFinished { .. })
        ));
        assert!(matches!(
            ensure_transition(1, OrderStatus::Open, OrderStatus::Closed),
            Err(CoreError::InvalidOrderTransition { .. })
        ));
        assert!(ensure_active(1, OrderStatus::Busy).is_ok());
        assert!(ensure_active(1, OrderStatus::Closed).is_err());
    }

    #[test]
    fn test_parse_status_filter() {
        assert_eq!(
            parse_status_filter("DRAFT, Open,draft").unwrap(),
            vec![OrderStatus::Draft, OrderStatus::Open]
        );
        assert!(parse_status_filter("").unwrap().is_empty());
        assert!(parse_status_filter("DRAFT,PENDING").is_err());
    }

    #[test]
    fn test_normalize_merges_duplicates_in_first_seen_order() {
        let items = vec![item(213, 1, 1500), item(212, 1, 2500), item(213, 1, 1500)];
        let normalized = normalize_items(items).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].product_id, 213);
        assert_eq!(normalized[0].quantity, 2);
        assert_eq!(normalized[1].product_id, 212);
    }

    #[test]
    fn test_normalize_keeps_distinct_prices_apart() {
        let items = vec![item(212, 1, 2500), item(212, 1, 0)];
        assert_eq!(normalize_items(items).unwrap().len(), 2);
    }

    #[test]
    fn test_normalize_rejects_bad_lines() {
        assert!(normalize_items(vec![item(1, 0, 100)]).is_err());
        assert!(normalize_items(vec![item(1, 1, -1)]).is_err());
        assert!(normalize_items(vec![item(1, 600, 100), item(1, 600, 100)]).is_err());
    }

    #[test]
    fn test_normalize_rejects_price_above_ceiling() {
        let err = normalize_items(vec![item(1, 1, crate::MAX_PRICE_CENTS + 1)]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(crate::ValidationError::OutOfRange { ref field, .. }) if field == "price"
        ));
        assert!(normalize_items(vec![item(1, 2, i64::MAX / 2)]).is_err());
    }

    #[test]
    fn test_subtotal_overflow_is_an_error() {
        let items = vec![item(1, 2, i64::MAX / 2 + 1)];
        assert!(items_subtotal(&items).is_err());
    }

    #[test]
    fn test_largest_order_total_fits_in_cents() {
        let items: Vec<NewOrderItem> = (0..crate::MAX_ORDER_ITEMS as i64)
            .map(|id| item(id, crate::MAX_ITEM_QUANTITY, crate::MAX_PRICE_CENTS))
            .collect();
        let items = normalize_items(items).unwrap();
        let subtotal = items_subtotal(&items).unwrap();
        assert_eq!(
            subtotal.cents() as i128,
            crate::MAX_ORDER_ITEMS as i128 * crate::MAX_ITEM_QUANTITY as i128 * crate::MAX_PRICE_CENTS as i128
        );

        let totals = crate::postings::invoice_totals(subtotal, Money::zero(), &crate::Settings::default()).unwrap();
        assert!(totals.total > subtotal);
    }

    #[test]
    fn test_empty_items_allowed_by_normalize_but_not_for_creation() {
        let normalized = normalize_items(vec![]).unwrap();
        assert!(normalized.is_empty());
        assert!(matches!(ensure_not_empty(&normalized), Err(CoreError::EmptyOrder)));
    }

    #[test]
    fn test_subtotal() {
        let items = vec![item(212, 1, 2500), item(213, 2, 1500)];
        assert_eq!(items_subtotal(&items).unwrap().cents(), 5500);
    }

    #[test]
    fn test_draft_input_accepts_short_form() {
        let input: DraftItemInput = serde_json::from_str(r#"{"id": 212, "qty": 2}"#).unwrap();
        assert_eq!(input.product_id, 212);
        assert_eq!(input.quantity, 2);
        assert!(input.unit_price_cents.is_none());
    }

    #[test]
    fn test_draft_storage_key() {
        assert_eq!(draft_storage_key("china_town", "5"), "pos_order_china_town_5");
    }
}

//! # Order Repository
//!
//! POS orders: draft saving, status changes and invoice issuance.
//!
//! ## Eager Loading
//! Every method returning an [`Order`] attaches its items. Lists fetch all
//! items for the page in one `order_id = ANY($1)` query, so an order is
//! never handed out with an unloaded item list.
//!
//! ## saveDraft
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  saveDraft(china_town, table 5, [{id:212,qty:1},{id:213,qty:2}])       │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │   ├── resolve names/prices from products (unknown id → NotFound)       │
//! │   ├── normalize_items (merge duplicates, 1..=999, prices ≥ 0)          │
//! │   ├── order_id given?                                                  │
//! │   │     ├── yes: lock it, must be active and on the same table         │
//! │   │     └── no:  lock the table's active order, or INSERT a draft      │
//! │   ├── DELETE order_items; INSERT the new set                           │
//! │   └── SELECT order + items                                             │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  → { order, storage_key: "pos_order_china_town_5" }                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use bistro_core::order::{
    self, draft_storage_key, ensure_active, ensure_not_empty, ensure_transition,
    normalize_items, DraftItemInput, NewOrderItem,
};
use bistro_core::validation::{validate_branch, validate_table};
use bistro_core::{
    CoreError, Invoice, Money, Order, OrderItem, OrderStatus, PaymentMethod, ValidationError,
};

use super::invoice::{insert_invoice, NewInvoice, NewInvoiceLine};
use super::settings::load_settings;
use super::{clamp_limit, parse_column, product};
use crate::error::{DbError, DbResult};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderRecord {
    id: i64,
    branch: String,
    table_number: String,
    status: String,
    customer_name: Option<String>,
    notes: Option<String>,
    invoice_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRecord {
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<Order> {
        Ok(Order {
            status: parse_column("status", &self.status)?,
            id: self.id,
            branch: self.branch,
            table_number: self.table_number,
            customer_name: self.customer_name,
            notes: self.notes,
            invoice_id: self.invoice_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRecord {
    id: i64,
    order_id: i64,
    product_id: i64,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_no: i32,
}

impl From<ItemRecord> for OrderItem {
    fn from(r: ItemRecord) -> Self {
        OrderItem {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            name: r.name,
            quantity: r.quantity,
            unit_price_cents: r.unit_price_cents,
            line_no: r.line_no,
        }
    }
}

const ORDER_COLUMNS: &str = "id, branch, table_number, status, customer_name, notes, \
     invoice_id, created_at, updated_at";

// =============================================================================
// Inputs & Outputs
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SaveDraftInput {
    pub branch: String,
    #[serde(alias = "table")]
    pub table_number: String,
    #[serde(default, alias = "orderId")]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub items: Vec<DraftItemInput>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedDraft {
    pub order: Order,
    /// Key the POS client stores the order id under.
    pub storage_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderFilter {
    pub branch: Option<String>,
    #[serde(alias = "table")]
    pub table_number: Option<String>,
    /// Comma-separated, case-insensitive (`DRAFT,OPEN`).
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueInvoiceInput {
    #[serde(alias = "orderId")]
    pub order_id: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub discount_cents: i64,
    #[serde(default)]
    pub partner_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedInvoice {
    pub invoice: Invoice,
    pub order: Order,
}

/// A table with an order in session.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActiveTable {
    pub table_number: String,
    pub order_id: i64,
    pub status: String,
    pub item_count: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        OrderRepository { pool }
    }

    /// Creates or updates the table's draft, replacing its items as a set.
    pub async fn save_draft(&self, input: &SaveDraftInput) -> DbResult<SavedDraft> {
        let branch = input.branch.trim();
        let table = input.table_number.trim();
        validate_branch(branch)?;
        validate_table(table)?;

        let mut tx = self.pool.begin().await?;

        let items = normalize_items(resolve_items(&mut tx, &input.items).await?)?;

        let order_id = match input.order_id {
            Some(id) => {
                let current = lock_order(&mut tx, id).await?;
                ensure_active(id, current.status)?;
                if current.branch != branch || current.table_number != table {
                    return Err(ValidationError::InvalidFormat {
                        field: "order_id".to_string(),
                        reason: format!(
                            "order {} belongs to {}/{}",
                            id, current.branch, current.table_number
                        ),
                    }
                    .into());
                }
                id
            }
            None => match find_active(&mut tx, branch, table).await? {
                Some(id) => id,
                None => {
                    ensure_not_empty(&items)?;
                    insert_draft(&mut tx, branch, table).await?
                }
            },
        };

        replace_items(&mut tx, order_id, &items).await?;

        sqlx::query(
            r#"
            UPDATE orders SET
                customer_name = COALESCE($2, customer_name),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(input.customer_name.as_deref())
        .bind(input.notes.as_deref())
        .execute(&mut *tx)
        .await?;

        let order = fetch_order(&mut tx, order_id).await?;
        tx.commit().await?;

        debug!(
            order_id,
            branch,
            table,
            items = order.items.len(),
            "Draft order saved"
        );

        Ok(SavedDraft {
            storage_key: draft_storage_key(branch, table),
            order,
        })
    }

    pub async fn get(&self, id: i64) -> DbResult<Order> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Orders matching the filter, newest first, items always attached.
    pub async fn list(&self, filter: &OrderFilter) -> DbResult<Vec<Order>> {
        let statuses: Option<Vec<String>> = match filter.status.as_deref() {
            Some(raw) => {
                let parsed = order::parse_status_filter(raw)?;
                if parsed.is_empty() {
                    None
                } else {
                    Some(parsed.iter().map(|s| s.as_str().to_string()).collect())
                }
            }
            None => None,
        };

        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            SELECT {}
            FROM orders
            WHERE ($1::TEXT IS NULL OR branch = $1)
              AND ($2::TEXT IS NULL OR table_number = $2)
              AND ($3::TEXT[] IS NULL OR status = ANY($3))
            ORDER BY updated_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            ORDER_COLUMNS
        ))
        .bind(filter.branch.as_deref().map(str::trim))
        .bind(filter.table_number.as_deref().map(str::trim))
        .bind(statuses)
        .bind(clamp_limit(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        attach_items(&mut conn, records).await
    }

    /// Applies a client-requested status change.
    pub async fn update_status(&self, id: i64, to: OrderStatus) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, id).await?;
        ensure_transition(id, current.status, to)?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;

        let order = fetch_order(&mut tx, id).await?;
        tx.commit().await?;

        info!(order_id = id, from = %current.status, to = %to, "Order status changed");
        Ok(order)
    }

    /// Invoices an active order and closes it, all in one transaction.
    pub async fn issue_invoice(&self, input: &IssueInvoiceInput) -> DbResult<IssuedInvoice> {
        let mut tx = self.pool.begin().await?;

        let current = lock_order(&mut tx, input.order_id).await?;
        ensure_active(current.id, current.status)?;
        if current.items.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        let settings = load_settings(&mut tx).await?;
        let new_invoice = NewInvoice {
            branch: current.branch.clone(),
            order_id: Some(current.id),
            partner_id: input.partner_id,
            payment_method: input.payment_method,
            discount: Money::from_cents(input.discount_cents),
            lines: current
                .items
                .iter()
                .map(|item| NewInvoiceLine {
                    product_id: Some(item.product_id),
                    description: item.name.clone(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price_cents,
                })
                .collect(),
        };
        let invoice = insert_invoice(&mut tx, &new_invoice, &settings).await?;

        sqlx::query(
            "UPDATE orders SET status = 'closed', invoice_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(current.id)
        .bind(invoice.id)
        .execute(&mut *tx)
        .await?;

        let order = fetch_order(&mut tx, current.id).await?;
        tx.commit().await?;

        info!(
            order_id = order.id,
            invoice = %invoice.invoice_number,
            table = %order.table_number,
            "Order closed"
        );
        Ok(IssuedInvoice { invoice, order })
    }

    /// Tables of a branch that currently hold an active order.
    pub async fn active_tables(&self, branch: &str) -> DbResult<Vec<ActiveTable>> {
        validate_branch(branch)?;

        let tables = sqlx::query_as::<_, ActiveTable>(
            r#"
            SELECT o.table_number, o.id AS order_id, o.status,
                   COALESCE(SUM(i.quantity), 0)::BIGINT AS item_count,
                   o.updated_at
            FROM orders o
            LEFT JOIN order_items i ON i.order_id = o.id
            WHERE o.branch = $1 AND o.status IN ('draft', 'open', 'busy')
            GROUP BY o.id
            ORDER BY o.table_number
            "#,
        )
        .bind(branch)
        .fetch_all(&self.pool)
        .await?;

        Ok(tables)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Fills names and prices from the catalogue.
async fn resolve_items(
    conn: &mut PgConnection,
    inputs: &[DraftItemInput],
) -> DbResult<Vec<NewOrderItem>> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = inputs.iter().map(|i| i.product_id).collect();
    let products = product::fetch_by_ids(conn, &ids).await?;

    inputs
        .iter()
        .map(|input| {
            let product = products
                .get(&input.product_id)
                .ok_or_else(|| DbError::not_found("Product", input.product_id))?;
            Ok(NewOrderItem {
                product_id: product.id,
                name: input.name.clone().unwrap_or_else(|| product.name.clone()),
                quantity: input.quantity,
                unit_price_cents: input.unit_price_cents.unwrap_or(product.price_cents),
            })
        })
        .collect()
}

async fn find_active(conn: &mut PgConnection, branch: &str, table: &str) -> DbResult<Option<i64>> {
    let id = sqlx::query_scalar(
        r#"
        SELECT id FROM orders
        WHERE branch = $1 AND table_number = $2 AND status IN ('draft', 'open', 'busy')
        FOR UPDATE
        "#,
    )
    .bind(branch)
    .bind(table)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

async fn insert_draft(conn: &mut PgConnection, branch: &str, table: &str) -> DbResult<i64> {
    sqlx::query_scalar(
        "INSERT INTO orders (branch, table_number, status) VALUES ($1, $2, 'draft') RETURNING id",
    )
    .bind(branch)
    .bind(table)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => {
            DbError::duplicate("active order for table", format!("{}/{}", branch, table))
        }
        other => other,
    })
}

async fn replace_items(conn: &mut PgConnection, order_id: i64, items: &[NewOrderItem]) -> DbResult<()> {
    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    for (line_no, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, name, quantity, unit_price_cents, line_no)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(line_no as i32 + 1)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn lock_order(conn: &mut PgConnection, id: i64) -> DbResult<Order> {
    sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))?;
    fetch_order(conn, id).await
}

async fn fetch_order(conn: &mut PgConnection, id: i64) -> DbResult<Order> {
    let record = sqlx::query_as::<_, OrderRecord>(&format!(
        "SELECT {} FROM orders WHERE id = $1",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Order", id))?;

    attach_items(conn, vec![record])
        .await?
        .pop()
        .ok_or_else(|| DbError::not_found("Order", id))
}

async fn attach_items(conn: &mut PgConnection, records: Vec<OrderRecord>) -> DbResult<Vec<Order>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

    let items = sqlx::query_as::<_, ItemRecord>(
        r#"
        SELECT id, order_id, product_id, name, quantity, unit_price_cents, line_no
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY order_id, line_no
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item.into());
    }

    records
        .into_iter()
        .map(|r| {
            let items = by_order.remove(&r.id).unwrap_or_default();
            r.into_order(items)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_draft_input_accepts_short_form() {
        let input: SaveDraftInput = serde_json::from_str(
            r#"{"branch":"china_town","table":"5","items":[{"id":212,"qty":1},{"id":213,"qty":2}]}"#,
        )
        .unwrap();
        assert_eq!(input.table_number, "5");
        assert_eq!(input.order_id, None);
        assert_eq!(input.items.len(), 2);
        assert_eq!(input.items[1].product_id, 213);
        assert_eq!(input.items[1].quantity, 2);
    }

    #[test]
    fn test_issue_invoice_input_defaults() {
        let input: IssueInvoiceInput =
            serde_json::from_str(r#"{"orderId":7,"payment_method":"card"}"#).unwrap();
        assert_eq!(input.order_id, 7);
        assert_eq!(input.payment_method, PaymentMethod::Card);
        assert_eq!(input.discount_cents, 0);
        assert!(input.partner_id.is_none());
    }
}

//! # Invoice Repository
//!
//! Issued invoices and their lines. Invoices are written only through
//! [`insert_invoice`], inside the caller's transaction, together with
//! their posted journal entry.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use bistro_core::journal::document_number;
use bistro_core::postings::{invoice_journal, invoice_totals};
use bistro_core::{Invoice, InvoiceLine, Money, PaymentMethod, Settings};

use super::journal::insert_entry;
use super::{clamp_limit, parse_column};
use crate::error::{DbError, DbResult};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct InvoiceRecord {
    id: i64,
    invoice_number: String,
    branch: String,
    order_id: Option<i64>,
    partner_id: Option<i64>,
    payment_method: String,
    subtotal_cents: i64,
    discount_cents: i64,
    vat_cents: i64,
    total_cents: i64,
    status: String,
    journal_entry_id: Option<i64>,
    issued_at: DateTime<Utc>,
}

impl InvoiceRecord {
    fn into_invoice(self, lines: Vec<InvoiceLine>) -> DbResult<Invoice> {
        Ok(Invoice {
            payment_method: parse_column("payment_method", &self.payment_method)?,
            status: parse_column("status", &self.status)?,
            id: self.id,
            invoice_number: self.invoice_number,
            branch: self.branch,
            order_id: self.order_id,
            partner_id: self.partner_id,
            subtotal_cents: self.subtotal_cents,
            discount_cents: self.discount_cents,
            vat_cents: self.vat_cents,
            total_cents: self.total_cents,
            journal_entry_id: self.journal_entry_id,
            issued_at: self.issued_at,
            lines,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LineRecord {
    id: i64,
    invoice_id: i64,
    product_id: Option<i64>,
    description: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<LineRecord> for InvoiceLine {
    fn from(r: LineRecord) -> Self {
        InvoiceLine {
            id: r.id,
            invoice_id: r.invoice_id,
            product_id: r.product_id,
            description: r.description,
            quantity: r.quantity,
            unit_price_cents: r.unit_price_cents,
            line_total_cents: r.line_total_cents,
        }
    }
}

const INVOICE_COLUMNS: &str = "id, invoice_number, branch, order_id, partner_id, payment_method, \
     subtotal_cents, discount_cents, vat_cents, total_cents, status, journal_entry_id, issued_at";

// =============================================================================
// Inputs
// =============================================================================

/// A line to invoice.
#[derive(Debug, Clone)]
pub(crate) struct NewInvoiceLine {
    pub product_id: Option<i64>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl NewInvoiceLine {
    fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NewInvoice {
    pub branch: String,
    pub order_id: Option<i64>,
    pub partner_id: Option<i64>,
    pub payment_method: PaymentMethod,
    pub discount: Money,
    pub lines: Vec<NewInvoiceLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub branch: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        InvoiceRepository { pool }
    }

    pub async fn get(&self, id: i64) -> DbResult<Invoice> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoice(&mut conn, id).await
    }

    /// Invoices newest first, lines attached.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let records = sqlx::query_as::<_, InvoiceRecord>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::TEXT IS NULL OR branch = $1)
              AND ($2::DATE IS NULL OR issued_at::DATE >= $2)
              AND ($3::DATE IS NULL OR issued_at::DATE <= $3)
            ORDER BY issued_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#,
            INVOICE_COLUMNS
        ))
        .bind(filter.branch.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(clamp_limit(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        attach_lines(&mut conn, records).await
    }
}

// =============================================================================
// Shared helpers
// =============================================================================

pub(crate) async fn fetch_invoice(conn: &mut PgConnection, id: i64) -> DbResult<Invoice> {
    let record = sqlx::query_as::<_, InvoiceRecord>(&format!(
        "SELECT {} FROM invoices WHERE id = $1",
        INVOICE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("Invoice", id))?;

    attach_lines(conn, vec![record])
        .await?
        .pop()
        .ok_or_else(|| DbError::not_found("Invoice", id))
}

/// Writes an invoice, its lines and its posted journal entry.
///
/// ```text
/// totals ← invoice_totals(subtotal, discount, settings)
/// INSERT invoices        (number from invoice_number_seq)
/// INSERT invoice_lines × n
/// insert_entry(invoice_journal(invoice), post = true)
/// UPDATE invoices SET journal_entry_id
/// ```
pub(crate) async fn insert_invoice(
    conn: &mut PgConnection,
    input: &NewInvoice,
    settings: &Settings,
) -> DbResult<Invoice> {
    let subtotal: Money = input.lines.iter().map(NewInvoiceLine::line_total).sum();
    let totals = invoice_totals(subtotal, input.discount, settings)?;

    let seq: i64 = sqlx::query_scalar("SELECT nextval('invoice_number_seq')")
        .fetch_one(&mut *conn)
        .await?;
    let invoice_number = document_number("INV", Utc::now().date_naive(), seq);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoices
            (invoice_number, branch, order_id, partner_id, payment_method,
             subtotal_cents, discount_cents, vat_cents, total_cents, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'posted')
        RETURNING id
        "#,
    )
    .bind(&invoice_number)
    .bind(&input.branch)
    .bind(input.order_id)
    .bind(input.partner_id)
    .bind(input.payment_method.as_str())
    .bind(totals.subtotal.cents())
    .bind(totals.discount.cents())
    .bind(totals.vat.cents())
    .bind(totals.total.cents())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match (DbError::from(e), input.order_id) {
        (DbError::UniqueViolation { .. }, Some(order_id)) => {
            DbError::duplicate("invoice for order", order_id.to_string())
        }
        (other, _) => other,
    })?;

    for line in &input.lines {
        sqlx::query(
            r#"
            INSERT INTO invoice_lines
                (invoice_id, product_id, description, quantity, unit_price_cents, line_total_cents)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(line.product_id)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(line.line_total().cents())
        .execute(&mut *conn)
        .await?;
    }

    let invoice = fetch_invoice(conn, id).await?;
    let entry_id = insert_entry(conn, &invoice_journal(&invoice), true).await?;

    sqlx::query("UPDATE invoices SET journal_entry_id = $2 WHERE id = $1")
        .bind(id)
        .bind(entry_id)
        .execute(&mut *conn)
        .await?;

    info!(
        invoice = %invoice.invoice_number,
        total = %totals.total,
        vat = %totals.vat,
        method = %input.payment_method,
        "Invoice issued"
    );

    Ok(Invoice {
        journal_entry_id: Some(entry_id),
        ..invoice
    })
}

async fn attach_lines(
    conn: &mut PgConnection,
    records: Vec<InvoiceRecord>,
) -> DbResult<Vec<Invoice>> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = records.iter().map(|r| r.id).collect();

    let lines = sqlx::query_as::<_, LineRecord>(
        r#"
        SELECT id, invoice_id, product_id, description, quantity, unit_price_cents, line_total_cents
        FROM invoice_lines
        WHERE invoice_id = ANY($1)
        ORDER BY invoice_id, id
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_invoice: HashMap<i64, Vec<InvoiceLine>> = HashMap::new();
    for line in lines {
        by_invoice.entry(line.invoice_id).or_default().push(line.into());
    }

    records
        .into_iter()
        .map(|r| {
            let lines = by_invoice.remove(&r.id).unwrap_or_default();
            r.into_invoice(lines)
        })
        .collect()
}

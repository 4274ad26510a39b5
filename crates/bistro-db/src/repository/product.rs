//! # Product Repository
//!
//! Menu items priced for the POS.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use tracing::info;

use bistro_core::validation::{validate_name, validate_price_cents};
use bistro_core::Product;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProductRecord {
    id: i64,
    name: String,
    category: Option<String>,
    price_cents: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for Product {
    fn from(r: ProductRecord) -> Self {
        Product {
            id: r.id,
            name: r.name,
            category: r.category,
            price_cents: r.price_cents,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, name, category, price_cents, is_active, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        ProductRepository { pool }
    }

    /// Products ordered by category then name. Inactive ones only on request.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM products WHERE ($1 OR is_active) ORDER BY category NULLS LAST, name",
            PRODUCT_COLUMNS
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Product::from).collect())
    }

    pub async fn get(&self, id: i64) -> DbResult<Product> {
        sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::from)
        .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        validate_name("name", &input.name)?;
        validate_price_cents(input.price_cents)?;

        let record = sqlx::query_as::<_, ProductRecord>(&format!(
            "INSERT INTO products (name, category, price_cents) VALUES ($1, $2, $3) RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.category.as_deref())
        .bind(input.price_cents)
        .fetch_one(&self.pool)
        .await?;

        info!(product_id = record.id, name = %record.name, "Product created");
        Ok(record.into())
    }

    pub async fn update(&self, id: i64, update: &ProductUpdate) -> DbResult<Product> {
        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }
        if let Some(price) = update.price_cents {
            validate_price_cents(price)?;
        }

        sqlx::query_as::<_, ProductRecord>(&format!(
            r#"
            UPDATE products SET
                name = COALESCE($2, name),
                category = COALESCE($3, category),
                price_cents = COALESCE($4, price_cents),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.category.as_deref())
        .bind(update.price_cents)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::from)
        .ok_or_else(|| DbError::not_found("Product", id))
    }
}

/// Loads products by id on the caller's connection, keyed by id.
pub(crate) async fn fetch_by_ids(
    conn: &mut PgConnection,
    ids: &[i64],
) -> DbResult<HashMap<i64, Product>> {
    let records = sqlx::query_as::<_, ProductRecord>(&format!(
        "SELECT {} FROM products WHERE id = ANY($1)",
        PRODUCT_COLUMNS
    ))
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(records.into_iter().map(|r| (r.id, Product::from(r))).collect())
}

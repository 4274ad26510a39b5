//! # Partner Repository
//!
//! Customers and suppliers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::info;

use bistro_core::validation::{validate_branch, validate_email, validate_name};
use bistro_core::{Partner, PartnerType, RecordStatus};

use super::{clamp_limit, parse_column};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct PartnerRecord {
    id: i64,
    name: String,
    partner_type: String,
    vat_number: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    branch: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl PartnerRecord {
    fn into_partner(self) -> DbResult<Partner> {
        Ok(Partner {
            partner_type: parse_column("partner_type", &self.partner_type)?,
            status: parse_column("status", &self.status)?,
            id: self.id,
            name: self.name,
            vat_number: self.vat_number,
            phone: self.phone,
            email: self.email,
            branch: self.branch,
            created_at: self.created_at,
        })
    }
}

const PARTNER_COLUMNS: &str =
    "id, name, partner_type, vat_number, phone, email, branch, status, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewPartner {
    pub name: String,
    pub partner_type: PartnerType,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerUpdate {
    pub name: Option<String>,
    pub partner_type: Option<PartnerType>,
    pub vat_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: Option<RecordStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerFilter {
    pub partner_type: Option<PartnerType>,
    pub status: Option<RecordStatus>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct PartnerRepository {
    pool: PgPool,
}

impl PartnerRepository {
    pub fn new(pool: PgPool) -> Self {
        PartnerRepository { pool }
    }

    /// Partners by name. A `both` partner matches either type filter.
    pub async fn list(&self, filter: &PartnerFilter) -> DbResult<Vec<Partner>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let records = sqlx::query_as::<_, PartnerRecord>(&format!(
            r#"
            SELECT {}
            FROM partners
            WHERE ($1::TEXT IS NULL OR partner_type = $1 OR partner_type = 'both')
              AND ($2::TEXT IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR name ILIKE $3 OR vat_number ILIKE $3)
            ORDER BY name, id
            LIMIT $4 OFFSET $5
            "#,
            PARTNER_COLUMNS
        ))
        .bind(filter.partner_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(search)
        .bind(clamp_limit(filter.limit))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(PartnerRecord::into_partner).collect()
    }

    pub async fn get(&self, id: i64) -> DbResult<Partner> {
        sqlx::query_as::<_, PartnerRecord>(&format!(
            "SELECT {} FROM partners WHERE id = $1",
            PARTNER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Partner", id))?
        .into_partner()
    }

    pub async fn create(&self, input: &NewPartner) -> DbResult<Partner> {
        validate_name("name", &input.name)?;
        if let Some(email) = &input.email {
            validate_email(email)?;
        }
        if let Some(branch) = &input.branch {
            validate_branch(branch)?;
        }

        let partner = sqlx::query_as::<_, PartnerRecord>(&format!(
            r#"
            INSERT INTO partners (name, partner_type, vat_number, phone, email, branch)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.partner_type.as_str())
        .bind(input.vat_number.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.email.as_deref())
        .bind(input.branch.as_deref())
        .fetch_one(&self.pool)
        .await?
        .into_partner()?;

        info!(partner_id = partner.id, kind = %partner.partner_type, "Partner created");
        Ok(partner)
    }

    pub async fn update(&self, id: i64, update: &PartnerUpdate) -> DbResult<Partner> {
        if let Some(name) = &update.name {
            validate_name("name", name)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }

        sqlx::query_as::<_, PartnerRecord>(&format!(
            r#"
            UPDATE partners SET
                name = COALESCE($2, name),
                partner_type = COALESCE($3, partner_type),
                vat_number = COALESCE($4, vat_number),
                phone = COALESCE($5, phone),
                email = COALESCE($6, email),
                status = COALESCE($7, status)
            WHERE id = $1
            RETURNING {}
            "#,
            PARTNER_COLUMNS
        ))
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.partner_type.map(|t| t.as_str()))
        .bind(update.vat_number.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.email.as_deref())
        .bind(update.status.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Partner", id))?
        .into_partner()
    }
}

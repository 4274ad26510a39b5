//! # Settings Repository
//!
//! Key/value settings. Each [`Settings`] field is one row whose value is
//! the field's JSON text; missing keys fall back to the defaults.
//!
//! ```text
//! settings
//! ┌────────────────────────┬──────────────┐
//! │ key                    │ value        │
//! ├────────────────────────┼──────────────┤
//! │ vat_rate_bps           │ 1500         │
//! │ prices_include_vat     │ true         │
//! │ company_name           │ "China Town" │
//! └────────────────────────┴──────────────┘
//! ```

use serde_json::{Map, Value};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use bistro_core::validation::{validate_name, validate_rate_bps};
use bistro_core::Settings;

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn load(&self) -> DbResult<Settings> {
        let mut conn = self.pool.acquire().await?;
        load_settings(&mut conn).await
    }

    /// Merges a partial JSON object over the stored settings and saves
    /// every field. Unknown keys are rejected.
    pub async fn save(&self, patch: &Map<String, Value>) -> DbResult<Settings> {
        let mut tx = self.pool.begin().await?;

        let current = load_settings(&mut tx).await?;
        let mut merged = match serde_json::to_value(&current) {
            Ok(Value::Object(map)) => map,
            _ => return Err(DbError::Internal("settings did not serialize to an object".into())),
        };
        for (key, value) in patch {
            if !merged.contains_key(key) {
                return Err(bistro_core::ValidationError::InvalidFormat {
                    field: key.clone(),
                    reason: "unknown setting".to_string(),
                }
                .into());
            }
            merged.insert(key.clone(), value.clone());
        }

        let settings: Settings = serde_json::from_value(Value::Object(merged.clone())).map_err(|e| {
            bistro_core::ValidationError::InvalidFormat {
                field: "settings".to_string(),
                reason: e.to_string(),
            }
        })?;
        validate_name("company_name", &settings.company_name)?;
        validate_rate_bps("vat_rate_bps", settings.vat_rate_bps)?;
        validate_rate_bps("gosi_employee_rate_bps", settings.gosi_employee_rate_bps)?;
        validate_rate_bps("gosi_employer_rate_bps", settings.gosi_employer_rate_bps)?;

        for (key, value) in &merged {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value, updated_at) VALUES ($1, $2, NOW())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(value.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(keys = patch.len(), "Settings saved");
        Ok(settings)
    }
}

/// Reads settings on the caller's connection so postings see the same
/// rates as the rest of the transaction.
pub(crate) async fn load_settings(conn: &mut PgConnection) -> DbResult<Settings> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
        .fetch_all(&mut *conn)
        .await?;

    let mut map = Map::new();
    for (key, raw) in rows {
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                map.insert(key, value);
            }
            Err(e) => warn!(key = %key, error = %e, "Ignoring unparseable setting"),
        }
    }

    Ok(settings_from_map(map))
}

/// Builds settings from stored values; a bad value for one key falls back
/// to that key's default instead of discarding the rest.
fn settings_from_map(map: Map<String, Value>) -> Settings {
    let mut merged = match serde_json::to_value(Settings::default()) {
        Ok(Value::Object(defaults)) => defaults,
        _ => return Settings::default(),
    };
    for (key, value) in map {
        if !merged.contains_key(&key) {
            continue;
        }
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value);
        if serde_json::from_value::<Settings>(Value::Object(candidate.clone())).is_ok() {
            merged = candidate;
        } else {
            warn!(key = %key, "Setting has the wrong type, using default");
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settings_from_empty_map_is_default() {
        assert_eq!(settings_from_map(Map::new()), Settings::default());
    }

    #[test]
    fn test_settings_from_map_keeps_good_values() {
        let map = match json!({
            "vat_rate_bps": 500,
            "prices_include_vat": "yes",
            "legacy_key": 1
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        };
        let settings = settings_from_map(map);
        assert_eq!(settings.vat_rate_bps, 500);
        assert!(!settings.prices_include_vat);
    }
}

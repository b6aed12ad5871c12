use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row};

use loadline_core::domain::carrier::McNumber;
use loadline_core::domain::load::{
    BookingOutcome, LoadCatalog, LoadId, LoadPreferences, LoadSnapshot, LoadStatus,
};
use loadline_core::store::StoreError;

use super::{db_err, decode_err};
use crate::DbPool;

/// Optional filters for the load-board search surface.
#[derive(Clone, Debug, Default)]
pub struct LoadSearch {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_type: Option<String>,
    pub min_rate: Option<Decimal>,
    pub max_rate: Option<Decimal>,
    pub limit: u32,
}

pub struct SqlLoadCatalog {
    pool: DbPool,
}

impl SqlLoadCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, load: &LoadSnapshot) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO loads
                 (load_id, origin, destination, pickup_at, delivery_at, equipment_type,
                  posted_rate, weight_lbs, miles, notes, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&load.load_id.0)
        .bind(&load.origin)
        .bind(&load.destination)
        .bind(load.pickup_at)
        .bind(load.delivery_at)
        .bind(&load.equipment_type)
        .bind(load.posted_rate.to_string())
        .bind(load.weight_lbs)
        .bind(load.miles)
        .bind(load.notes.as_deref())
        .bind(load.status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    pub async fn search(&self, search: &LoadSearch) -> Result<Vec<LoadSnapshot>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT * FROM loads WHERE status = 'available'");

        if let Some(origin) = &search.origin {
            builder.push(" AND origin LIKE ").push_bind(format!("%{origin}%"));
        }
        if let Some(destination) = &search.destination {
            builder.push(" AND destination LIKE ").push_bind(format!("%{destination}%"));
        }
        if let Some(equipment_type) = &search.equipment_type {
            builder.push(" AND equipment_type = ").push_bind(equipment_type.clone());
        }
        // Rates live as TEXT; compare as REAL so the bounds are numeric.
        if let Some(min_rate) = search.min_rate {
            builder
                .push(" AND CAST(posted_rate AS REAL) >= ")
                .push_bind(min_rate.to_f64().unwrap_or(0.0));
        }
        if let Some(max_rate) = search.max_rate {
            builder
                .push(" AND CAST(posted_rate AS REAL) <= ")
                .push_bind(max_rate.to_f64().unwrap_or(f64::MAX));
        }

        builder
            .push(" ORDER BY CAST(posted_rate AS REAL) DESC, pickup_at ASC LIMIT ")
            .push_bind(search.limit.max(1) as i64);

        let rows = builder.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(load_from_row).collect()
    }

    pub async fn list_available(&self, limit: u32) -> Result<Vec<LoadSnapshot>, StoreError> {
        self.search(&LoadSearch { limit, ..LoadSearch::default() }).await
    }
}

#[async_trait]
impl LoadCatalog for SqlLoadCatalog {
    async fn find_candidates(
        &self,
        _mc: &McNumber,
        preferences: &LoadPreferences,
        limit: u32,
    ) -> Result<Vec<LoadSnapshot>, StoreError> {
        let mut builder = QueryBuilder::new("SELECT * FROM loads WHERE status = 'available'");

        if let Some(origin) = &preferences.origin {
            builder.push(" AND origin LIKE ").push_bind(format!("%{origin}%"));
        }
        if let Some(destination) = &preferences.destination {
            builder.push(" AND destination LIKE ").push_bind(format!("%{destination}%"));
        }
        if let Some(equipment_types) = &preferences.equipment_types {
            if !equipment_types.is_empty() {
                builder.push(" AND equipment_type IN (");
                let mut separated = builder.separated(", ");
                for equipment_type in equipment_types {
                    separated.push_bind(equipment_type.clone());
                }
                builder.push(")");
            }
        }

        builder
            .push(" ORDER BY CAST(posted_rate AS REAL) DESC, pickup_at ASC LIMIT ")
            .push_bind(limit.max(1) as i64);

        let rows = builder.build().fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(load_from_row).collect()
    }

    async fn get(&self, id: &LoadId) -> Result<Option<LoadSnapshot>, StoreError> {
        let row = sqlx::query("SELECT * FROM loads WHERE load_id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(load_from_row).transpose()
    }

    async fn book(
        &self,
        id: &LoadId,
        mc: &McNumber,
        agreed_rate: Decimal,
    ) -> Result<BookingOutcome, StoreError> {
        // Compare-and-set on status: of two concurrent attempts exactly one
        // sees rows_affected == 1.
        let result = sqlx::query(
            "UPDATE loads
             SET status = 'booked', booked_by_mc = ?2, agreed_rate = ?3, updated_at = ?4
             WHERE load_id = ?1 AND status = 'available'",
        )
        .bind(&id.0)
        .bind(mc.as_str())
        .bind(agreed_rate.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 1 {
            Ok(BookingOutcome::Booked)
        } else {
            Ok(BookingOutcome::Conflict)
        }
    }
}

fn load_from_row(row: &SqliteRow) -> Result<LoadSnapshot, StoreError> {
    let status_raw: String = row.try_get("status").map_err(db_err)?;
    let status = LoadStatus::parse(&status_raw)
        .ok_or_else(|| decode_err(format!("unknown load status `{status_raw}`")))?;

    let posted_rate_raw: String = row.try_get("posted_rate").map_err(db_err)?;
    let posted_rate = posted_rate_raw
        .parse::<Decimal>()
        .map_err(|_| decode_err(format!("posted_rate holds a non-decimal `{posted_rate_raw}`")))?;

    Ok(LoadSnapshot {
        load_id: LoadId(row.try_get("load_id").map_err(db_err)?),
        origin: row.try_get("origin").map_err(db_err)?,
        destination: row.try_get("destination").map_err(db_err)?,
        pickup_at: row.try_get::<DateTime<Utc>, _>("pickup_at").map_err(db_err)?,
        delivery_at: row.try_get::<DateTime<Utc>, _>("delivery_at").map_err(db_err)?,
        equipment_type: row.try_get("equipment_type").map_err(db_err)?,
        posted_rate,
        weight_lbs: row.try_get::<Option<f64>, _>("weight_lbs").map_err(db_err)?,
        miles: row.try_get::<Option<f64>, _>("miles").map_err(db_err)?,
        notes: row.try_get::<Option<String>, _>("notes").map_err(db_err)?,
        status,
    })
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use loadline_core::domain::carrier::{CarrierInfo, McNumber};
use loadline_core::store::{CarrierStore, StoreError, StoredCarrier};

use super::db_err;
use crate::DbPool;

pub struct SqlCarrierStore {
    pool: DbPool,
}

impl SqlCarrierStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CarrierStore for SqlCarrierStore {
    async fn upsert_verified(
        &self,
        info: &CarrierInfo,
        verified_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carriers
                 (mc_number, legal_name, dba_name, entity_type, operating_status,
                  physical_address, phone, verified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(mc_number) DO UPDATE SET
                 legal_name = excluded.legal_name,
                 dba_name = excluded.dba_name,
                 entity_type = excluded.entity_type,
                 operating_status = excluded.operating_status,
                 physical_address = excluded.physical_address,
                 phone = excluded.phone,
                 verified_at = excluded.verified_at",
        )
        .bind(info.mc_number.as_str())
        .bind(&info.legal_name)
        .bind(info.dba_name.as_deref())
        .bind(&info.entity_type)
        .bind(&info.operating_status)
        .bind(info.physical_address.as_deref())
        .bind(info.phone.as_deref())
        .bind(verified_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find(&self, mc: &McNumber) -> Result<Option<StoredCarrier>, StoreError> {
        let row = sqlx::query("SELECT * FROM carriers WHERE mc_number = ?1")
            .bind(mc.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(StoredCarrier {
            info: CarrierInfo {
                mc_number: McNumber(row.try_get("mc_number").map_err(db_err)?),
                legal_name: row.try_get("legal_name").map_err(db_err)?,
                dba_name: row.try_get::<Option<String>, _>("dba_name").map_err(db_err)?,
                entity_type: row.try_get("entity_type").map_err(db_err)?,
                operating_status: row.try_get("operating_status").map_err(db_err)?,
                physical_address: row
                    .try_get::<Option<String>, _>("physical_address")
                    .map_err(db_err)?,
                phone: row.try_get::<Option<String>, _>("phone").map_err(db_err)?,
            },
            verified_at: row.try_get::<DateTime<Utc>, _>("verified_at").map_err(db_err)?,
        }))
    }
}

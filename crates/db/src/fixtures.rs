use sqlx::Executor;

use crate::connection::DbPool;
use loadline_core::StoreError;

use crate::repositories::db_err;

const SEED_AVAILABLE_LOAD_IDS: &[&str] =
    &["LD-1001", "LD-1002", "LD-1003", "LD-1004", "LD-1005"];

const SEED_BOOKED_LOAD_IDS: &[&str] = &["LD-0900"];

const SEED_CARRIER_MC_NUMBERS: &[&str] = &["123456", "789012"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub loads_seeded: usize,
    pub carriers_seeded: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Demo seed dataset: a deterministic load board plus the carriers the
/// sandbox registry answers for, so a fresh database can run the whole
/// call flow end to end.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, StoreError> {
        let mut tx = pool.begin().await.map_err(db_err)?;
        tx.execute(sqlx::raw_sql(Self::SQL)).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;

        Ok(SeedResult {
            loads_seeded: SEED_AVAILABLE_LOAD_IDS.len() + SEED_BOOKED_LOAD_IDS.len(),
            carriers_seeded: SEED_CARRIER_MC_NUMBERS.len(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let available: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM loads WHERE status = 'available' AND load_id IN {}",
            sql_list(SEED_AVAILABLE_LOAD_IDS)
        ))
        .fetch_one(pool)
        .await
        .map_err(db_err)?;
        checks.push(("available-loads", available == SEED_AVAILABLE_LOAD_IDS.len() as i64));

        let booked: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM loads WHERE status = 'booked' AND load_id IN {}",
            sql_list(SEED_BOOKED_LOAD_IDS)
        ))
        .fetch_one(pool)
        .await
        .map_err(db_err)?;
        checks.push(("booked-loads", booked == SEED_BOOKED_LOAD_IDS.len() as i64));

        let carriers: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM carriers WHERE mc_number IN {}",
            sql_list(SEED_CARRIER_MC_NUMBERS)
        ))
        .fetch_one(pool)
        .await
        .map_err(db_err)?;
        checks.push(("verified-carriers", carriers == SEED_CARRIER_MC_NUMBERS.len() as i64));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

fn sql_list(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>();
    format!("({})", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use crate::{connect_with_settings, migrations};

    use super::DemoSeedDataset;

    #[tokio::test]
    async fn seed_loads_and_verifies_on_a_fresh_database() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let result = DemoSeedDataset::load(&pool).await.expect("seed");
        assert_eq!(result.loads_seeded, 6);
        assert_eq!(result.carriers_seeded, 2);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        DemoSeedDataset::load(&pool).await.expect("first seed");
        DemoSeedDataset::load(&pool).await.expect("second seed");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM loads")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(total, 6, "re-seeding must not duplicate rows");
    }
}

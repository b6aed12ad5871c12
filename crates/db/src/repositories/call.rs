use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use loadline_core::domain::call::{
    CallId, CallOutcome, CallPhase, CallSession, CallState, NegotiationRound, RoundResponse,
    Sentiment,
};
use loadline_core::domain::carrier::McNumber;
use loadline_core::domain::load::LoadId;
use loadline_core::store::{CallStore, StoreError};

use super::{db_err, decode_err};
use crate::DbPool;

pub struct SqlCallStore {
    pool: DbPool,
}

impl SqlCallStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallStore for SqlCallStore {
    async fn create(&self, session: &CallSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO calls (call_id, mc_number, load_id, started_at, state, round_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&session.id.0)
        .bind(session.mc_number.as_str())
        .bind(session.load_id.as_ref().map(|id| id.0.as_str()))
        .bind(session.started_at)
        .bind(encode_state(&session.state))
        .bind(session.round_count() as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find(&self, id: &CallId) -> Result<Option<CallSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM calls WHERE call_id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let rounds = self.rounds_for_call(id).await?;
        session_from_row(&row, rounds).map(Some)
    }

    async fn record_round(
        &self,
        session: &CallSession,
        round: &NegotiationRound,
    ) -> Result<(), StoreError> {
        let response = serde_json::to_string(&round.response)
            .map_err(|error| decode_err(format!("round response encode failed: {error}")))?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "UPDATE calls
             SET state = ?2, round_count = ?3, final_rate = ?4, outcome = ?5
             WHERE call_id = ?1",
        )
        .bind(&session.id.0)
        .bind(encode_state(&session.state))
        .bind(session.round_count() as i64)
        .bind(session.final_rate.map(|rate| rate.to_string()))
        .bind(session.outcome.map(|outcome| outcome.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO negotiation_rounds
                 (call_id, group_token, round_number, carrier_offer, response, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&round.call_id.0)
        .bind(round.group_token.as_deref())
        .bind(round.round_number as i64)
        .bind(round.carrier_offer.to_string())
        .bind(response)
        .bind(round.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn update(&self, session: &CallSession) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE calls
             SET ended_at = ?2, duration_secs = ?3, state = ?4, final_rate = ?5,
                 outcome = ?6, sentiment = ?7, notes = ?8
             WHERE call_id = ?1",
        )
        .bind(&session.id.0)
        .bind(session.ended_at)
        .bind(session.duration_secs)
        .bind(encode_state(&session.state))
        .bind(session.final_rate.map(|rate| rate.to_string()))
        .bind(session.outcome.map(|outcome| outcome.as_str()))
        .bind(session.sentiment.map(|sentiment| sentiment.as_str()))
        .bind(session.notes.as_deref())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn rounds_for_call(&self, id: &CallId) -> Result<Vec<NegotiationRound>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM negotiation_rounds WHERE call_id = ?1 ORDER BY round_number",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(round_from_row).collect()
    }

    async fn rounds_for_group(&self, token: &str) -> Result<Vec<NegotiationRound>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM negotiation_rounds WHERE group_token = ?1
             ORDER BY recorded_at, round_number",
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(round_from_row).collect()
    }
}

fn encode_state(state: &CallState) -> &'static str {
    match state {
        CallState::Active(CallPhase::Pitching) => "pitching",
        CallState::Active(CallPhase::Negotiating) => "negotiating",
        CallState::Terminal(outcome) => outcome.as_str(),
    }
}

fn decode_state(value: &str) -> Result<CallState, StoreError> {
    match value {
        "pitching" => Ok(CallState::Active(CallPhase::Pitching)),
        "negotiating" => Ok(CallState::Active(CallPhase::Negotiating)),
        other => CallOutcome::parse(other)
            .map(CallState::Terminal)
            .ok_or_else(|| decode_err(format!("unknown call state `{other}`"))),
    }
}

fn decode_rate(value: Option<String>, column: &str) -> Result<Option<Decimal>, StoreError> {
    value
        .map(|raw| {
            raw.parse::<Decimal>()
                .map_err(|_| decode_err(format!("column {column} holds a non-decimal `{raw}`")))
        })
        .transpose()
}

fn session_from_row(row: &SqliteRow, rounds: Vec<NegotiationRound>) -> Result<CallSession, StoreError> {
    let state = decode_state(&row.try_get::<String, _>("state").map_err(db_err)?)?;

    let outcome = row
        .try_get::<Option<String>, _>("outcome")
        .map_err(db_err)?
        .map(|raw| {
            CallOutcome::parse(&raw).ok_or_else(|| decode_err(format!("unknown outcome `{raw}`")))
        })
        .transpose()?;

    let sentiment = row
        .try_get::<Option<String>, _>("sentiment")
        .map_err(db_err)?
        .map(|raw| {
            Sentiment::parse(&raw).ok_or_else(|| decode_err(format!("unknown sentiment `{raw}`")))
        })
        .transpose()?;

    Ok(CallSession {
        id: CallId(row.try_get("call_id").map_err(db_err)?),
        mc_number: McNumber(row.try_get("mc_number").map_err(db_err)?),
        load_id: row
            .try_get::<Option<String>, _>("load_id")
            .map_err(db_err)?
            .map(LoadId),
        started_at: row.try_get::<DateTime<Utc>, _>("started_at").map_err(db_err)?,
        ended_at: row.try_get::<Option<DateTime<Utc>>, _>("ended_at").map_err(db_err)?,
        duration_secs: row.try_get::<Option<i64>, _>("duration_secs").map_err(db_err)?,
        state,
        rounds,
        final_rate: decode_rate(
            row.try_get::<Option<String>, _>("final_rate").map_err(db_err)?,
            "final_rate",
        )?,
        outcome,
        sentiment,
        notes: row.try_get::<Option<String>, _>("notes").map_err(db_err)?,
    })
}

fn round_from_row(row: &SqliteRow) -> Result<NegotiationRound, StoreError> {
    let response_raw: String = row.try_get("response").map_err(db_err)?;
    let response: RoundResponse = serde_json::from_str(&response_raw)
        .map_err(|error| decode_err(format!("round response decode failed: {error}")))?;

    let carrier_offer_raw: String = row.try_get("carrier_offer").map_err(db_err)?;
    let carrier_offer = carrier_offer_raw
        .parse::<Decimal>()
        .map_err(|_| decode_err(format!("carrier_offer holds a non-decimal `{carrier_offer_raw}`")))?;

    Ok(NegotiationRound {
        call_id: CallId(row.try_get("call_id").map_err(db_err)?),
        group_token: row.try_get::<Option<String>, _>("group_token").map_err(db_err)?,
        round_number: row.try_get::<i64, _>("round_number").map_err(db_err)? as u32,
        carrier_offer,
        response,
        recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at").map_err(db_err)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use loadline_core::domain::call::{CallOutcome, CallSession, CallState, Sentiment};
    use loadline_core::domain::carrier::McNumber;
    use loadline_core::domain::load::LoadId;
    use loadline_core::negotiation::engine::{CounterBasis, RateDecision};
    use loadline_core::store::CallStore;

    use crate::{connect_with_settings, migrations};

    use super::SqlCallStore;

    async fn store() -> SqlCallStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlCallStore::new(pool)
    }

    fn session() -> CallSession {
        CallSession::open(
            McNumber::new("123456"),
            Some(LoadId("LD-1001".to_string())),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn sessions_round_trip_through_sqlite() {
        let store = store().await;
        let session = session();

        store.create(&session).await.expect("create");
        let loaded = store.find(&session.id).await.expect("find").expect("session exists");

        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.mc_number, session.mc_number);
        assert_eq!(loaded.load_id, session.load_id);
        assert_eq!(loaded.state, session.state);
        assert!(loaded.rounds.is_empty());
        assert_eq!(loaded.final_rate, None);
    }

    #[tokio::test]
    async fn recording_a_round_persists_session_and_history_together() {
        let store = store().await;
        let mut session = session();
        store.create(&session).await.expect("create");

        let decision = RateDecision::Counter {
            offer: Decimal::new(186_000, 2),
            basis: CounterBasis::FloorAnchored,
        };
        let round = session
            .record_round(Decimal::from(1500), &decision, Some("sess_a".to_string()), 3, Utc::now())
            .expect("record")
            .clone();
        store.record_round(&session, &round).await.expect("persist round");

        let loaded = store.find(&session.id).await.expect("find").expect("session");
        assert_eq!(loaded.round_count(), 1);
        assert_eq!(loaded.rounds[0].round_number, 1);
        assert_eq!(loaded.rounds[0].carrier_offer, Decimal::from(1500));
        assert_eq!(loaded.rounds[0].response, round.response);
        assert_eq!(loaded.state, session.state);

        let grouped = store.rounds_for_group("sess_a").await.expect("group query");
        assert_eq!(grouped.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_round_numbers_are_rejected_by_the_schema() {
        let store = store().await;
        let mut session = session();
        store.create(&session).await.expect("create");

        let decision = RateDecision::Counter {
            offer: Decimal::new(186_000, 2),
            basis: CounterBasis::FloorAnchored,
        };
        let round = session
            .record_round(Decimal::from(1500), &decision, None, 3, Utc::now())
            .expect("record")
            .clone();
        store.record_round(&session, &round).await.expect("first persist");

        let error = store
            .record_round(&session, &round)
            .await
            .expect_err("same round number twice must fail");
        assert!(error.to_string().contains("database"), "unexpected error: {error}");
    }

    #[tokio::test]
    async fn closure_fields_survive_an_update() {
        let store = store().await;
        let mut session = session();
        store.create(&session).await.expect("create");

        let accept = RateDecision::Accept { rate: Decimal::from(1850) };
        let round = session
            .record_round(Decimal::from(1850), &accept, None, 3, Utc::now())
            .expect("record")
            .clone();
        store.record_round(&session, &round).await.expect("persist round");

        let ended = session.started_at + Duration::seconds(312);
        session
            .close(CallOutcome::Accepted, Sentiment::Positive, Some("booked".to_string()), ended)
            .expect("close");
        store.update(&session).await.expect("update");

        let loaded = store.find(&session.id).await.expect("find").expect("session");
        assert_eq!(loaded.state, CallState::Terminal(CallOutcome::Accepted));
        assert_eq!(loaded.duration_secs, Some(312));
        assert_eq!(loaded.final_rate, Some(Decimal::from(1850)));
        assert_eq!(loaded.sentiment, Some(Sentiment::Positive));
        assert_eq!(loaded.notes.as_deref(), Some("booked"));
        assert!(loaded.is_closed());
    }

    #[tokio::test]
    async fn missing_calls_resolve_to_none() {
        let store = store().await;
        let found = store
            .find(&loadline_core::domain::call::CallId("missing".to_string()))
            .await
            .expect("query");
        assert!(found.is_none());
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::call::{CallId, CallSession, NegotiationRound};
use crate::domain::carrier::{CarrierInfo, McNumber};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("stored record invalid: {0}")]
    Decode(String),
}

/// Persistence seam for call sessions and their round history.
///
/// `record_round` must persist the updated session and the appended round
/// as one unit; a failure leaves the previously stored session untouched.
#[async_trait]
pub trait CallStore: Send + Sync {
    async fn create(&self, session: &CallSession) -> Result<(), StoreError>;

    async fn find(&self, id: &CallId) -> Result<Option<CallSession>, StoreError>;

    async fn record_round(
        &self,
        session: &CallSession,
        round: &NegotiationRound,
    ) -> Result<(), StoreError>;

    /// Persist closure fields (end time, duration, outcome, sentiment, notes).
    async fn update(&self, session: &CallSession) -> Result<(), StoreError>;

    async fn rounds_for_call(&self, id: &CallId) -> Result<Vec<NegotiationRound>, StoreError>;

    async fn rounds_for_group(&self, token: &str) -> Result<Vec<NegotiationRound>, StoreError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCarrier {
    pub info: CarrierInfo,
    pub verified_at: DateTime<Utc>,
}

/// Verified carriers are kept locally so repeat callers resolve without a
/// registry round trip for reads.
#[async_trait]
pub trait CarrierStore: Send + Sync {
    async fn upsert_verified(
        &self,
        info: &CarrierInfo,
        verified_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find(&self, mc: &McNumber) -> Result<Option<StoredCarrier>, StoreError>;
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{CatalogConfig, NegotiationConfig};
use crate::domain::call::{CallId, CallOutcome, CallSession, NegotiationRound, Sentiment};
use crate::domain::carrier::{CarrierRegistry, McNumber};
use crate::domain::load::{BookingOutcome, LoadCatalog, LoadId, LoadPreferences, LoadSnapshot};
use crate::errors::{CallError, DomainError, LookupFailure};
use crate::negotiation::engine::RateEngine;
use crate::negotiation::messages;
use crate::store::{CallStore, CarrierStore, StoredCarrier};

#[derive(Clone, Debug, Serialize)]
pub struct CallStarted {
    pub call_id: CallId,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundReply {
    pub accepted: bool,
    pub message: String,
    pub should_transfer: bool,
    pub round_number: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BookingStatus {
    Booked { load_id: LoadId },
    Conflict { load_id: LoadId },
    Failed { load_id: LoadId, detail: String },
    Skipped,
}

#[derive(Clone, Debug, Serialize)]
pub struct CallClosed {
    pub call_id: CallId,
    pub outcome: CallOutcome,
    pub duration_secs: i64,
    pub booking: BookingStatus,
    pub already_closed: bool,
}

/// One async mutex per call id. A call is mutated by one request at a time,
/// which keeps round numbers contiguous; distinct calls proceed in parallel.
#[derive(Default)]
struct CallLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl CallLocks {
    fn for_call(&self, id: &CallId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(id.0.clone()).or_default().clone()
    }
}

/// Drives a call end to end: verify, pitch, negotiate, close, book.
///
/// Every operation loads the session, mutates a copy, and persists it in a
/// single store call before answering; a failed operation leaves the stored
/// session exactly as it was.
pub struct CallOrchestrator {
    registry: Arc<dyn CarrierRegistry>,
    catalog: Arc<dyn LoadCatalog>,
    calls: Arc<dyn CallStore>,
    carriers: Arc<dyn CarrierStore>,
    engine: RateEngine,
    catalog_config: CatalogConfig,
    locks: CallLocks,
}

impl CallOrchestrator {
    pub fn new(
        registry: Arc<dyn CarrierRegistry>,
        catalog: Arc<dyn LoadCatalog>,
        calls: Arc<dyn CallStore>,
        carriers: Arc<dyn CarrierStore>,
        negotiation: NegotiationConfig,
        catalog_config: CatalogConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            calls,
            carriers,
            engine: RateEngine::new(negotiation),
            catalog_config,
            locks: CallLocks::default(),
        }
    }

    /// Verify the carrier and open a session. No session exists unless the
    /// carrier resolved and passed eligibility.
    pub async fn start_call(
        &self,
        mc_raw: &str,
        load_id: Option<LoadId>,
    ) -> Result<CallStarted, CallError> {
        let mc = McNumber::new(mc_raw);

        let info = match self.registry.verify(&mc).await {
            Ok(Some(info)) => info,
            Ok(None) => return Err(CallError::CarrierNotFound { mc }),
            Err(failure) => {
                warn!(
                    event_name = "call.verification_unavailable",
                    mc_number = %mc,
                    error = %failure,
                    "carrier verification did not complete"
                );
                return Err(failure.into());
            }
        };

        if !self.registry.is_eligible(&info) {
            return Err(CallError::CarrierIneligible {
                mc,
                status: info.operating_status.clone(),
            });
        }

        let now = Utc::now();
        self.carriers.upsert_verified(&info, now).await?;

        let session = CallSession::open(mc, load_id, now);
        self.calls.create(&session).await?;

        info!(
            event_name = "call.started",
            call_id = %session.id,
            mc_number = %session.mc_number,
            load_id = session.load_id.as_ref().map(|id| id.0.as_str()).unwrap_or("unbound"),
            "call started with verified carrier"
        );

        Ok(CallStarted { call_id: session.id, message: messages::welcome(&info) })
    }

    /// Candidate loads for the carrier, best rate first. Leaves the call
    /// state untouched; an empty list is a valid pitch.
    pub async fn pitch_loads(
        &self,
        call_id: &CallId,
        preferences: &LoadPreferences,
    ) -> Result<Vec<LoadSnapshot>, CallError> {
        let session = self.require_session(call_id).await?;
        if !session.is_active() {
            return Err(DomainError::CallNotActive { state: session.state }.into());
        }

        let candidates = self
            .catalog
            .find_candidates(&session.mc_number, preferences, self.catalog_config.pitch_limit)
            .await
            .map_err(|error| LookupFailure(error.to_string()))?;

        info!(
            event_name = "call.loads_pitched",
            call_id = %call_id,
            candidates = candidates.len(),
            "candidate loads fetched"
        );
        Ok(candidates)
    }

    /// Run one negotiation round. Appends exactly one history entry and
    /// applies the engine's state effect; a transfer-worthy decision closes
    /// the automated part of the conversation.
    pub async fn negotiate(
        &self,
        call_id: &CallId,
        offer: Decimal,
        group_token: Option<String>,
    ) -> Result<RoundReply, CallError> {
        let gate = self.locks.for_call(call_id);
        let _serialized = gate.lock().await;

        let mut session = self.require_session(call_id).await?;
        if !session.is_active() {
            return Err(DomainError::CallNotActive { state: session.state }.into());
        }

        let load_id =
            session.load_id.clone().ok_or_else(|| CallError::NoLoadBound(call_id.clone()))?;
        let load = self
            .catalog
            .get(&load_id)
            .await
            .map_err(|error| LookupFailure(error.to_string()))?
            .ok_or(CallError::LoadNotFound(load_id))?;

        let round_number = session.next_round_number();
        let decision = self.engine.decide(offer, load.posted_rate, round_number);

        let max_rounds = self.engine.config().max_rounds;
        let round = session
            .record_round(offer, &decision, group_token, max_rounds, Utc::now())?
            .clone();
        self.calls.record_round(&session, &round).await?;

        info!(
            event_name = "call.round_recorded",
            call_id = %call_id,
            round_number = round.round_number,
            carrier_offer = %offer,
            accepted = decision.is_accept(),
            should_transfer = decision.should_transfer(),
            "negotiation round recorded"
        );

        Ok(RoundReply {
            accepted: decision.is_accept(),
            message: messages::negotiation_reply(&decision, offer, round_number),
            should_transfer: decision.should_transfer(),
            round_number: round.round_number,
        })
    }

    /// Close the call and, for an accepted outcome with an agreed rate,
    /// book the load. Booking failure is reported in the ack and never
    /// blocks closure; closing an already-closed call is an idempotent ack.
    pub async fn end_call(
        &self,
        call_id: &CallId,
        outcome: CallOutcome,
        sentiment: Sentiment,
        notes: Option<String>,
    ) -> Result<CallClosed, CallError> {
        let gate = self.locks.for_call(call_id);
        let _serialized = gate.lock().await;

        let mut session = self.require_session(call_id).await?;
        if session.is_closed() {
            return Ok(CallClosed {
                call_id: session.id.clone(),
                outcome: session.outcome.unwrap_or(outcome),
                duration_secs: session.duration_secs.unwrap_or(0),
                booking: BookingStatus::Skipped,
                already_closed: true,
            });
        }

        session.close(outcome, sentiment, notes, Utc::now())?;
        self.calls.update(&session).await?;

        let booking = match (session.outcome, &session.final_rate, &session.load_id) {
            (Some(CallOutcome::Accepted), Some(rate), Some(load_id)) => {
                self.book_closed_call(load_id, &session.mc_number, *rate).await
            }
            _ => BookingStatus::Skipped,
        };

        info!(
            event_name = "call.closed",
            call_id = %call_id,
            outcome = outcome.as_str(),
            sentiment = sentiment.as_str(),
            duration_secs = session.duration_secs.unwrap_or(0),
            "call closed"
        );

        Ok(CallClosed {
            call_id: session.id.clone(),
            outcome,
            duration_secs: session.duration_secs.unwrap_or(0),
            booking,
            already_closed: false,
        })
    }

    pub async fn get_call(&self, call_id: &CallId) -> Result<CallSession, CallError> {
        self.require_session(call_id).await
    }

    pub async fn rounds_for_call(
        &self,
        call_id: &CallId,
    ) -> Result<Vec<NegotiationRound>, CallError> {
        self.require_session(call_id).await?;
        Ok(self.calls.rounds_for_call(call_id).await?)
    }

    pub async fn rounds_for_group(
        &self,
        token: &str,
    ) -> Result<Vec<NegotiationRound>, CallError> {
        Ok(self.calls.rounds_for_group(token).await?)
    }

    pub async fn carrier_profile(
        &self,
        mc_raw: &str,
    ) -> Result<Option<StoredCarrier>, CallError> {
        Ok(self.carriers.find(&McNumber::new(mc_raw)).await?)
    }

    async fn require_session(&self, id: &CallId) -> Result<CallSession, CallError> {
        self.calls
            .find(id)
            .await?
            .ok_or_else(|| CallError::SessionNotFound(id.clone()))
    }

    async fn book_closed_call(
        &self,
        load_id: &LoadId,
        mc: &McNumber,
        rate: Decimal,
    ) -> BookingStatus {
        match self.catalog.book(load_id, mc, rate).await {
            Ok(BookingOutcome::Booked) => {
                info!(
                    event_name = "call.load_booked",
                    load_id = %load_id,
                    mc_number = %mc,
                    agreed_rate = %rate,
                    "load booked at agreed rate"
                );
                BookingStatus::Booked { load_id: load_id.clone() }
            }
            Ok(BookingOutcome::Conflict) => {
                warn!(
                    event_name = "call.booking_conflict",
                    load_id = %load_id,
                    error = %CallError::BookingConflict(load_id.clone()),
                    "load was taken before booking completed"
                );
                BookingStatus::Conflict { load_id: load_id.clone() }
            }
            Err(error) => {
                warn!(
                    event_name = "call.booking_failed",
                    load_id = %load_id,
                    error = %error,
                    "booking did not complete"
                );
                BookingStatus::Failed { load_id: load_id.clone(), detail: error.to_string() }
            }
        }
    }
}

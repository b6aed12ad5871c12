use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::carrier::McNumber;
use crate::domain::load::LoadId;
use crate::errors::DomainError;
use crate::negotiation::engine::{EscalationReason, RateDecision};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Accepted,
    Rejected,
    Transferred,
    Abandoned,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Transferred => "transferred",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "transferred" => Some(Self::Transferred),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPhase {
    Pitching,
    Negotiating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum CallState {
    Active(CallPhase),
    Terminal(CallOutcome),
}

impl CallState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// What the system answered in one negotiation round. Mirrors the engine
/// decision so the counter value survives as a number, not a substring of
/// the reply text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum RoundResponse {
    Accepted { rate: Decimal },
    Countered { counter_offer: Decimal },
    Escalated { reason: EscalationReason },
}

impl From<&RateDecision> for RoundResponse {
    fn from(decision: &RateDecision) -> Self {
        match decision {
            RateDecision::Accept { rate } => Self::Accepted { rate: *rate },
            RateDecision::Counter { offer, .. } => Self::Countered { counter_offer: *offer },
            RateDecision::Escalate { reason } => Self::Escalated { reason: *reason },
        }
    }
}

/// Append-only history entry. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationRound {
    pub call_id: CallId,
    pub group_token: Option<String>,
    pub round_number: u32,
    pub carrier_offer: Decimal,
    pub response: RoundResponse,
    pub recorded_at: DateTime<Utc>,
}

/// One end-to-end carrier call. Created only after the carrier verified;
/// closed exactly once, never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub id: CallId,
    pub mc_number: McNumber,
    pub load_id: Option<LoadId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub state: CallState,
    pub rounds: Vec<NegotiationRound>,
    pub final_rate: Option<Decimal>,
    pub outcome: Option<CallOutcome>,
    pub sentiment: Option<Sentiment>,
    pub notes: Option<String>,
}

impl CallSession {
    pub fn open(mc_number: McNumber, load_id: Option<LoadId>, now: DateTime<Utc>) -> Self {
        Self {
            id: CallId::generate(),
            mc_number,
            load_id,
            started_at: now,
            ended_at: None,
            duration_secs: None,
            state: CallState::Active(CallPhase::Pitching),
            rounds: Vec::new(),
            final_rate: None,
            outcome: None,
            sentiment: None,
            notes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    pub fn round_count(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// 1-based number of the round that would be recorded next.
    pub fn next_round_number(&self) -> u32 {
        self.round_count() + 1
    }

    /// Append the round for an engine decision and apply its state effect.
    /// Round numbers stay contiguous from 1; the history never shrinks.
    pub fn record_round(
        &mut self,
        carrier_offer: Decimal,
        decision: &RateDecision,
        group_token: Option<String>,
        max_rounds: u32,
        now: DateTime<Utc>,
    ) -> Result<&NegotiationRound, DomainError> {
        if !self.is_active() {
            return Err(DomainError::CallNotActive { state: self.state });
        }
        if self.round_count() >= max_rounds {
            return Err(DomainError::RoundLimitExceeded { limit: max_rounds });
        }

        let index = self.rounds.len();
        let round_number = self.next_round_number();
        self.rounds.push(NegotiationRound {
            call_id: self.id.clone(),
            group_token,
            round_number,
            carrier_offer,
            response: RoundResponse::from(decision),
            recorded_at: now,
        });

        match decision {
            RateDecision::Accept { rate } => {
                self.final_rate = Some(*rate);
                self.outcome = Some(CallOutcome::Accepted);
                self.state = CallState::Terminal(CallOutcome::Accepted);
            }
            RateDecision::Counter { .. } => {
                self.state = CallState::Active(CallPhase::Negotiating);
            }
            RateDecision::Escalate { .. } => {
                self.outcome = Some(CallOutcome::Transferred);
                self.state = CallState::Terminal(CallOutcome::Transferred);
            }
        }

        Ok(&self.rounds[index])
    }

    /// Close the call: stamp the end time, duration, and final outcome.
    /// A final rate only survives an accepted outcome.
    pub fn close(
        &mut self,
        outcome: CallOutcome,
        sentiment: Sentiment,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.is_closed() {
            return Err(DomainError::CallAlreadyClosed);
        }

        self.ended_at = Some(now);
        self.duration_secs = Some((now - self.started_at).num_seconds());
        self.state = CallState::Terminal(outcome);
        self.outcome = Some(outcome);
        self.sentiment = Some(sentiment);
        if notes.is_some() {
            self.notes = notes;
        }
        if outcome != CallOutcome::Accepted {
            self.final_rate = None;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use crate::domain::carrier::McNumber;
    use crate::domain::load::LoadId;
    use crate::errors::DomainError;
    use crate::negotiation::engine::{CounterBasis, EscalationReason, RateDecision};

    use super::{CallOutcome, CallPhase, CallSession, CallState, RoundResponse, Sentiment};

    fn session() -> CallSession {
        CallSession::open(
            McNumber::new("123456"),
            Some(LoadId("LD-1001".to_string())),
            Utc::now(),
        )
    }

    fn counter(offer: i64) -> RateDecision {
        RateDecision::Counter { offer: Decimal::from(offer), basis: CounterBasis::Sweetened }
    }

    #[test]
    fn new_sessions_start_pitching_with_no_rounds() {
        let session = session();
        assert_eq!(session.state, CallState::Active(CallPhase::Pitching));
        assert_eq!(session.round_count(), 0);
        assert_eq!(session.next_round_number(), 1);
        assert!(!session.is_closed());
    }

    #[test]
    fn counter_rounds_keep_the_call_active_and_number_contiguously() {
        let mut session = session();
        let now = Utc::now();

        for expected in 1..=3u32 {
            let round = session
                .record_round(Decimal::from(1500), &counter(1860), None, 5, now)
                .expect("round should record");
            assert_eq!(round.round_number, expected);
        }

        assert_eq!(session.state, CallState::Active(CallPhase::Negotiating));
        let numbers = session.rounds.iter().map(|r| r.round_number).collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn accepting_decision_sets_final_rate_and_terminal_state() {
        let mut session = session();
        session
            .record_round(
                Decimal::from(1850),
                &RateDecision::Accept { rate: Decimal::from(1850) },
                None,
                3,
                Utc::now(),
            )
            .expect("accept should record");

        assert_eq!(session.state, CallState::Terminal(CallOutcome::Accepted));
        assert_eq!(session.outcome, Some(CallOutcome::Accepted));
        assert_eq!(session.final_rate, Some(Decimal::from(1850)));
        assert_eq!(
            session.rounds[0].response,
            RoundResponse::Accepted { rate: Decimal::from(1850) }
        );
    }

    #[test]
    fn escalating_decision_transfers_the_call() {
        let mut session = session();
        session
            .record_round(
                Decimal::from(1200),
                &RateDecision::Escalate { reason: EscalationReason::RateFloorHeld },
                None,
                3,
                Utc::now(),
            )
            .expect("escalation should record");

        assert_eq!(session.state, CallState::Terminal(CallOutcome::Transferred));
        assert_eq!(session.final_rate, None);
    }

    #[test]
    fn rounds_cannot_be_recorded_on_terminal_calls() {
        let mut session = session();
        session
            .record_round(
                Decimal::from(2000),
                &RateDecision::Accept { rate: Decimal::from(2000) },
                None,
                3,
                Utc::now(),
            )
            .expect("accept");

        let error = session
            .record_round(Decimal::from(1900), &counter(1950), None, 3, Utc::now())
            .expect_err("terminal call must refuse rounds");
        assert!(matches!(error, DomainError::CallNotActive { .. }));
        assert_eq!(session.round_count(), 1);
    }

    #[test]
    fn round_limit_guard_refuses_to_grow_history_past_the_maximum() {
        let mut session = session();
        let now = Utc::now();
        session.record_round(Decimal::from(1500), &counter(1860), None, 2, now).expect("round 1");
        session.record_round(Decimal::from(1600), &counter(1860), None, 2, now).expect("round 2");

        let error = session
            .record_round(Decimal::from(1700), &counter(1860), None, 2, now)
            .expect_err("limit must hold");
        assert_eq!(error, DomainError::RoundLimitExceeded { limit: 2 });
        assert_eq!(session.round_count(), 2);
    }

    #[test]
    fn group_tokens_ride_along_without_affecting_numbering() {
        let mut session = session();
        let round = session
            .record_round(
                Decimal::from(1500),
                &counter(1860),
                Some("sess_retry_a1".to_string()),
                3,
                Utc::now(),
            )
            .expect("round");
        assert_eq!(round.group_token.as_deref(), Some("sess_retry_a1"));
        assert_eq!(round.round_number, 1);
    }

    #[test]
    fn close_stamps_end_time_duration_and_outcome() {
        let mut session = session();
        let ended = session.started_at + Duration::seconds(247);

        session
            .close(CallOutcome::Rejected, Sentiment::Negative, Some("rate too low".into()), ended)
            .expect("close");

        assert_eq!(session.ended_at, Some(ended));
        assert_eq!(session.duration_secs, Some(247));
        assert_eq!(session.state, CallState::Terminal(CallOutcome::Rejected));
        assert_eq!(session.sentiment, Some(Sentiment::Negative));
        assert_eq!(session.notes.as_deref(), Some("rate too low"));
    }

    #[test]
    fn close_is_refused_once_the_call_has_ended() {
        let mut session = session();
        let ended = session.started_at + Duration::seconds(60);
        session.close(CallOutcome::Abandoned, Sentiment::Neutral, None, ended).expect("close");

        let error = session
            .close(CallOutcome::Rejected, Sentiment::Negative, None, ended + Duration::seconds(30))
            .expect_err("second close must be refused");
        assert_eq!(error, DomainError::CallAlreadyClosed);
        // First closure stands untouched.
        assert_eq!(session.duration_secs, Some(60));
        assert_eq!(session.outcome, Some(CallOutcome::Abandoned));
    }

    #[test]
    fn final_rate_survives_only_accepted_outcomes() {
        let mut accepted = session();
        accepted
            .record_round(
                Decimal::from(1850),
                &RateDecision::Accept { rate: Decimal::from(1850) },
                None,
                3,
                Utc::now(),
            )
            .expect("accept");
        accepted
            .close(CallOutcome::Accepted, Sentiment::Positive, None, Utc::now())
            .expect("close");
        assert_eq!(accepted.final_rate, Some(Decimal::from(1850)));

        let mut walked_back = session();
        walked_back
            .record_round(
                Decimal::from(1850),
                &RateDecision::Accept { rate: Decimal::from(1850) },
                None,
                3,
                Utc::now(),
            )
            .expect("accept");
        walked_back
            .close(CallOutcome::Rejected, Sentiment::Negative, None, Utc::now())
            .expect("close");
        assert_eq!(walked_back.final_rate, None);
    }
}

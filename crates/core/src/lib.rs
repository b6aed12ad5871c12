pub mod config;
pub mod domain;
pub mod errors;
pub mod negotiation;
pub mod orchestrator;
pub mod store;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, NegotiationConfig, RegistryMode};
pub use domain::call::{
    CallId, CallOutcome, CallPhase, CallSession, CallState, NegotiationRound, RoundResponse,
    Sentiment,
};
pub use domain::carrier::{CarrierInfo, CarrierRegistry, McNumber};
pub use domain::load::{
    BookingOutcome, LoadCatalog, LoadId, LoadPreferences, LoadSnapshot, LoadStatus,
};
pub use errors::{CallError, DomainError, LookupFailure};
pub use negotiation::{CounterBasis, EscalationReason, RateDecision, RateEngine, RateTerms};
pub use orchestrator::{BookingStatus, CallClosed, CallOrchestrator, CallStarted, RoundReply};
pub use store::{CallStore, CarrierStore, StoreError, StoredCarrier};

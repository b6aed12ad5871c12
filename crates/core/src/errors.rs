use thiserror::Error;

use crate::domain::call::{CallId, CallState};
use crate::domain::carrier::McNumber;
use crate::domain::load::LoadId;
use crate::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("call is not active (state: {state:?})")]
    CallNotActive { state: CallState },
    #[error("call has already been closed")]
    CallAlreadyClosed,
    #[error("negotiation round limit of {limit} reached")]
    RoundLimitExceeded { limit: u32 },
}

/// Registry or catalog transport failure. Timeouts land here too; the
/// caller decides whether to degrade or propagate.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("lookup failed: {0}")]
pub struct LookupFailure(pub String);

#[derive(Debug, Error)]
pub enum CallError {
    #[error("carrier {mc} not found in registry")]
    CarrierNotFound { mc: McNumber },
    #[error("carrier {mc} is not eligible (status: {status})")]
    CarrierIneligible { mc: McNumber, status: String },
    #[error(transparent)]
    Lookup(#[from] LookupFailure),
    #[error("call {0} not found")]
    SessionNotFound(CallId),
    #[error("load {0} not found")]
    LoadNotFound(LoadId),
    #[error("call {0} has no load bound to negotiate against")]
    NoLoadBound(CallId),
    #[error("load {0} is no longer available")]
    BookingConflict(LoadId),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl CallError {
    /// Stable machine-readable kind for structured failure payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CarrierNotFound { .. } => "carrier_not_found",
            Self::CarrierIneligible { .. } => "carrier_ineligible",
            Self::Lookup(_) => "lookup_failure",
            Self::SessionNotFound(_) => "session_not_found",
            Self::LoadNotFound(_) => "load_not_found",
            Self::NoLoadBound(_) => "no_load_bound",
            Self::BookingConflict(_) => "booking_conflict",
            Self::Domain(DomainError::RoundLimitExceeded { .. }) => "round_limit_exceeded",
            Self::Domain(_) => "invalid_call_state",
            Self::Persistence(_) => "persistence_failure",
        }
    }
}

impl From<StoreError> for CallError {
    fn from(value: StoreError) -> Self {
        Self::Persistence(value.to_string())
    }
}

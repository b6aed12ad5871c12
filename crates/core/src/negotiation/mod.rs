pub mod engine;
pub mod messages;

pub use engine::{CounterBasis, EscalationReason, RateDecision, RateEngine, RateTerms};

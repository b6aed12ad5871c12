//! Spoken-reply templates. Wording is presentation; the dollar amounts
//! embedded in each line must match the engine's numbers exactly.

use rust_decimal::Decimal;

use crate::domain::carrier::CarrierInfo;
use crate::negotiation::engine::{CounterBasis, EscalationReason, RateDecision};

pub fn format_rate(rate: Decimal) -> String {
    format!("${:.2}", rate)
}

pub fn welcome(info: &CarrierInfo) -> String {
    format!("Welcome {}! Your MC number has been verified.", info.legal_name)
}

pub fn verification_unavailable() -> String {
    "We could not reach the carrier verification service. Please try again in a few minutes."
        .to_string()
}

pub fn negotiation_reply(decision: &RateDecision, offer: Decimal, round_number: u32) -> String {
    match decision {
        RateDecision::Accept { rate } if round_number <= 1 => format!(
            "Excellent! We accept your offer of {}. Let me transfer you to complete the booking.",
            format_rate(*rate)
        ),
        RateDecision::Accept { rate } => format!(
            "I can work with {}. Let me get you connected with our dispatch team to finalize the details.",
            format_rate(*rate)
        ),
        RateDecision::Counter { offer: counter, basis: CounterBasis::Sweetened } => format!(
            "I appreciate your offer of {}. Given the urgency and mileage, could we meet at {}?",
            format_rate(offer),
            format_rate(*counter)
        ),
        RateDecision::Counter { offer: counter, basis: CounterBasis::FloorAnchored } => format!(
            "I understand your position at {}, but that's quite a bit below our rate. How about {}? This load has great backhaul opportunities.",
            format_rate(offer),
            format_rate(*counter)
        ),
        RateDecision::Escalate { reason: EscalationReason::RoundLimitReached } => {
            "Maximum negotiation rounds reached. Let me transfer you to a sales representative."
                .to_string()
        }
        RateDecision::Escalate { reason: EscalationReason::RateFloorHeld } => {
            "I understand we're not quite aligned on rate. Let me connect you with our sales manager who may have more flexibility."
                .to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::config::NegotiationConfig;
    use crate::negotiation::engine::{RateDecision, RateEngine};

    use super::{format_rate, negotiation_reply};

    #[test]
    fn rates_render_with_two_decimals_and_currency_symbol() {
        assert_eq!(format_rate(Decimal::from(1900)), "$1900.00");
        assert_eq!(format_rate(Decimal::new(186_000, 2)), "$1860.00");
        assert_eq!(format_rate(Decimal::new(190_550, 2)), "$1905.50");
    }

    #[test]
    fn counter_reply_embeds_the_exact_engine_number() {
        let engine = RateEngine::new(NegotiationConfig::default());
        let offer = Decimal::from(1850);
        let decision = engine.decide(offer, Decimal::from(2000), 1);

        let reply = negotiation_reply(&decision, offer, 1);
        assert!(reply.contains("$1850.00"), "reply should echo the offer: {reply}");
        assert!(reply.contains("$1900.00"), "reply should carry the counter: {reply}");
    }

    #[test]
    fn low_offer_reply_embeds_the_anchored_counter() {
        let engine = RateEngine::new(NegotiationConfig::default());
        let offer = Decimal::from(1500);
        let decision = engine.decide(offer, Decimal::from(2000), 1);

        let reply = negotiation_reply(&decision, offer, 1);
        assert!(reply.contains("$1500.00"));
        assert!(reply.contains("$1860.00"));
    }

    #[test]
    fn accept_wording_differs_between_first_and_later_rounds() {
        let decision = RateDecision::Accept { rate: Decimal::from(1850) };

        let first = negotiation_reply(&decision, Decimal::from(1850), 1);
        let later = negotiation_reply(&decision, Decimal::from(1850), 2);

        assert!(first.contains("We accept your offer of $1850.00"));
        assert!(later.contains("I can work with $1850.00"));
    }

    #[test]
    fn escalation_replies_route_to_a_human() {
        let engine = RateEngine::new(NegotiationConfig::default());
        let reply = negotiation_reply(
            &engine.decide(Decimal::from(1500), Decimal::from(2000), 3),
            Decimal::from(1500),
            3,
        );
        assert!(reply.contains("sales manager"));
    }
}

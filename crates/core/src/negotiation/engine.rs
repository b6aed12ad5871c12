use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::NegotiationConfig;

/// Thresholds derived from a load's posted rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateTerms {
    pub minimum_acceptable: Decimal,
    pub ideal_target: Decimal,
}

impl RateTerms {
    pub fn derive(posted_rate: Decimal, config: &NegotiationConfig) -> Self {
        Self {
            minimum_acceptable: posted_rate * config.floor_pct,
            ideal_target: posted_rate * config.target_pct,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterBasis {
    /// In-band first-round counter nudging the offer toward the target.
    Sweetened,
    /// Low-ball counter anchored near the posted rate.
    FloorAnchored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    RoundLimitReached,
    RateFloorHeld,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum RateDecision {
    Accept { rate: Decimal },
    Counter { offer: Decimal, basis: CounterBasis },
    Escalate { reason: EscalationReason },
}

impl RateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }

    /// Accepts and escalations both hand the caller to a human; counters
    /// keep the automated conversation going.
    pub fn should_transfer(&self) -> bool {
        !matches!(self, Self::Counter { .. })
    }
}

/// Pure rate-decision function. No state, no I/O; the same inputs always
/// produce the same decision.
#[derive(Clone, Debug, Default)]
pub struct RateEngine {
    config: NegotiationConfig,
}

impl RateEngine {
    pub fn new(config: NegotiationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Decide the response to a carrier offer. `round_number` is the 1-based
    /// number of the round about to be recorded.
    pub fn decide(
        &self,
        offer: Decimal,
        posted_rate: Decimal,
        round_number: u32,
    ) -> RateDecision {
        let terms = RateTerms::derive(posted_rate, &self.config);

        if round_number > self.config.max_rounds {
            return RateDecision::Escalate { reason: EscalationReason::RoundLimitReached };
        }

        if offer >= posted_rate {
            return RateDecision::Accept { rate: offer };
        }

        if offer >= terms.minimum_acceptable {
            if round_number == 1 {
                let sweetened = offer * self.config.sweeten_pct;
                return RateDecision::Counter {
                    offer: terms.ideal_target.min(sweetened),
                    basis: CounterBasis::Sweetened,
                };
            }
            return RateDecision::Accept { rate: offer };
        }

        if round_number < self.config.max_rounds {
            let anchored = posted_rate * self.config.anchor_pct;
            return RateDecision::Counter {
                offer: terms.minimum_acceptable.max(anchored),
                basis: CounterBasis::FloorAnchored,
            };
        }

        RateDecision::Escalate { reason: EscalationReason::RateFloorHeld }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::config::NegotiationConfig;

    use super::{CounterBasis, EscalationReason, RateDecision, RateEngine, RateTerms};

    fn engine() -> RateEngine {
        RateEngine::new(NegotiationConfig::default())
    }

    fn dec(value: i64) -> Decimal {
        Decimal::from(value)
    }

    #[test]
    fn offer_at_posted_rate_is_accepted_and_transferred() {
        let decision = engine().decide(dec(2000), dec(2000), 1);
        assert_eq!(decision, RateDecision::Accept { rate: dec(2000) });
        assert!(decision.should_transfer());
    }

    #[test]
    fn in_band_first_round_offer_draws_sweetened_counter() {
        // min(2000 * 0.95, 1850 * 1.03) = min(1900, 1905.50) = 1900
        let decision = engine().decide(dec(1850), dec(2000), 1);
        assert_eq!(
            decision,
            RateDecision::Counter {
                offer: Decimal::new(190_000, 2),
                basis: CounterBasis::Sweetened,
            }
        );
        assert!(!decision.should_transfer());
    }

    #[test]
    fn in_band_later_round_offer_is_accepted() {
        let decision = engine().decide(dec(1850), dec(2000), 2);
        assert_eq!(decision, RateDecision::Accept { rate: dec(1850) });
        assert!(decision.should_transfer());
    }

    #[test]
    fn low_offer_draws_floor_anchored_counter() {
        // max(2000 * 0.90, 2000 * 0.93) = 1860
        let decision = engine().decide(dec(1500), dec(2000), 1);
        assert_eq!(
            decision,
            RateDecision::Counter {
                offer: Decimal::new(186_000, 2),
                basis: CounterBasis::FloorAnchored,
            }
        );
    }

    #[test]
    fn low_offer_at_final_round_escalates() {
        let decision = engine().decide(dec(1500), dec(2000), 3);
        assert_eq!(
            decision,
            RateDecision::Escalate { reason: EscalationReason::RateFloorHeld }
        );
        assert!(decision.should_transfer());
    }

    #[test]
    fn round_past_limit_escalates_even_for_generous_offers() {
        let decision = engine().decide(dec(2500), dec(2000), 4);
        assert_eq!(
            decision,
            RateDecision::Escalate { reason: EscalationReason::RoundLimitReached }
        );
    }

    #[test]
    fn offers_at_or_above_posted_rate_accept_for_every_round_in_limit() {
        let engine = engine();
        for round in 1..=3 {
            for offer in [dec(2000), dec(2001), dec(3000)] {
                assert_eq!(
                    engine.decide(offer, dec(2000), round),
                    RateDecision::Accept { rate: offer },
                    "offer {offer} at round {round}"
                );
            }
        }
    }

    #[test]
    fn sweetened_counter_never_undercuts_offers_below_the_target() {
        let engine = engine();
        let posted = dec(2000);
        let terms = RateTerms::derive(posted, engine.config());

        let mut offer = terms.minimum_acceptable;
        while offer <= terms.ideal_target {
            match engine.decide(offer, posted, 1) {
                RateDecision::Counter { offer: counter, .. } => {
                    assert!(counter >= offer, "counter {counter} under offer {offer}");
                }
                other => panic!("expected counter for in-band offer {offer}, got {other:?}"),
            }
            offer += dec(10);
        }
    }

    #[test]
    fn sweetened_counter_caps_at_the_ideal_target() {
        match engine().decide(dec(1950), dec(2000), 1) {
            RateDecision::Counter { offer, basis: CounterBasis::Sweetened } => {
                assert_eq!(offer, Decimal::new(190_000, 2));
            }
            other => panic!("expected sweetened counter, got {other:?}"),
        }
    }

    #[test]
    fn floor_anchored_counter_stays_above_low_offers() {
        let engine = engine();
        let expected = dec(2000) * Decimal::new(93, 2);

        for offer in [dec(1), dec(900), dec(1500), dec(1799)] {
            match engine.decide(offer, dec(2000), 1) {
                RateDecision::Counter { offer: counter, basis: CounterBasis::FloorAnchored } => {
                    assert_eq!(counter, expected);
                    assert!(counter > offer);
                }
                other => panic!("expected floor-anchored counter, got {other:?}"),
            }
        }
    }

    #[test]
    fn identical_inputs_always_yield_identical_decisions() {
        let engine = engine();
        let first = engine.decide(Decimal::new(184_250, 2), dec(2000), 1);
        for _ in 0..10 {
            assert_eq!(engine.decide(Decimal::new(184_250, 2), dec(2000), 1), first);
        }
    }

    #[test]
    fn custom_thresholds_shift_the_acceptance_band() {
        let engine = RateEngine::new(NegotiationConfig {
            max_rounds: 2,
            floor_pct: Decimal::new(80, 2),
            target_pct: Decimal::new(90, 2),
            sweeten_pct: Decimal::new(105, 2),
            anchor_pct: Decimal::new(85, 2),
        });

        // 1700 >= 2000 * 0.80, round 2 in-band accepts.
        assert_eq!(
            engine.decide(dec(1700), dec(2000), 2),
            RateDecision::Accept { rate: dec(1700) }
        );
        // Round 3 exceeds the custom limit of 2.
        assert_eq!(
            engine.decide(dec(1700), dec(2000), 3),
            RateDecision::Escalate { reason: EscalationReason::RoundLimitReached }
        );
    }
}

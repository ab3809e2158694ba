//! Rate engine: opening offer from intake facts, negotiation steps, floor checks.
//!
//! Every APR is a decimal percentage rounded to two places after each arithmetic
//! step. Functions here are pure; callers decide what to persist.

pub mod outcome;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::intake::Intake;

pub use outcome::NegotiationOutcome;

/// Slack allowed when comparing an offer against its floor.
pub const FLOOR_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Offer shown when a rate is requested before one has been computed.
pub const DISPLAY_FALLBACK_APR: Decimal = Decimal::from_parts(662, 0, 0, false, 2);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateContext {
    #[serde(rename = "baselineAPR", default, skip_serializing_if = "Option::is_none")]
    pub baseline_apr: Option<Decimal>,
    #[serde(rename = "offeredAPR", default, skip_serializing_if = "Option::is_none")]
    pub offered_apr: Option<Decimal>,
    #[serde(rename = "floorAPR", default, skip_serializing_if = "Option::is_none")]
    pub floor_apr: Option<Decimal>,
    #[serde(rename = "stepDown", default, skip_serializing_if = "Option::is_none")]
    pub step_down: Option<Decimal>,
    #[serde(default)]
    pub accepted: bool,
    #[serde(rename = "notaryDone", default)]
    pub notary_done: bool,
    #[serde(rename = "openingAPR", default, skip_serializing_if = "Option::is_none")]
    pub opening_apr: Option<Decimal>,
    #[serde(default)]
    pub rounds: u32,
}

impl RateContext {
    pub fn is_initialized(&self) -> bool {
        self.offered_apr.is_some()
    }
}

/// Fixed pricing parameters for the opening offer and the negotiation ladder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegotiationTerms {
    pub baseline_apr: Decimal,
    pub initial_offer_apr: Decimal,
    pub floor_apr: Decimal,
    pub step_down: Decimal,
    pub asset_threshold: u64,
    pub asset_adjustment: Decimal,
    pub first_time_buyer_adjustment: Decimal,
}

impl Default for NegotiationTerms {
    fn default() -> Self {
        Self {
            baseline_apr: Decimal::new(68, 1),
            initial_offer_apr: Decimal::new(662, 2),
            floor_apr: Decimal::new(645, 2),
            step_down: Decimal::new(3, 2),
            asset_threshold: 100_000,
            asset_adjustment: Decimal::new(3, 2),
            first_time_buyer_adjustment: Decimal::new(2, 2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub rate: RateContext,
    pub trace: Vec<RateTraceStep>,
}

pub trait RateEngine: Send + Sync {
    fn terms(&self) -> &NegotiationTerms;
    fn initial_rate(&self, intake: &Intake) -> RateQuote;
    fn counter_offer(&self, rate: &RateContext) -> RateContext;
    fn is_at_floor(&self, rate: &RateContext) -> bool;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicRateEngine {
    terms: NegotiationTerms,
}

impl DeterministicRateEngine {
    pub fn new(terms: NegotiationTerms) -> Self {
        Self { terms }
    }
}

impl RateEngine for DeterministicRateEngine {
    fn terms(&self) -> &NegotiationTerms {
        &self.terms
    }

    fn initial_rate(&self, intake: &Intake) -> RateQuote {
        compute_initial_rate_with_trace(intake, &self.terms)
    }

    fn counter_offer(&self, rate: &RateContext) -> RateContext {
        counter_offer(rate)
    }

    fn is_at_floor(&self, rate: &RateContext) -> bool {
        is_at_floor(rate)
    }
}

pub fn round_apr(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn compute_initial_rate(intake: &Intake, terms: &NegotiationTerms) -> RateContext {
    compute_initial_rate_with_trace(intake, terms).rate
}

pub fn compute_initial_rate_with_trace(intake: &Intake, terms: &NegotiationTerms) -> RateQuote {
    let mut offer = terms.initial_offer_apr;
    let mut trace = vec![
        RateTraceStep {
            stage: "baseline".to_string(),
            detail: "reference 30yr APR".to_string(),
            amount: terms.baseline_apr,
        },
        RateTraceStep {
            stage: "initial_offer".to_string(),
            detail: "default opening offer".to_string(),
            amount: offer,
        },
    ];

    if intake.assets.unwrap_or(0) > terms.asset_threshold {
        offer -= terms.asset_adjustment;
        trace.push(RateTraceStep {
            stage: "asset_adjustment".to_string(),
            detail: format!("assets above {}", terms.asset_threshold),
            amount: -terms.asset_adjustment,
        });
    }

    if intake.first_time_buyer == Some(true) {
        offer -= terms.first_time_buyer_adjustment;
        trace.push(RateTraceStep {
            stage: "first_time_buyer_adjustment".to_string(),
            detail: "first-time buyer".to_string(),
            amount: -terms.first_time_buyer_adjustment,
        });
    }

    let mut offer = round_apr(offer);
    if offer < terms.floor_apr {
        offer = terms.floor_apr;
        trace.push(RateTraceStep {
            stage: "floor_clamp".to_string(),
            detail: "adjusted offer raised to floor".to_string(),
            amount: terms.floor_apr,
        });
    }
    trace.push(RateTraceStep {
        stage: "offered".to_string(),
        detail: "rounded to 2 decimal places".to_string(),
        amount: offer,
    });

    RateQuote {
        rate: RateContext {
            baseline_apr: Some(terms.baseline_apr),
            offered_apr: Some(offer),
            floor_apr: Some(terms.floor_apr),
            step_down: Some(terms.step_down),
            accepted: false,
            notary_done: false,
            opening_apr: Some(offer),
            rounds: 0,
        },
        trace,
    }
}

/// One negotiation step. Accepted contexts and uninitialized ones come back unchanged.
/// The offer never rises, even when a stored context already sits below its floor.
pub fn counter_offer(rate: &RateContext) -> RateContext {
    if rate.accepted {
        return rate.clone();
    }

    let mut next = rate.clone();
    if let (Some(offered), Some(floor), Some(step)) =
        (rate.offered_apr, rate.floor_apr, rate.step_down)
    {
        let decreased = round_apr(offered - step);
        next.offered_apr = Some(decreased.max(floor).min(offered));
        next.rounds = rate.rounds.saturating_add(1);
    }
    next
}

pub fn is_at_floor(rate: &RateContext) -> bool {
    match (rate.offered_apr, rate.floor_apr) {
        (Some(offered), Some(floor)) => offered <= floor + FLOOR_TOLERANCE,
        _ => false,
    }
}

//! Read-only negotiation summary handed to reporting consumers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::session::{Session, SessionId};
use crate::flows::states::Phase;
use crate::rate::{is_at_floor, round_apr};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationOutcome {
    pub session_id: SessionId,
    pub phase: Phase,
    pub baseline_apr: Option<Decimal>,
    pub opening_apr: Decimal,
    pub current_apr: Decimal,
    pub floor_apr: Option<Decimal>,
    pub rounds: u32,
    /// Percentage points conceded since the opening offer.
    pub discount_points: Decimal,
    pub at_floor: bool,
    pub accepted: bool,
    pub notary_done: bool,
}

impl NegotiationOutcome {
    /// `None` until the credit step has produced an offer.
    pub fn from_session(session: &Session) -> Option<Self> {
        let rate = &session.rate;
        let current_apr = rate.offered_apr?;
        let opening_apr = rate.opening_apr.unwrap_or(current_apr);

        Some(Self {
            session_id: session.id.clone(),
            phase: session.phase,
            baseline_apr: rate.baseline_apr,
            opening_apr,
            current_apr,
            floor_apr: rate.floor_apr,
            rounds: rate.rounds,
            discount_points: round_apr(opening_apr - current_apr),
            at_floor: is_at_floor(rate),
            accepted: rate.accepted,
            notary_done: rate.notary_done,
        })
    }

    pub fn is_final(&self) -> bool {
        self.accepted && self.notary_done
    }
}

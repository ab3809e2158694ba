use serde::{Deserialize, Serialize};

/// Stage of the guided mortgage conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    AwaitingConsentBg,
    BgDone,
    CreditDone,
    RateReady,
    Negotiating,
    Notary,
    Final,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Intake,
        Phase::AwaitingConsentBg,
        Phase::BgDone,
        Phase::CreditDone,
        Phase::RateReady,
        Phase::Negotiating,
        Phase::Notary,
        Phase::Final,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::AwaitingConsentBg => "awaiting_consent_bg",
            Self::BgDone => "bg_done",
            Self::CreditDone => "credit_done",
            Self::RateReady => "rate_ready",
            Self::Negotiating => "negotiating",
            Self::Notary => "notary",
            Self::Final => "final",
        }
    }

    /// Position in the forward progression; `rate_ready` and `negotiating` share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Intake => 0,
            Self::AwaitingConsentBg => 1,
            Self::BgDone => 2,
            Self::CreditDone => 3,
            Self::RateReady | Self::Negotiating => 4,
            Self::Notary => 5,
            Self::Final => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Final)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Intake
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == value)
            .ok_or_else(|| format!("unknown phase `{value}`"))
    }
}

/// What an inbound message (or a chained follow-up) means for the current phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueEvent {
    IntakeIncomplete,
    IntakeCompleted,
    BackgroundConsentGiven,
    CreditConsentGiven,
    RateComputed,
    RateRequested,
    NegotiateRequested,
    AcceptRequested,
    NotaryCompleted,
    Unrecognized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueAction {
    MergeIntake,
    PromptForMissingFields,
    PromptForBackgroundConsent,
    RecordBackgroundCheck,
    RecordCreditCheck,
    ComputeInitialRate,
    ReportRate,
    CounterOffer,
    AcceptRate,
    CompleteNotary,
    DefaultPrompt,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Phase,
    pub to: Phase,
    pub event: DialogueEvent,
    pub actions: Vec<DialogueAction>,
    /// Event the engine must apply next within the same turn, if any.
    pub chained: Option<DialogueEvent>,
}

#[cfg(test)]
mod tests {
    use super::Phase;

    #[test]
    fn display_matches_serde() {
        for phase in Phase::ALL {
            let json = serde_json::to_string(&phase).expect("serialize phase");
            assert_eq!(format!("\"{phase}\""), json, "display and serde differ for {phase:?}");
        }
    }

    #[test]
    fn parses_every_wire_name() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
        assert!("awaiting_consent_credit".parse::<Phase>().is_err());
    }

    #[test]
    fn ranks_increase_along_the_progression() {
        let ranks = Phase::ALL.iter().map(Phase::rank).collect::<Vec<_>>();
        assert!(ranks.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(Phase::RateReady.rank(), Phase::Negotiating.rank());
    }

    #[test]
    fn only_final_is_terminal() {
        assert!(Phase::Final.is_terminal());
        assert!(Phase::ALL.iter().filter(|phase| phase.is_terminal()).count() == 1);
    }
}

use ratedesk_core::{DialogueEvent, Phase};

/// A keyword rule: fires when the conversation is in one of `phases` and the lower-cased
/// message contains any of `keywords` as a substring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntentRule {
    pub phases: &'static [Phase],
    pub keywords: &'static [&'static str],
    pub event: DialogueEvent,
}

impl IntentRule {
    pub fn matches(&self, phase: Phase, lowered: &str) -> bool {
        self.phases.contains(&phase)
            && self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Evaluated top to bottom; the first match wins.
pub const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        phases: &[Phase::AwaitingConsentBg],
        keywords: &["consent", "yes", "agree", "ok", "sure", "accept"],
        event: DialogueEvent::BackgroundConsentGiven,
    },
    IntentRule {
        phases: &[Phase::BgDone],
        keywords: &["credit", "yes", "agree", "ok", "sure", "accept"],
        event: DialogueEvent::CreditConsentGiven,
    },
    IntentRule {
        phases: &[Phase::RateReady],
        keywords: &["rate"],
        event: DialogueEvent::RateRequested,
    },
    IntentRule {
        phases: &[Phase::RateReady, Phase::Negotiating],
        keywords: &["negotiate"],
        event: DialogueEvent::NegotiateRequested,
    },
    IntentRule {
        phases: &[Phase::Negotiating, Phase::RateReady],
        keywords: &["accept"],
        event: DialogueEvent::AcceptRequested,
    },
];

/// Intent for a message outside the intake phase. `lowered` must already be lower-cased.
pub fn classify(phase: Phase, lowered: &str) -> DialogueEvent {
    INTENT_RULES
        .iter()
        .find(|rule| rule.matches(phase, lowered))
        .map(|rule| rule.event)
        .unwrap_or(DialogueEvent::Unrecognized)
}

#[cfg(test)]
mod tests {
    use ratedesk_core::flows::{FlowEngine, MortgageFlow};
    use ratedesk_core::{DialogueEvent, Phase};

    use super::{classify, INTENT_RULES};

    #[test]
    fn consent_keywords_are_phase_scoped() {
        assert_eq!(
            classify(Phase::AwaitingConsentBg, "ok go ahead"),
            DialogueEvent::BackgroundConsentGiven
        );
        assert_eq!(classify(Phase::BgDone, "run my credit"), DialogueEvent::CreditConsentGiven);
        assert_eq!(classify(Phase::Negotiating, "yes"), DialogueEvent::Unrecognized);
    }

    #[test]
    fn rate_request_precedes_accept_in_rate_ready() {
        assert_eq!(classify(Phase::RateReady, "i accept this rate"), DialogueEvent::RateRequested);
        assert_eq!(
            classify(Phase::Negotiating, "i accept this rate"),
            DialogueEvent::AcceptRequested
        );
    }

    #[test]
    fn negotiate_precedes_accept() {
        assert_eq!(
            classify(Phase::Negotiating, "negotiate or accept?"),
            DialogueEvent::NegotiateRequested
        );
    }

    #[test]
    fn terminal_phase_recognizes_nothing() {
        assert_eq!(classify(Phase::Final, "accept"), DialogueEvent::Unrecognized);
        assert_eq!(classify(Phase::Final, "negotiate"), DialogueEvent::Unrecognized);
    }

    #[test]
    fn every_rule_maps_to_a_legal_transition() {
        let engine = FlowEngine::<MortgageFlow>::default();
        for rule in INTENT_RULES {
            for phase in rule.phases {
                assert!(
                    engine.apply(*phase, rule.event).is_ok(),
                    "{:?} should be legal in {phase}",
                    rule.event
                );
            }
        }
    }
}

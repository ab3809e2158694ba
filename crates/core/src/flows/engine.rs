use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::flows::states::{DialogueAction, DialogueEvent, Phase, TransitionOutcome};

/// Where a rule leaves the conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Stay,
    Phase(Phase),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: &'static [Phase],
    pub event: DialogueEvent,
    pub target: Target,
    pub actions: &'static [DialogueAction],
    pub chained: Option<DialogueEvent>,
}

impl TransitionRule {
    fn matches(&self, current: Phase, event: DialogueEvent) -> bool {
        self.event == event && self.from.contains(&current)
    }

    fn destination(&self, current: Phase) -> Phase {
        match self.target {
            Target::Stay => current,
            Target::Phase(phase) => phase,
        }
    }
}

/// Every legal (phase, event) pair of the mortgage conversation.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        from: &[Phase::Intake],
        event: DialogueEvent::IntakeIncomplete,
        target: Target::Stay,
        actions: &[DialogueAction::MergeIntake, DialogueAction::PromptForMissingFields],
        chained: None,
    },
    TransitionRule {
        from: &[Phase::Intake],
        event: DialogueEvent::IntakeCompleted,
        target: Target::Phase(Phase::AwaitingConsentBg),
        actions: &[DialogueAction::MergeIntake, DialogueAction::PromptForBackgroundConsent],
        chained: None,
    },
    TransitionRule {
        from: &[Phase::AwaitingConsentBg],
        event: DialogueEvent::BackgroundConsentGiven,
        target: Target::Phase(Phase::BgDone),
        actions: &[DialogueAction::RecordBackgroundCheck],
        chained: None,
    },
    TransitionRule {
        from: &[Phase::BgDone],
        event: DialogueEvent::CreditConsentGiven,
        target: Target::Phase(Phase::CreditDone),
        actions: &[DialogueAction::RecordCreditCheck, DialogueAction::ComputeInitialRate],
        chained: Some(DialogueEvent::RateComputed),
    },
    TransitionRule {
        from: &[Phase::CreditDone],
        event: DialogueEvent::RateComputed,
        target: Target::Phase(Phase::RateReady),
        actions: &[],
        chained: None,
    },
    TransitionRule {
        from: &[Phase::RateReady],
        event: DialogueEvent::RateRequested,
        target: Target::Stay,
        actions: &[DialogueAction::ReportRate],
        chained: None,
    },
    TransitionRule {
        from: &[Phase::RateReady, Phase::Negotiating],
        event: DialogueEvent::NegotiateRequested,
        target: Target::Phase(Phase::Negotiating),
        actions: &[DialogueAction::CounterOffer],
        chained: None,
    },
    TransitionRule {
        from: &[Phase::RateReady, Phase::Negotiating],
        event: DialogueEvent::AcceptRequested,
        target: Target::Phase(Phase::Notary),
        actions: &[DialogueAction::AcceptRate],
        chained: Some(DialogueEvent::NotaryCompleted),
    },
    TransitionRule {
        from: &[Phase::Notary],
        event: DialogueEvent::NotaryCompleted,
        target: Target::Phase(Phase::Final),
        actions: &[DialogueAction::CompleteNotary],
        chained: None,
    },
    TransitionRule {
        from: &Phase::ALL,
        event: DialogueEvent::Unrecognized,
        target: Target::Stay,
        actions: &[DialogueAction::DefaultPrompt],
        chained: None,
    },
];

pub trait FlowDefinition {
    fn transition(
        &self,
        current: Phase,
        event: DialogueEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct MortgageFlow;

impl FlowDefinition for MortgageFlow {
    fn transition(
        &self,
        current: Phase,
        event: DialogueEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let rule = TRANSITIONS
            .iter()
            .find(|rule| rule.matches(current, event))
            .ok_or(FlowTransitionError::InvalidTransition { phase: current, event })?;

        Ok(TransitionOutcome {
            from: current,
            to: rule.destination(current),
            event,
            actions: rule.actions.to_vec(),
            chained: rule.chained,
        })
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn apply(
        &self,
        current: Phase,
        event: DialogueEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    /// Applies `event` and then every chained follow-up, returning each step in order.
    pub fn run(
        &self,
        current: Phase,
        event: DialogueEvent,
    ) -> Result<Vec<TransitionOutcome>, FlowTransitionError> {
        let mut steps = Vec::new();
        let mut next = Some((current, event));
        while let Some((phase, event)) = next {
            let outcome = self.apply(phase, event)?;
            next = outcome.chained.map(|chained| (outcome.to, chained));
            steps.push(outcome);
        }
        Ok(steps)
    }

    pub fn run_with_audit<S>(
        &self,
        current: Phase,
        event: DialogueEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<Vec<TransitionOutcome>, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.run(current, event);
        match &result {
            Ok(steps) => {
                for outcome in steps {
                    sink.emit(
                        AuditEvent::new(
                            audit.session_id.clone(),
                            audit.correlation_id.clone(),
                            "flow.transition_applied",
                            AuditCategory::Flow,
                            audit.actor.clone(),
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", outcome.from.to_string())
                        .with_metadata("to", outcome.to.to_string())
                        .with_metadata("event", format!("{:?}", outcome.event)),
                    );
                }
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "flow.transition_rejected",
                        AuditCategory::Flow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<MortgageFlow> {
    fn default() -> Self {
        Self::new(MortgageFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {phase} using event {event:?}")]
    InvalidTransition { phase: Phase, event: DialogueEvent },
}

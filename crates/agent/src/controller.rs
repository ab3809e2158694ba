//! Turn decisions for the mortgage conversation.
//!
//! [`DialogueController::decide`] is pure: it reads a session snapshot plus the inbound text
//! and returns the patch to persist and the agent replies to append, in order. The phase
//! change itself comes from the transition table in `ratedesk_core::flows`.

use ratedesk_core::flows::{FlowEngine, MortgageFlow};
use ratedesk_core::rate::{RateTraceStep, DISPLAY_FALLBACK_APR};
use ratedesk_core::{
    AuditContext, AuditSink, DeterministicRateEngine, DialogueAction, DialogueEvent, DomainError,
    Intake, IntakeUpdate, Phase, RateEngine, Session, SessionPatch, TransitionOutcome,
    MOCK_CREDIT_SCORE,
};

use crate::{extractor, intents, prompts};

/// Everything one inbound message produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub event: DialogueEvent,
    pub patch: SessionPatch,
    /// Agent messages in append order; never empty.
    pub replies: Vec<String>,
    pub steps: Vec<TransitionOutcome>,
    pub extracted: IntakeUpdate,
    /// Pricing breakdown when this turn produced the opening offer.
    pub rate_trace: Vec<RateTraceStep>,
}

impl Turn {
    pub fn final_phase(&self) -> Option<Phase> {
        self.steps.last().map(|step| step.to)
    }
}

pub struct DialogueController<R = DeterministicRateEngine> {
    flow: FlowEngine<MortgageFlow>,
    rates: R,
}

impl Default for DialogueController {
    fn default() -> Self {
        Self::new(DeterministicRateEngine::default())
    }
}

impl<R> DialogueController<R>
where
    R: RateEngine,
{
    pub fn new(rates: R) -> Self {
        Self { flow: FlowEngine::default(), rates }
    }

    pub fn decide(&self, session: &Session, message: &str) -> Result<Turn, DomainError> {
        let (event, extracted) = interpret(session, message);
        let steps = self.flow.run(session.phase, event)?;
        Ok(self.perform(session, event, extracted, steps))
    }

    /// Same as [`Self::decide`], reporting every applied or rejected transition to `sink`.
    pub fn decide_with_audit<S>(
        &self,
        session: &Session,
        message: &str,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<Turn, DomainError>
    where
        S: AuditSink + ?Sized,
    {
        let (event, extracted) = interpret(session, message);
        let steps = self.flow.run_with_audit(session.phase, event, sink, audit)?;
        Ok(self.perform(session, event, extracted, steps))
    }

    fn perform(
        &self,
        session: &Session,
        event: DialogueEvent,
        extracted: IntakeUpdate,
        steps: Vec<TransitionOutcome>,
    ) -> Turn {
        let merged: Intake = session.intake.merge(&extracted);
        let mut checks = session.checks.clone();
        let mut rate = session.rate.clone();
        let mut patch = SessionPatch::default();
        let mut replies = Vec::new();
        let mut rate_trace = Vec::new();

        for step in &steps {
            for action in &step.actions {
                match action {
                    DialogueAction::MergeIntake => {
                        if !extracted.is_empty() {
                            patch.intake = Some(merged.clone());
                        }
                    }
                    DialogueAction::PromptForMissingFields => {
                        replies.push(prompts::missing_fields(&merged.missing_fields()));
                    }
                    DialogueAction::PromptForBackgroundConsent => {
                        replies.push(prompts::INTAKE_COMPLETE.to_string());
                    }
                    DialogueAction::RecordBackgroundCheck => {
                        checks.background_passed.get_or_insert(true);
                        patch.checks = Some(checks.clone());
                        replies.push(prompts::CONSENT_BG_NEXT.to_string());
                    }
                    DialogueAction::RecordCreditCheck => {
                        checks.credit_score.get_or_insert(MOCK_CREDIT_SCORE);
                        patch.checks = Some(checks.clone());
                    }
                    DialogueAction::ComputeInitialRate => {
                        let quote = self.rates.initial_rate(&session.intake);
                        rate = quote.rate;
                        rate_trace = quote.trace;
                        patch.rate = Some(rate.clone());
                        replies.push(prompts::CONSENT_CREDIT_READY.to_string());
                    }
                    DialogueAction::ReportRate => {
                        let baseline =
                            rate.baseline_apr.unwrap_or(self.rates.terms().baseline_apr);
                        let offered = rate.offered_apr.unwrap_or(DISPLAY_FALLBACK_APR);
                        replies.push(prompts::rate_report(baseline, offered));
                    }
                    DialogueAction::CounterOffer => {
                        rate = self.rates.counter_offer(&rate);
                        patch.rate = Some(rate.clone());
                        replies.push(prompts::counter_offer(
                            rate.offered_apr.unwrap_or(DISPLAY_FALLBACK_APR),
                        ));
                    }
                    DialogueAction::AcceptRate => {
                        rate.accepted = true;
                        patch.rate = Some(rate.clone());
                        replies.push(prompts::ACCEPT_FINAL.to_string());
                    }
                    DialogueAction::CompleteNotary => {
                        rate.notary_done = true;
                        patch.rate = Some(rate.clone());
                        replies.push(prompts::NOTARY_DONE.to_string());
                    }
                    DialogueAction::DefaultPrompt => {
                        replies.push(prompts::phase_default(step.from).to_string());
                    }
                }
            }
        }

        if let Some(last) = steps.last() {
            if last.to != session.phase {
                patch.phase = Some(last.to);
            }
        }

        if replies.is_empty() {
            replies.push(prompts::phase_default(session.phase).to_string());
        }

        Turn { event, patch, replies, steps, extracted, rate_trace }
    }
}

/// Maps the inbound text to an event. Intake always runs extraction on the raw text;
/// other phases match keywords against the lower-cased text.
fn interpret(session: &Session, message: &str) -> (DialogueEvent, IntakeUpdate) {
    if session.phase == Phase::Intake {
        let extracted = extractor::extract(message);
        let event = if session.intake.merge(&extracted).is_complete() {
            DialogueEvent::IntakeCompleted
        } else {
            DialogueEvent::IntakeIncomplete
        };
        return (event, extracted);
    }

    (intents::classify(session.phase, &message.to_lowercase()), IntakeUpdate::default())
}

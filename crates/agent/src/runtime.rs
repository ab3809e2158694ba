use std::sync::Arc;

use serde::{Deserialize, Serialize};

use ratedesk_core::audit::{AuditCategory, AuditOutcome};
use ratedesk_core::{
    ApplicationError, AuditContext, AuditEvent, AuditSink, DomainError, NegotiationOutcome,
    NewMessage, RateEngine, Session, SessionId,
};
use ratedesk_db::{SessionLocks, SessionStore};

use crate::controller::{DialogueController, Turn};

const ACTOR: &str = "agent-runtime";

/// Inbound chat request. Both fields are optional on the wire so absence maps to a client error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AgentRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self { session_id: Some(session_id.into()), message: Some(message.into()) }
    }

    fn validate(self) -> Result<(SessionId, String), ApplicationError> {
        let session_id = self.session_id.filter(|id| !id.trim().is_empty());
        let message = self.message.filter(|message| !message.trim().is_empty());
        match (session_id, message) {
            (Some(session_id), Some(message)) => Ok((SessionId(session_id), message)),
            _ => {
                Err(ApplicationError::MalformedRequest("Missing sessionId or message".to_string()))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub reply: String,
    pub state: Session,
}

pub struct AgentRuntime<R = ratedesk_core::DeterministicRateEngine> {
    store: Arc<dyn SessionStore>,
    controller: DialogueController<R>,
    locks: SessionLocks,
    audit: Arc<dyn AuditSink>,
}

impl<R> AgentRuntime<R>
where
    R: RateEngine,
{
    pub fn new(
        store: Arc<dyn SessionStore>,
        controller: DialogueController<R>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, controller, locks: SessionLocks::default(), audit }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Runs one conversational turn. Turns for the same session are serialized; the user
    /// message is recorded before the controller decides.
    pub async fn handle(
        &self,
        request: AgentRequest,
        correlation_id: &str,
    ) -> Result<AgentResponse, ApplicationError> {
        let (session_id, message) = request.validate()?;
        let _guard = self.locks.acquire(&session_id).await;

        match self.run_turn(session_id.clone(), message, correlation_id).await {
            Err(ApplicationError::Persistence(detail)) => {
                self.record_store_failure(&session_id, correlation_id, &detail);
                Err(ApplicationError::Persistence(detail))
            }
            other => other,
        }
    }

    async fn run_turn(
        &self,
        session_id: SessionId,
        message: String,
        correlation_id: &str,
    ) -> Result<AgentResponse, ApplicationError> {
        let session = self.store.get_or_create(&session_id).await?;
        self.store.append_message(&session_id, NewMessage::user(message.as_str())).await?;

        let context = AuditContext::new(Some(session_id.clone()), correlation_id, ACTOR);
        let turn =
            self.controller.decide_with_audit(&session, &message, self.audit.as_ref(), &context)?;
        self.record_side_effects(&context, &turn);

        if !turn.patch.is_empty() {
            self.store.patch(&session_id, turn.patch.clone()).await?;
        }
        for reply in &turn.replies {
            self.store.append_message(&session_id, NewMessage::agent(reply.as_str())).await?;
        }

        let state = self.store.get_or_create(&session_id).await?;
        let reply = turn.replies.first().cloned().ok_or_else(|| {
            DomainError::InvariantViolation("turn produced no agent reply".to_string())
        })?;

        tracing::info!(
            event_name = "agent.turn.completed",
            correlation_id = %correlation_id,
            session_id = %session_id,
            dialogue_event = ?turn.event,
            from = %session.phase,
            to = %state.phase,
            replies = turn.replies.len(),
            "conversation turn completed"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(session_id),
                correlation_id,
                "agent.turn.completed",
                AuditCategory::Ingress,
                ACTOR,
                AuditOutcome::Success,
            )
            .with_metadata("from", session.phase.to_string())
            .with_metadata("to", state.phase.to_string()),
        );

        Ok(AgentResponse { reply, state })
    }

    /// Convenience wrapper for callers that already hold plain strings.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
        correlation_id: &str,
    ) -> Result<AgentResponse, ApplicationError> {
        self.handle(AgentRequest::new(session_id, message), correlation_id).await
    }

    pub async fn session(&self, id: &SessionId) -> Result<Option<Session>, ApplicationError> {
        Ok(self.store.find(id).await?)
    }

    pub async fn outcome(
        &self,
        id: &SessionId,
    ) -> Result<Option<NegotiationOutcome>, ApplicationError> {
        Ok(self.session(id).await?.as_ref().and_then(NegotiationOutcome::from_session))
    }

    pub async fn ping_store(&self) -> Result<(), ApplicationError> {
        Ok(self.store.ping().await?)
    }

    fn record_store_failure(&self, session_id: &SessionId, correlation_id: &str, detail: &str) {
        tracing::warn!(
            event_name = "agent.turn.store_failed",
            correlation_id = %correlation_id,
            session_id = %session_id,
            error = %detail,
            "session store failed during turn"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(session_id.clone()),
                correlation_id,
                "agent.turn.store_failed",
                AuditCategory::Persistence,
                ACTOR,
                AuditOutcome::Failed,
            )
            .with_metadata("error", detail),
        );
    }

    fn record_side_effects(&self, context: &AuditContext, turn: &Turn) {
        if !turn.extracted.is_empty() {
            let fields = [
                ("salary", turn.extracted.salary.is_some()),
                ("assets", turn.extracted.assets.is_some()),
                ("first_time_buyer", turn.extracted.first_time_buyer.is_some()),
                ("cars", turn.extracted.cars.is_some()),
            ]
            .into_iter()
            .filter_map(|(name, present)| present.then_some(name))
            .collect::<Vec<_>>()
            .join(",");

            self.audit.emit(
                AuditEvent::new(
                    context.session_id.clone(),
                    context.correlation_id.clone(),
                    "intake.fields_extracted",
                    AuditCategory::Intake,
                    ACTOR,
                    AuditOutcome::Success,
                )
                .with_metadata("fields", fields),
            );
        }

        if let Some(rate) = turn.patch.rate.as_ref().filter(|_| !turn.rate_trace.is_empty()) {
            let mut event = AuditEvent::new(
                context.session_id.clone(),
                context.correlation_id.clone(),
                "pricing.initial_rate_computed",
                AuditCategory::Pricing,
                ACTOR,
                AuditOutcome::Success,
            );
            for step in &turn.rate_trace {
                event = event.with_metadata(step.stage.clone(), step.amount.to_string());
            }
            if let Some(offered) = rate.offered_apr {
                event = event.with_metadata("offered_apr", offered.to_string());
            }
            self.audit.emit(event);
        }
    }
}

pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod rate;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::intake::{Intake, IntakeField, IntakeUpdate};
pub use domain::session::{
    ChatMessage, Checks, NewMessage, Role, Session, SessionId, SessionPatch, MOCK_CREDIT_SCORE,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{DialogueAction, DialogueEvent, FlowEngine, Phase, TransitionOutcome};
pub use rate::{
    DeterministicRateEngine, NegotiationOutcome, NegotiationTerms, RateContext, RateEngine,
};

pub mod engine;
pub mod states;

pub use engine::{
    FlowDefinition, FlowEngine, FlowTransitionError, MortgageFlow, Target, TransitionRule,
    TRANSITIONS,
};
pub use states::{DialogueAction, DialogueEvent, Phase, TransitionOutcome};

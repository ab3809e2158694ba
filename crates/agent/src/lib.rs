//! Conversation brain for the mortgage rate negotiator.
//!
//! Each inbound message goes through a fixed pipeline:
//! 1. **Runtime** (`runtime`) validates the request, serializes turns per session and owns IO.
//! 2. **Extraction** (`extractor`, `first_time_buyer`) turns intake text into typed fields.
//! 3. **Intent rules** (`intents`) map keywords to dialogue events outside intake.
//! 4. **Controller** (`controller`) runs the transition table and produces the patch and replies.
//!
//! Pricing is never decided here; the controller calls the deterministic rate engine in
//! `ratedesk_core::rate`.

pub mod controller;
pub mod extractor;
pub mod first_time_buyer;
pub mod intents;
pub mod prompts;
pub mod runtime;

pub use controller::{DialogueController, Turn};
pub use runtime::{AgentRequest, AgentResponse, AgentRuntime};

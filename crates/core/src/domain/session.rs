use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::intake::Intake;
use crate::flows::states::Phase;
use crate::rate::RateContext;

/// Credit score reported by the mock soft-pull.
pub const MOCK_CREDIT_SCORE: u16 = 742;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(format!("unknown message role `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// A message before the store stamps identity and time onto it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self { role: Role::Agent, content: content.into() }
    }

    /// Stamps the message, never earlier than `not_before` so history stays ordered.
    pub fn stamp(self, not_before: Option<DateTime<Utc>>) -> ChatMessage {
        let now = Utc::now();
        let timestamp = match not_before {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        ChatMessage { id: Uuid::new_v4(), role: self.role, content: self.content, timestamp }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_score: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub intake: Intake,
    pub checks: Checks,
    pub rate: RateContext,
    pub history: Vec<ChatMessage>,
    pub phase: Phase,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            intake: Intake::default(),
            checks: Checks::default(),
            rate: RateContext::default(),
            history: Vec::new(),
            phase: Phase::Intake,
        }
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.history.last().map(|message| message.timestamp)
    }

    /// Shallow top-level merge: each supplied sub-record replaces the stored one wholesale.
    pub fn apply_patch(&mut self, patch: SessionPatch) {
        if let Some(intake) = patch.intake {
            self.intake = intake;
        }
        if let Some(checks) = patch.checks {
            self.checks = checks;
        }
        if let Some(rate) = patch.rate {
            self.rate = rate;
        }
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub intake: Option<Intake>,
    pub checks: Option<Checks>,
    pub rate: Option<RateContext>,
    pub phase: Option<Phase>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.intake.is_none()
            && self.checks.is_none()
            && self.rate.is_none()
            && self.phase.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::intake::Intake;
    use crate::flows::states::Phase;

    use super::{Checks, NewMessage, Role, Session, SessionId, SessionPatch};

    #[test]
    fn new_session_starts_in_intake_with_empty_records() {
        let session = Session::new(SessionId::from("s-1"));
        assert_eq!(session.phase, Phase::Intake);
        assert_eq!(session.intake, Intake::default());
        assert!(session.history.is_empty());
        assert!(!session.rate.is_initialized());
    }

    #[test]
    fn patch_replaces_only_supplied_sub_records() {
        let mut session = Session::new(SessionId::from("s-1"));
        session.intake.salary = Some(75_000);

        session.apply_patch(SessionPatch {
            checks: Some(Checks { background_passed: Some(true), credit_score: None }),
            phase: Some(Phase::BgDone),
            ..SessionPatch::default()
        });

        assert_eq!(session.intake.salary, Some(75_000));
        assert_eq!(session.checks.background_passed, Some(true));
        assert_eq!(session.phase, Phase::BgDone);
    }

    #[test]
    fn stamp_never_goes_backwards() {
        let future = Utc::now() + Duration::seconds(30);
        let message = NewMessage::user("hello").stamp(Some(future));
        assert_eq!(message.timestamp, future);
        assert_eq!(message.role, Role::User);
    }

    #[test]
    fn stamped_messages_get_unique_ids() {
        let first = NewMessage::agent("a").stamp(None);
        let second = NewMessage::agent("a").stamp(None);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn session_serializes_phase_and_timestamps_for_the_wire() {
        let mut session = Session::new(SessionId::from("s-1"));
        session.history.push(NewMessage::user("hi").stamp(None));

        let json = serde_json::to_value(&session).expect("serialize session");
        assert_eq!(json["phase"], "intake");
        assert_eq!(json["id"], "s-1");
        assert!(json["history"][0]["timestamp"].is_i64());
        assert_eq!(json["history"][0]["role"], "user");
    }
}

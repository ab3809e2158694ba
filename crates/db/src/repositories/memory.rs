use std::collections::HashMap;

use tokio::sync::RwLock;

use ratedesk_core::{ChatMessage, NewMessage, Session, SessionId, SessionPatch};

use super::{RepositoryError, SessionStore};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, id: &SessionId) -> Result<Session, RepositoryError> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(session.clone());
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.clone()).or_insert_with(|| Session::new(id.clone()));
        Ok(session.clone())
    }

    async fn append_message(
        &self,
        id: &SessionId,
        message: NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.clone()).or_insert_with(|| Session::new(id.clone()));
        let stamped = message.stamp(session.last_message_at());
        session.history.push(stamped.clone());
        Ok(stamped)
    }

    async fn patch(
        &self,
        id: &SessionId,
        patch: SessionPatch,
    ) -> Result<Session, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.clone()).or_insert_with(|| Session::new(id.clone()));
        session.apply_patch(patch);
        Ok(session.clone())
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.read().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use ratedesk_core::{Intake, NewMessage, Phase, Role, SessionId, SessionPatch};

    use crate::repositories::{InMemorySessionStore, SessionStore};

    #[tokio::test]
    async fn get_or_create_returns_fresh_intake_session() {
        let store = InMemorySessionStore::default();
        let session = store.get_or_create(&SessionId::from("s-1")).await.expect("create");

        assert_eq!(session.phase, Phase::Intake);
        assert!(session.history.is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn find_does_not_create() {
        let store = InMemorySessionStore::default();
        let found = store.find(&SessionId::from("ghost")).await.expect("find");

        assert!(found.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn append_message_keeps_order_and_monotonic_timestamps() {
        let store = InMemorySessionStore::default();
        let id = SessionId::from("s-1");

        store.append_message(&id, NewMessage::user("hi")).await.expect("append user");
        store.append_message(&id, NewMessage::agent("hello")).await.expect("append agent");
        store.append_message(&id, NewMessage::agent("again")).await.expect("append agent");

        let session = store.find(&id).await.expect("find").expect("session exists");
        let roles = session.history.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(roles, vec![Role::User, Role::Agent, Role::Agent]);
        assert!(session.history.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[tokio::test]
    async fn patch_merges_top_level_and_preserves_history() {
        let store = InMemorySessionStore::default();
        let id = SessionId::from("s-1");
        store.append_message(&id, NewMessage::user("hi")).await.expect("append");

        let merged = store
            .patch(
                &id,
                SessionPatch {
                    intake: Some(Intake { salary: Some(90_000), ..Intake::default() }),
                    phase: Some(Phase::Intake),
                    ..SessionPatch::default()
                },
            )
            .await
            .expect("patch");

        assert_eq!(merged.intake.salary, Some(90_000));
        assert_eq!(merged.history.len(), 1);
    }
}

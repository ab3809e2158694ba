use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ratedesk_core::SessionId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-session async locks. Requests for one id are serialized; different ids never contend.
#[derive(Clone, Default)]
pub struct SessionLocks {
    slots: Arc<Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>>,
}

pub type SessionGuard = OwnedMutexGuard<()>;

impl SessionLocks {
    pub async fn acquire(&self, id: &SessionId) -> SessionGuard {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(slots) => slots,
                Err(poisoned) => poisoned.into_inner(),
            };
            slots.entry(id.clone()).or_default().clone()
        };
        slot.lock_owned().await
    }

    pub fn tracked(&self) -> usize {
        match self.slots.lock() {
            Ok(slots) => slots.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ratedesk_core::SessionId;

    use super::SessionLocks;

    #[tokio::test]
    async fn same_id_waits_for_release() {
        let locks = SessionLocks::default();
        let id = SessionId::from("s-1");
        let guard = locks.acquire(&id).await;

        let contender = {
            let locks = locks.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .expect("contender task");
    }

    #[tokio::test]
    async fn distinct_ids_do_not_contend() {
        let locks = SessionLocks::default();
        let _first = locks.acquire(&SessionId::from("a")).await;

        tokio::time::timeout(Duration::from_secs(1), locks.acquire(&SessionId::from("b")))
            .await
            .expect("different session should not block");
        assert_eq!(locks.tracked(), 2);
    }
}

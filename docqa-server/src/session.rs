use std::{collections::HashMap, sync::Arc};

use docqa_rag::Session;
use tokio::sync::RwLock;
use uuid::Uuid;

/// All live conversations, keyed by session id.
#[derive(Default, Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionRegistry {
    pub async fn create(&self) -> Arc<Session> {
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(session_id.clone()));
        self.sessions.write().await.insert(session_id, Arc::clone(&session));
        session
    }

    pub async fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        if let Some(session) = self.get(session_id).await {
            return session;
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Session::new(session_id))),
        )
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn created_sessions_are_retrievable_and_distinct() {
        let registry = SessionRegistry::default();
        let a = registry.create().await;
        let b = registry.create().await;
        assert_ne!(a.id(), b.id());
        assert!(Arc::ptr_eq(&registry.get(a.id()).await.unwrap(), &a));
        assert_eq!(registry.count().await, 2);
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_session() {
        let registry = SessionRegistry::default();
        let first = registry.get_or_create("default").await;
        let second = registry.get_or_create("default").await;
        assert!(Arc::ptr_eq(&first, &second));

        assert!(registry.remove("default").await.is_some());
        assert!(registry.get("default").await.is_none());
    }
}

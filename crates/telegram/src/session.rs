use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::conversation::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub chat_id: i64,
    pub state: SessionState,
}

impl Session {
    #[must_use]
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            state: SessionState::Idle,
        }
    }
}

/// Sessions keyed by chat id. Entries are created on first contact and live
/// for the rest of the process.
///
/// Each session sits behind its own async lock: holding it serializes the
/// messages of one chat while other chats proceed independently.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<i64, Arc<AsyncMutex<Session>>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, chat_id: i64) -> Arc<AsyncMutex<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            sessions
                .entry(chat_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(chat_id)))),
        )
    }

    /// Lock the session for `chat_id`, creating it if needed.
    pub async fn lock(&self, chat_id: i64) -> OwnedMutexGuard<Session> {
        self.entry(chat_id).lock_owned().await
    }

    /// Current state, waiting for any in-flight message of that chat.
    pub async fn state(&self, chat_id: i64) -> SessionState {
        self.lock(chat_id).await.state
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

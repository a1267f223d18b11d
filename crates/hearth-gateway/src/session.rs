use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::dialogue::DialogueState;
use crate::gate::PendingAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Cli,
    Telegram,
    Web,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Telegram => "telegram",
            Self::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub channel: Channel,
    pub actor_id: String,
}

impl SessionKey {
    pub fn new(channel: Channel, actor_id: impl Into<String>) -> Self {
        Self {
            channel,
            actor_id: actor_id.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel.as_str(), self.actor_id)
    }
}

/// One conversation: at most one open dialogue and one pending confirmation.
#[derive(Debug)]
pub struct Session {
    pub key: SessionKey,
    pub dialogue: Option<DialogueState>,
    pub pending: Option<PendingAction>,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            dialogue: None,
            pending: None,
        }
    }

    /// Drops both the dialogue and any pending action; true if anything was open.
    pub fn cancel(&mut self) -> bool {
        let had_dialogue = self.dialogue.take().is_some();
        let had_pending = self.pending.take().is_some();
        had_dialogue || had_pending
    }
}

/// Arena of live sessions. Each entry is locked for a whole turn so two turns
/// of the same conversation never interleave.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<SessionKey, Arc<AsyncMutex<Session>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, key: &SessionKey) -> Arc<AsyncMutex<Session>> {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(key.clone()))))
            .clone()
    }

    pub fn remove(&self, key: &SessionKey) -> bool {
        match self.sessions.lock() {
            Ok(mut guard) => guard.remove(key).is_some(),
            Err(poisoned) => poisoned.into_inner().remove(key).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        match self.sessions.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

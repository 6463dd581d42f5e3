use std::collections::HashMap;

/// Pending multi-turn prompt for one user. Idle users have no entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingAddUrl,
    AwaitingDeleteUrl,
}

/// Per-user conversation state, keyed by Telegram user id.
#[derive(Debug, Default)]
pub struct ConversationStore {
    states: HashMap<i64, ConversationState>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> Option<ConversationState> {
        self.states.get(&user_id).copied()
    }

    pub fn set(&mut self, user_id: i64, state: ConversationState) {
        self.states.insert(user_id, state);
    }

    /// Return the user to idle, yielding the state they were in.
    pub fn clear(&mut self, user_id: i64) -> Option<ConversationState> {
        self.states.remove(&user_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_is_absence() {
        let mut store = ConversationStore::new();
        assert_eq!(store.get(1), None);

        store.set(1, ConversationState::AwaitingAddUrl);
        assert_eq!(store.get(1), Some(ConversationState::AwaitingAddUrl));
        assert_eq!(store.get(2), None);

        assert_eq!(store.clear(1), Some(ConversationState::AwaitingAddUrl));
        assert_eq!(store.clear(1), None);
        assert!(store.is_empty());
    }

    #[test]
    fn set_replaces_pending_state() {
        let mut store = ConversationStore::new();
        store.set(7, ConversationState::AwaitingAddUrl);
        store.set(7, ConversationState::AwaitingDeleteUrl);
        assert_eq!(store.get(7), Some(ConversationState::AwaitingDeleteUrl));
        assert_eq!(store.len(), 1);
    }
}

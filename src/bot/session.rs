//! Per-conversation state of the command state machine.

use crate::engine::Binding;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Identifies a conversation; for Telegram this is the chat id.
pub type ConversationId = i64;

/// What the user wants to do once an artist is chosen.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ArtistIntent {
    AddExpense,
    ViewExpenses,
}

/// Where a conversation is. States that need a ledger carry it, so a state waiting for expense
/// details without a bound table cannot exist.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingArtist(ArtistIntent),
    AwaitingExpenseDetails(Binding),
    AwaitingEventDetails,
    AwaitingDateRange(Binding),
}

impl ConversationState {
    /// A short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ConversationState::Idle => "idle",
            ConversationState::AwaitingArtist(_) => "awaiting artist",
            ConversationState::AwaitingExpenseDetails(_) => "awaiting expense details",
            ConversationState::AwaitingEventDetails => "awaiting event details",
            ConversationState::AwaitingDateRange(_) => "awaiting date range",
        }
    }
}

/// The states of all conversations. Idle conversations are not stored.
#[derive(Debug, Default)]
pub struct Sessions {
    states: Mutex<HashMap<ConversationId, ConversationState>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the state of `id`, `Idle` if there is none.
    pub async fn take(&self, id: ConversationId) -> ConversationState {
        self.states.lock().await.remove(&id).unwrap_or_default()
    }

    pub async fn put(&self, id: ConversationId, state: ConversationState) {
        let mut states = self.states.lock().await;
        match state {
            ConversationState::Idle => {
                states.remove(&id);
            }
            state => {
                states.insert(id, state);
            }
        }
    }

    /// A copy of the state of `id`.
    pub async fn get(&self, id: ConversationId) -> ConversationState {
        self.states
            .lock()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_take_and_put() {
        let sessions = Sessions::new();
        assert_eq!(sessions.take(1).await, ConversationState::Idle);

        sessions
            .put(1, ConversationState::AwaitingArtist(ArtistIntent::AddExpense))
            .await;
        sessions.put(2, ConversationState::AwaitingEventDetails).await;
        assert_eq!(
            sessions.get(1).await,
            ConversationState::AwaitingArtist(ArtistIntent::AddExpense)
        );

        assert_eq!(
            sessions.take(1).await,
            ConversationState::AwaitingArtist(ArtistIntent::AddExpense)
        );
        assert_eq!(sessions.get(1).await, ConversationState::Idle);
        assert_eq!(sessions.get(2).await, ConversationState::AwaitingEventDetails);

        sessions.put(2, ConversationState::Idle).await;
        assert!(sessions.states.lock().await.is_empty());
    }
}

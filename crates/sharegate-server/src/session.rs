//! Per-conversation state held while a channel owner picks a chat.
//!
//! An entry is created by the `/start` deep link, consumed once a
//! provisional binding has been created, and evicted if left idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use sharegate_shared::deep_link::StartParams;
use sharegate_shared::{Address, ChainId, ChatId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSelection {
    pub share_address: Option<Address>,
    pub chain_id: Option<ChainId>,
}

impl PendingSelection {
    /// Both halves of the share identity, once known.
    pub fn target(&self) -> Option<(Address, ChainId)> {
        Some((self.share_address?, self.chain_id?))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    selection: PendingSelection,
    touched_at: Instant,
}

#[derive(Clone, Default)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<ChatId, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge deep-link parameters into the conversation's selection.
    /// Parameters absent from the link keep their previous value.
    pub async fn update(&self, conversation: ChatId, params: &StartParams) -> PendingSelection {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(conversation).or_insert_with(|| Entry {
            selection: PendingSelection::default(),
            touched_at: Instant::now(),
        });
        if params.share_address.is_some() {
            entry.selection.share_address = params.share_address;
        }
        if params.chain_id.is_some() {
            entry.selection.chain_id = params.chain_id;
        }
        entry.touched_at = Instant::now();
        entry.selection.clone()
    }

    pub async fn get(&self, conversation: ChatId) -> Option<PendingSelection> {
        let entries = self.entries.read().await;
        entries.get(&conversation).map(|e| e.selection.clone())
    }

    /// Remove and return the selection.
    pub async fn take(&self, conversation: ChatId) -> Option<PendingSelection> {
        let mut entries = self.entries.write().await;
        entries.remove(&conversation).map(|e| e.selection)
    }

    /// Evict selections untouched for longer than `max_idle`.
    pub async fn purge_stale(&self, max_idle: Duration) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.touched_at.elapsed() < max_idle);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged idle chat selections");
        }
    }
}

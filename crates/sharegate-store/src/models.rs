//! Domain model structs persisted in the SQLite database.
//!
//! Field names on the wire follow the frontend's document shape
//! (`_id`, `chatInfo`, `dibsShareAddress`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sharegate_shared::{Address, ChainId, ChatDescriptor, ChatId, PlatformUserId};

// ---------------------------------------------------------------------------
// ShareChatBinding
// ---------------------------------------------------------------------------

/// Association of a chat with a share contract.
///
/// Provisional until `signature` is set; only signed bindings are ever used
/// to route access requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShareChatBinding {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "chatInfo")]
    pub chat: ChatDescriptor,
    #[serde(rename = "dibsShareAddress")]
    pub share_address: Address,
    #[serde(rename = "chainId")]
    pub chain_id: ChainId,
    pub signature: Option<String>,
    /// Timestamp the author signed over. Orders re-bindings.
    pub timestamp: Option<u64>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ShareChatBinding {
    pub fn provisional(chat: ChatDescriptor, share_address: Address, chain_id: ChainId) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat,
            share_address,
            chain_id,
            signature: None,
            timestamp: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Result of the one-time provisional → signed transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Signed,
    AlreadySigned,
    NotFound,
}

// ---------------------------------------------------------------------------
// MembershipInvite
// ---------------------------------------------------------------------------

/// A single-use admission link issued to a verified holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MembershipInvite {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Account that signed the access request.
    pub account: Address,
    #[serde(rename = "inviteLink")]
    pub invite_link: String,
    /// Chat the link was minted for, fixed at issuance.
    #[serde(rename = "chatId")]
    pub chat_id: ChatId,
    #[serde(rename = "dibsShareAddress")]
    pub share_address: Address,
    #[serde(rename = "chainId")]
    pub chain_id: ChainId,
    pub signature: String,
    pub timestamp: u64,
    #[serde(rename = "joinedUserId")]
    pub joined_user_id: Option<PlatformUserId>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "resolvedAt")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl MembershipInvite {
    pub fn is_claimed(&self) -> bool {
        self.joined_user_id.is_some()
    }
}

//! Messaging-platform operations the admission core depends on.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use sharegate_shared::{ChatDescriptor, ChatId, PlatformUserId};

#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("platform unreachable: {0}")]
    Http(String),

    #[error("platform rejected {method}: {description}")]
    Api {
        method: &'static str,
        description: String,
    },

    #[error("unexpected platform response: {0}")]
    Decode(String),
}

/// The bot's standing in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MemberStatus {
    pub fn is_present(&self) -> bool {
        !matches!(self, MemberStatus::Left | MemberStatus::Kicked)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator)
    }
}

/// Who this service is on the platform. Fetched once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: PlatformUserId,
    pub username: String,
}

#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Mint a fresh invite link that files a join request instead of
    /// admitting directly. Returns the link, which doubles as its token.
    async fn create_single_use_invite_link(&self, chat_id: ChatId) -> Result<String, PlatformError>;

    async fn approve_join_request(
        &self,
        chat_id: ChatId,
        user_id: PlatformUserId,
    ) -> Result<(), PlatformError>;

    async fn decline_join_request(
        &self,
        chat_id: ChatId,
        user_id: PlatformUserId,
    ) -> Result<(), PlatformError>;

    async fn revoke_invite_link(&self, chat_id: ChatId, invite_link: &str)
        -> Result<(), PlatformError>;

    async fn get_chat_member(
        &self,
        chat_id: ChatId,
        user_id: PlatformUserId,
    ) -> Result<MemberStatus, PlatformError>;

    async fn get_chat(&self, chat_id: ChatId) -> Result<ChatDescriptor, PlatformError>;
}

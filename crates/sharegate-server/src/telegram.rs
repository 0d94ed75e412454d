//! Telegram Bot API client.
//!
//! Every method is a `POST {api}/bot{token}/{method}` with a JSON body,
//! answered by `{ "ok": bool, "result": ..., "description": ... }`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use sharegate_shared::constants::{SELECT_CHANNEL_REQUEST_ID, SELECT_GROUP_REQUEST_ID};
use sharegate_shared::{ChatDescriptor, ChatId, ChatKind, PlatformUserId};

use crate::bot::{InboundEvent, InboundMessage, MessageKind, Reply};
use crate::platform::{BotIdentity, MemberStatus, MessagingPlatform, PlatformError};
use crate::reconciler::JoinRequestEvent;

/// Slack on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    message: Option<Message>,
    chat_join_request: Option<ChatJoinRequest>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
    chat_shared: Option<ChatShared>,
}

#[derive(Debug, Deserialize)]
struct ChatShared {
    chat_id: ChatId,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: ChatId,
    title: Option<String>,
    #[serde(rename = "type")]
    kind: ChatKind,
}

#[derive(Debug, Deserialize)]
struct User {
    id: PlatformUserId,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatInviteLink {
    invite_link: String,
    creator: Option<User>,
}

#[derive(Debug, Deserialize)]
struct ChatJoinRequest {
    chat: Chat,
    from: User,
    invite_link: Option<ChatInviteLink>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: MemberStatus,
}

impl Update {
    /// Decode into the event the bot acts on. Update kinds the bot does not
    /// handle yield `None`.
    pub fn into_event(self) -> Option<InboundEvent> {
        if let Some(request) = self.chat_join_request {
            let (invite_link, link_creator_id) = match request.invite_link {
                Some(link) => (Some(link.invite_link), link.creator.map(|u| u.id)),
                None => (None, None),
            };
            return Some(InboundEvent::JoinRequest(JoinRequestEvent {
                chat_id: request.chat.id,
                user_id: request.from.id,
                invite_link,
                link_creator_id,
            }));
        }

        let message = self.message?;
        let kind = match (message.chat_shared, message.text) {
            (Some(shared), _) => MessageKind::Shared(shared.chat_id),
            (None, Some(text)) if text.starts_with('/') => MessageKind::Command(text),
            _ => MessageKind::Other,
        };
        Some(InboundEvent::Message(InboundMessage {
            conversation: message.chat.id,
            kind,
        }))
    }
}

fn chat_picker() -> Value {
    json!({
        "keyboard": [[
            {
                "text": "Select Group",
                "request_chat": { "request_id": SELECT_GROUP_REQUEST_ID, "chat_is_channel": false }
            },
            {
                "text": "Select Channel",
                "request_chat": { "request_id": SELECT_CHANNEL_REQUEST_ID, "chat_is_channel": true }
            }
        ]],
        "one_time_keyboard": true,
        "resize_keyboard": true,
    })
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: Value,
    ) -> Result<T, PlatformError> {
        self.call_with_timeout(method, body, None).await
    }

    async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: &'static str,
        body: Value,
        timeout: Option<Duration>,
    ) -> Result<T, PlatformError> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(&body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        // Errors carry the URL, which embeds the token.
        let resp = request
            .send()
            .await
            .map_err(|e| PlatformError::Http(e.without_url().to_string()))?;
        let api: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("{method}: {}", e.without_url())))?;

        if !api.ok {
            return Err(PlatformError::Api {
                method,
                description: api.description.unwrap_or_default(),
            });
        }
        api.result
            .ok_or_else(|| PlatformError::Decode(format!("{method}: missing result")))
    }

    pub async fn get_me(&self) -> Result<BotIdentity, PlatformError> {
        let user: User = self.call("getMe", json!({})).await?;
        let username = user
            .username
            .ok_or_else(|| PlatformError::Decode("getMe: bot has no username".into()))?;
        Ok(BotIdentity {
            id: user.id,
            username,
        })
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, PlatformError> {
        self.call_with_timeout(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout.as_secs(),
                "allowed_updates": ["message", "chat_join_request"],
            }),
            Some(timeout + POLL_GRACE),
        )
        .await
    }

    pub async fn send_reply(&self, chat_id: ChatId, reply: &Reply) -> Result<(), PlatformError> {
        let mut body = json!({ "chat_id": chat_id, "text": reply.text });
        if reply.markdown {
            body["parse_mode"] = json!("MarkdownV2");
        }
        if reply.chat_picker {
            body["reply_markup"] = chat_picker();
        }
        let _: Value = self.call("sendMessage", body).await?;
        debug!(chat_id, "Reply sent");
        Ok(())
    }
}

#[async_trait]
impl MessagingPlatform for TelegramClient {
    async fn create_single_use_invite_link(&self, chat_id: ChatId) -> Result<String, PlatformError> {
        let link: ChatInviteLink = self
            .call(
                "createChatInviteLink",
                json!({ "chat_id": chat_id, "creates_join_request": true }),
            )
            .await?;
        Ok(link.invite_link)
    }

    async fn approve_join_request(
        &self,
        chat_id: ChatId,
        user_id: PlatformUserId,
    ) -> Result<(), PlatformError> {
        let _: bool = self
            .call(
                "approveChatJoinRequest",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;
        Ok(())
    }

    async fn decline_join_request(
        &self,
        chat_id: ChatId,
        user_id: PlatformUserId,
    ) -> Result<(), PlatformError> {
        let _: bool = self
            .call(
                "declineChatJoinRequest",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;
        Ok(())
    }

    async fn revoke_invite_link(
        &self,
        chat_id: ChatId,
        invite_link: &str,
    ) -> Result<(), PlatformError> {
        let _: ChatInviteLink = self
            .call(
                "revokeChatInviteLink",
                json!({ "chat_id": chat_id, "invite_link": invite_link }),
            )
            .await?;
        Ok(())
    }

    async fn get_chat_member(
        &self,
        chat_id: ChatId,
        user_id: PlatformUserId,
    ) -> Result<MemberStatus, PlatformError> {
        let member: ChatMember = self
            .call(
                "getChatMember",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;
        Ok(member.status)
    }

    async fn get_chat(&self, chat_id: ChatId) -> Result<ChatDescriptor, PlatformError> {
        let chat: Chat = self.call("getChat", json!({ "chat_id": chat_id })).await?;
        Ok(ChatDescriptor {
            id: chat.id,
            title: chat.title.unwrap_or_default(),
            kind: chat.kind,
        })
    }
}

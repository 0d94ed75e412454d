//! Chat selection over the bot conversation, and the update loop that
//! feeds platform events to the bot and the join reconciler.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use sharegate_shared::constants::SETCHAT_PATH;
use sharegate_shared::deep_link::StartParams;
use sharegate_shared::ChatId;

use crate::error::ServerError;
use crate::platform::{BotIdentity, MessagingPlatform};
use crate::reconciler::{JoinReconciler, JoinRequestEvent};
use crate::registry::BindingRegistry;
use crate::session::SessionStore;
use crate::telegram::TelegramClient;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

const FAILURE_REPLY: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// The owner picked a chat with the chat picker.
    Shared(ChatId),
    Command(String),
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub conversation: ChatId,
    pub kind: MessageKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    JoinRequest(JoinRequestEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markdown: bool,
    /// Attach the "Select Group" / "Select Channel" keyboard.
    pub chat_picker: bool,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
            chat_picker: false,
        }
    }

    fn with_picker(text: impl Into<String>) -> Self {
        Self {
            chat_picker: true,
            ..Self::plain(text)
        }
    }
}

/// Escape text for interpolation into a MarkdownV2 message.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Reply(Reply),
}

#[derive(Clone)]
pub struct ChatSelectionBot {
    registry: BindingRegistry,
    sessions: SessionStore,
    platform: Arc<dyn MessagingPlatform>,
    identity: BotIdentity,
    frontend_url: String,
}

impl ChatSelectionBot {
    pub fn new(
        registry: BindingRegistry,
        sessions: SessionStore,
        platform: Arc<dyn MessagingPlatform>,
        identity: BotIdentity,
        frontend_url: &str,
    ) -> Self {
        Self {
            registry,
            sessions,
            platform,
            identity,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Handle a message, turning a failure into a short reply for the owner.
    pub async fn handle(&self, message: &InboundMessage) -> Action {
        match self.on_message(message).await {
            Ok(action) => action,
            Err(e) => {
                error!(conversation = message.conversation, error = %e, "Message handling failed");
                Action::Reply(Reply::plain(FAILURE_REPLY))
            }
        }
    }

    pub async fn on_message(&self, message: &InboundMessage) -> Result<Action, ServerError> {
        match &message.kind {
            MessageKind::Command(text) => self.on_command(message.conversation, text).await,
            MessageKind::Shared(chat_id) => self.on_shared(message.conversation, *chat_id).await,
            MessageKind::Other => Ok(Action::None),
        }
    }

    async fn on_command(&self, conversation: ChatId, text: &str) -> Result<Action, ServerError> {
        let Some(params) = StartParams::parse(text) else {
            return Ok(Action::None);
        };
        let selection = self.sessions.update(conversation, &params).await;
        debug!(conversation, ?selection, "Start parameters received");

        if selection.share_address.is_none() {
            return Ok(Action::None);
        }
        Ok(Action::Reply(Reply::with_picker(
            "Use the button below to select the group/channel that you want to have your \
             Share holders in. Note that the bot must be an admin in that chat",
        )))
    }

    async fn on_shared(&self, conversation: ChatId, chat_id: ChatId) -> Result<Action, ServerError> {
        let target = self
            .sessions
            .get(conversation)
            .await
            .and_then(|s| s.target());
        let Some((share_address, chain_id)) = target else {
            return Ok(Action::Reply(Reply::plain(
                "Please open the bot from your Share's page first, then select the chat.",
            )));
        };

        let status = match self.platform.get_chat_member(chat_id, self.identity.id).await {
            Ok(status) if status.is_present() => status,
            Ok(_) | Err(_) => {
                let bot = &self.identity.username;
                return Ok(Action::Reply(Reply::with_picker(format!(
                    "The bot is not a member of this group/channel. Please first add the bot \
                     and make it an admin. You can use this link to add the bot to a group: \
                     https://t.me/{bot}?startgroup or use this link to add it to a channel: \
                     https://t.me/{bot}?startchannel\n\nThen use the buttons below to select that chat"
                ))));
            }
        };
        if !status.is_admin() {
            return Ok(Action::Reply(Reply::with_picker(
                "The bot is not an admin of this group/channel. Please first make it an admin.\n\n\
                 Then use the buttons below to select that chat",
            )));
        }

        let chat = self
            .platform
            .get_chat(chat_id)
            .await
            .map_err(|e| ServerError::Internal(format!("getChat failed: {e}")))?;
        let title = chat.title.clone();
        let kind = chat.kind;
        let binding = self
            .registry
            .create_provisional(chat, share_address, chain_id)?;
        self.sessions.take(conversation).await;

        let link = format!("{}{}/{}", self.frontend_url, SETCHAT_PATH, binding.id);
        Ok(Action::Reply(Reply {
            text: format!(
                "Please visit this url to set *{}* {} for your Share:\n\n{}",
                escape_markdown(&title),
                escape_markdown(&kind.to_string()),
                escape_markdown(&link),
            ),
            markdown: true,
            chat_picker: false,
        }))
    }
}

// ---------------------------------------------------------------------------
// Update loop
// ---------------------------------------------------------------------------

/// Long-poll the platform forever, handling each update on its own task.
pub async fn run_update_loop(
    client: TelegramClient,
    bot: ChatSelectionBot,
    reconciler: JoinReconciler,
    poll_timeout: Duration,
) {
    let mut offset = 0;
    let mut backoff = Duration::from_secs(1);
    info!("Listening for bot updates");

    loop {
        let updates = match client.get_updates(offset, poll_timeout).await {
            Ok(updates) => {
                backoff = Duration::from_secs(1);
                updates
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "getUpdates failed");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(event) = update.into_event() else {
                continue;
            };
            let (client, bot, reconciler) = (client.clone(), bot.clone(), reconciler.clone());
            tokio::spawn(async move {
                dispatch(event, &client, &bot, &reconciler).await;
            });
        }
    }
}

async fn dispatch(
    event: InboundEvent,
    client: &TelegramClient,
    bot: &ChatSelectionBot,
    reconciler: &JoinReconciler,
) {
    match event {
        InboundEvent::Message(message) => {
            if let Action::Reply(reply) = bot.handle(&message).await {
                if let Err(e) = client.send_reply(message.conversation, &reply).await {
                    warn!(conversation = message.conversation, error = %e, "Failed to send reply");
                }
            }
        }
        InboundEvent::JoinRequest(request) => match reconciler.on_join_request(&request).await {
            Ok(resolution) => debug!(
                chat_id = request.chat_id,
                user_id = request.user_id,
                ?resolution,
                "Join request resolved"
            ),
            Err(e) => error!(chat_id = request.chat_id, error = %e, "Join request handling failed"),
        },
    }
}

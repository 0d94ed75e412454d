//! # sharegate-server
//!
//! Token-gated admission to Telegram chats.
//!
//! This binary provides:
//! - **Chat binding**: a share's owner picks a chat through the bot and the
//!   share contract's author signs the binding from the web frontend
//! - **Admission**: holders of at least one share token prove wallet control
//!   with a typed-data signature and receive a single-use invite link
//! - **Join reconciliation**: each invite admits exactly one join request;
//!   every link is revoked once used
//! - **REST API** (axum) consumed by the frontend

mod admission;
mod api;
mod bot;
mod config;
mod error;
mod oracle;
mod platform;
mod reconciler;
mod registry;
mod session;
mod store;
mod telegram;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::admission::AdmissionController;
use crate::api::AppState;
use crate::bot::ChatSelectionBot;
use crate::config::ServerConfig;
use crate::oracle::{ChainStateOracle, JsonRpcOracle};
use crate::platform::MessagingPlatform;
use crate::reconciler::JoinReconciler;
use crate::registry::BindingRegistry;
use crate::session::SessionStore;
use crate::store::Store;
use crate::telegram::TelegramClient;

/// Long-poll window for `getUpdates`.
const POLL_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be set.
    let dotenv = dotenvy::dotenv();

    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sharegate_server=debug")),
        )
        .init();

    info!("Starting Sharegate server v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env()?;
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = Store::open(&config.database_path)?;

    let oracle: Arc<dyn ChainStateOracle> = Arc::new(JsonRpcOracle::new(
        config.rpc_endpoints.clone(),
        config.rpc_timeout,
    )?);

    let telegram = TelegramClient::new(
        &config.telegram_api_url,
        &config.bot_api_token,
        config.rpc_timeout,
    )?;
    let identity = telegram.get_me().await?;
    info!(bot_id = identity.id, username = %identity.username, "Connected to Telegram");
    let platform: Arc<dyn MessagingPlatform> = Arc::new(telegram.clone());

    let registry = BindingRegistry::new(store.clone(), oracle.clone());
    let admission = AdmissionController::new(
        store.clone(),
        registry.clone(),
        oracle.clone(),
        platform.clone(),
    );
    let reconciler = JoinReconciler::new(
        store,
        oracle,
        platform.clone(),
        identity.id,
        config.recheck_holding_on_join,
    );
    let sessions = SessionStore::new();
    let bot = ChatSelectionBot::new(
        registry.clone(),
        sessions.clone(),
        platform,
        identity,
        &config.frontend_url,
    );

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Evict abandoned chat selections
    let ttl = config.session_ttl;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            sessions.purge_stale(ttl).await;
        }
    });

    tokio::spawn(bot::run_update_loop(telegram, bot, reconciler, POLL_TIMEOUT));

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState {
        registry,
        admission,
        config: Arc::new(config),
    };

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    //! Owner binds a chat, a holder requests access, and join requests race
    //! for the resulting invite.

    use std::sync::Arc;

    use primitive_types::U256;

    use crate::bot::{Action, InboundMessage, MessageKind};
    use crate::platform::BotIdentity;
    use crate::platform::MemberStatus;
    use crate::reconciler::{DeclineReason, JoinDecision, JoinRequestEvent};
    use crate::testing::{chat, memory_store, share, MockOracle, MockPlatform, PlatformCall, Wallet, BOT_ID};

    use super::*;

    #[tokio::test]
    async fn test_bind_request_and_join() {
        let author = Wallet::random();
        let member = Wallet::random();
        let oracle = Arc::new(MockOracle::default().with_author(1, share(), author.address()));
        let platform = Arc::new(MockPlatform::default());
        let store = memory_store();

        let registry = BindingRegistry::new(store.clone(), oracle.clone());
        let admission =
            AdmissionController::new(store.clone(), registry.clone(), oracle.clone(), platform.clone());
        let reconciler = JoinReconciler::new(store, oracle.clone(), platform.clone(), BOT_ID, true);
        let bot = ChatSelectionBot::new(
            registry.clone(),
            SessionStore::new(),
            platform.clone(),
            BotIdentity { id: BOT_ID, username: "sharegate_bot".into() },
            "https://app.example",
        );

        // The owner picks a chat in the bot conversation.
        platform.add_chat(chat(-100), MemberStatus::Administrator);
        let start = InboundMessage {
            conversation: 42,
            kind: MessageKind::Command(format!("/start s={}-c=1", share())),
        };
        bot.on_message(&start).await.unwrap();
        let picked = InboundMessage { conversation: 42, kind: MessageKind::Shared(-100) };
        let Action::Reply(reply) = bot.on_message(&picked).await.unwrap() else {
            panic!("expected the setchat link");
        };
        let link = reply.text.replace('\\', "");
        let binding_id: uuid::Uuid = link.rsplit('/').next().unwrap().parse().unwrap();

        // The author signs it from the frontend.
        let sig = author.sign_binding(&binding_id.to_string(), 1, share(), 100);
        registry.sign(binding_id, &sig, 100).await.unwrap();
        assert_eq!(registry.resolve_chat(&share(), 1).unwrap(), Some(-100));

        // A holder asks for access.
        oracle.set_holding(1, member.address(), share(), U256::exp10(18), 18);
        platform.queue_link("tok1");
        let access = member.sign_access(1, share(), 7);
        let invite = admission.request_access(share(), 1, &access, 7).await.unwrap();
        assert_eq!(invite.invite_link, "tok1");
        assert_eq!(invite.joined_user_id, None);

        let join = |user_id| JoinRequestEvent {
            chat_id: -100,
            user_id,
            invite_link: Some("tok1".into()),
            link_creator_id: Some(BOT_ID),
        };
        let first = reconciler.on_join_request(&join(501)).await.unwrap();
        let second = reconciler.on_join_request(&join(502)).await.unwrap();
        assert_eq!(first.decision, JoinDecision::Approved);
        assert_eq!(second.decision, JoinDecision::Declined(DeclineReason::AlreadyClaimed));

        let calls = platform.calls();
        assert!(calls.contains(&PlatformCall::Approve(-100, 501)));
        assert!(calls.contains(&PlatformCall::Decline(-100, 502)));
        let revokes = calls
            .iter()
            .filter(|c| **c == PlatformCall::Revoke(-100, "tok1".into()))
            .count();
        assert_eq!(revokes, 2);
    }
}

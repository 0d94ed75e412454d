//! In-process stand-ins for the chain and the messaging platform, plus
//! wallet helpers for producing real signatures in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use primitive_types::U256;
use rand::rngs::OsRng;

use sharegate_shared::attestation::{
    AccessRequest, ChatBindingAttestation, ACCESS_REQUEST_SCHEMA, CHAT_BINDING_SCHEMA,
};
use sharegate_shared::typed_data::{address_of, sign_typed_data};
use sharegate_shared::{Address, ChainId, ChatDescriptor, ChatId, ChatKind, PlatformUserId};
use sharegate_store::Database;

use crate::oracle::{ChainStateOracle, Holding, OracleError};
use crate::platform::{MemberStatus, MessagingPlatform, PlatformError};
use crate::store::Store;

pub const BOT_ID: PlatformUserId = 999;

pub fn share() -> Address {
    "0x0000000000000000000000000000000000000abc".parse().unwrap()
}

pub fn memory_store() -> Store {
    Store::new(Database::open_in_memory().unwrap())
}

pub fn chat(id: ChatId) -> ChatDescriptor {
    ChatDescriptor {
        id,
        title: format!("Holders {id}"),
        kind: ChatKind::Supergroup,
    }
}

// ---------------------------------------------------------------------------
// Wallets
// ---------------------------------------------------------------------------

pub struct Wallet {
    key: SigningKey,
}

impl Wallet {
    pub fn random() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn address(&self) -> Address {
        address_of(self.key.verifying_key())
    }

    pub fn sign_binding(&self, binding_id: &str, chain_id: ChainId, share: Address, ts: u64) -> String {
        let attestation = ChatBindingAttestation {
            chain_id,
            share_address: share,
            request_id: binding_id.to_string(),
            timestamp: ts,
        };
        sign_typed_data(
            &self.key,
            &ChatBindingAttestation::domain(),
            &CHAT_BINDING_SCHEMA,
            &attestation.values(),
        )
        .unwrap()
    }

    pub fn sign_access(&self, chain_id: ChainId, share: Address, ts: u64) -> String {
        let request = AccessRequest {
            chain_id,
            share_address: share,
            timestamp: ts,
        };
        sign_typed_data(
            &self.key,
            &AccessRequest::domain(),
            &ACCESS_REQUEST_SCHEMA,
            &request.values(),
        )
        .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockOracle {
    authors: Mutex<HashMap<(ChainId, Address), Address>>,
    holdings: Mutex<HashMap<(ChainId, Address, Address), Holding>>,
    failure: Mutex<Option<OracleError>>,
    pub holding_calls: AtomicUsize,
}

impl MockOracle {
    pub fn with_author(self, chain_id: ChainId, contract: Address, author: Address) -> Self {
        self.authors
            .lock()
            .unwrap()
            .insert((chain_id, contract), author);
        self
    }

    pub fn set_holding(&self, chain_id: ChainId, account: Address, contract: Address, balance: U256, decimals: u8) {
        self.holdings
            .lock()
            .unwrap()
            .insert((chain_id, account, contract), Holding { balance, decimals });
    }

    pub fn fail_with(&self, error: OracleError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    fn check_failure(&self) -> Result<(), OracleError> {
        match self.failure.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChainStateOracle for MockOracle {
    async fn author_of(&self, chain_id: ChainId, contract: Address) -> Result<Address, OracleError> {
        self.check_failure()?;
        self.authors
            .lock()
            .unwrap()
            .get(&(chain_id, contract))
            .copied()
            .ok_or_else(|| OracleError::ContractError("execution reverted".into()))
    }

    async fn holding_of(
        &self,
        chain_id: ChainId,
        account: Address,
        contract: Address,
    ) -> Result<Holding, OracleError> {
        self.holding_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self
            .holdings
            .lock()
            .unwrap()
            .get(&(chain_id, account, contract))
            .copied()
            .unwrap_or(Holding { balance: U256::zero(), decimals: 18 }))
    }
}

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    CreateLink(ChatId),
    Approve(ChatId, PlatformUserId),
    Decline(ChatId, PlatformUserId),
    Revoke(ChatId, String),
}

#[derive(Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    next_links: Mutex<VecDeque<String>>,
    counter: AtomicUsize,
    members: Mutex<HashMap<ChatId, MemberStatus>>,
    chats: Mutex<HashMap<ChatId, ChatDescriptor>>,
    pub fail_create: Mutex<bool>,
    pub fail_revoke: Mutex<bool>,
}

impl MockPlatform {
    pub fn queue_link(&self, link: &str) {
        self.next_links.lock().unwrap().push_back(link.to_string());
    }

    pub fn add_chat(&self, descriptor: ChatDescriptor, bot_status: MemberStatus) {
        self.members.lock().unwrap().insert(descriptor.id, bot_status);
        self.chats.lock().unwrap().insert(descriptor.id, descriptor);
    }

    /// Set the bot's membership in a chat that `get_chat` does not know.
    pub fn set_member(&self, chat_id: ChatId, bot_status: MemberStatus) {
        self.members.lock().unwrap().insert(chat_id, bot_status);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MessagingPlatform for MockPlatform {
    async fn create_single_use_invite_link(&self, chat_id: ChatId) -> Result<String, PlatformError> {
        self.record(PlatformCall::CreateLink(chat_id));
        if *self.fail_create.lock().unwrap() {
            return Err(PlatformError::Api {
                method: "createChatInviteLink",
                description: "Bad Request: not enough rights".into(),
            });
        }
        let queued = self.next_links.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("https://t.me/+link{n}")
        }))
    }

    async fn approve_join_request(&self, chat_id: ChatId, user_id: PlatformUserId) -> Result<(), PlatformError> {
        self.record(PlatformCall::Approve(chat_id, user_id));
        Ok(())
    }

    async fn decline_join_request(&self, chat_id: ChatId, user_id: PlatformUserId) -> Result<(), PlatformError> {
        self.record(PlatformCall::Decline(chat_id, user_id));
        Ok(())
    }

    async fn revoke_invite_link(&self, chat_id: ChatId, invite_link: &str) -> Result<(), PlatformError> {
        self.record(PlatformCall::Revoke(chat_id, invite_link.to_string()));
        if *self.fail_revoke.lock().unwrap() {
            return Err(PlatformError::Http("connection reset".into()));
        }
        Ok(())
    }

    async fn get_chat_member(&self, chat_id: ChatId, _user_id: PlatformUserId) -> Result<MemberStatus, PlatformError> {
        self.members
            .lock()
            .unwrap()
            .get(&chat_id)
            .copied()
            .ok_or_else(|| PlatformError::Api {
                method: "getChatMember",
                description: "Bad Request: chat not found".into(),
            })
    }

    async fn get_chat(&self, chat_id: ChatId) -> Result<ChatDescriptor, PlatformError> {
        self.chats
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .ok_or_else(|| PlatformError::Api {
                method: "getChat",
                description: "Bad Request: chat not found".into(),
            })
    }
}

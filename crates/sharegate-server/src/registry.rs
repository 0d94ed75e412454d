//! Share ⇄ chat bindings and their one-time author attestation.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use sharegate_shared::attestation::ChatBindingAttestation;
use sharegate_shared::{Address, ChainId, ChatDescriptor, ChatId};
use sharegate_store::{ShareChatBinding, SignOutcome};

use crate::error::ServerError;
use crate::oracle::ChainStateOracle;
use crate::store::Store;

#[derive(Clone)]
pub struct BindingRegistry {
    store: Store,
    oracle: Arc<dyn ChainStateOracle>,
}

impl BindingRegistry {
    pub fn new(store: Store, oracle: Arc<dyn ChainStateOracle>) -> Self {
        Self { store, oracle }
    }

    /// Record an unsigned binding. It stays invisible to [`resolve_chat`]
    /// until the share's author signs it.
    ///
    /// [`resolve_chat`]: Self::resolve_chat
    pub fn create_provisional(
        &self,
        chat: ChatDescriptor,
        share_address: Address,
        chain_id: ChainId,
    ) -> Result<ShareChatBinding, ServerError> {
        let binding = ShareChatBinding::provisional(chat, share_address, chain_id);
        self.store.with(|db| db.create_binding(&binding))?;
        info!(
            binding = %binding.id,
            chat_id = binding.chat.id,
            share = %share_address,
            chain_id,
            "Provisional binding created"
        );
        Ok(binding)
    }

    pub fn get(&self, id: Uuid) -> Result<ShareChatBinding, ServerError> {
        self.store.with(|db| db.get_binding(id)).map_err(|e| match e {
            ServerError::NotFound(_) => ServerError::NotFound(format!("binding {id}")),
            other => other,
        })
    }

    /// Make a binding authoritative.
    ///
    /// The signature must be a chat-binding attestation over the binding's
    /// own id, recovered to the contract's on-chain author.
    pub async fn sign(
        &self,
        id: Uuid,
        signature: &str,
        timestamp: u64,
    ) -> Result<ShareChatBinding, ServerError> {
        let binding = self.get(id)?;
        if binding.is_signed() {
            return Err(ServerError::AlreadySigned);
        }

        let attestation = ChatBindingAttestation {
            chain_id: binding.chain_id,
            share_address: binding.share_address,
            request_id: id.to_string(),
            timestamp,
        };
        let signer = attestation.recover_signer(signature).map_err(|e| {
            warn!(binding = %id, error = %e, "Binding signature rejected");
            ServerError::InvalidSignature
        })?;

        let author = self
            .oracle
            .author_of(binding.chain_id, binding.share_address)
            .await?;
        if author != signer {
            warn!(
                binding = %id,
                signer = %signer,
                author = %author,
                "Binding signed by someone other than the contract author"
            );
            return Err(ServerError::UnauthorizedSigner);
        }

        match self.store.with(|db| db.sign_binding(id, signature, timestamp))? {
            SignOutcome::Signed => {}
            SignOutcome::AlreadySigned => return Err(ServerError::AlreadySigned),
            SignOutcome::NotFound => return Err(ServerError::NotFound(format!("binding {id}"))),
        }

        info!(
            binding = %id,
            chat_id = binding.chat.id,
            share = %binding.share_address,
            chain_id = binding.chain_id,
            timestamp,
            "Binding signed by author"
        );

        Ok(ShareChatBinding {
            signature: Some(signature.to_string()),
            timestamp: Some(timestamp),
            ..binding
        })
    }

    /// The chat of the most recently signed binding for a share.
    pub fn resolve_chat(
        &self,
        share_address: &Address,
        chain_id: ChainId,
    ) -> Result<Option<ChatId>, ServerError> {
        let binding = self
            .store
            .with(|db| db.latest_signed_binding(share_address, chain_id))?;
        Ok(binding.map(|b| b.chat.id))
    }
}

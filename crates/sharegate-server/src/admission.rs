//! Token-gated admission: a verified holder gets a fresh single-use invite.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use sharegate_shared::attestation::AccessRequest;
use sharegate_shared::units::format_units;
use sharegate_shared::{Address, ChainId};
use sharegate_store::MembershipInvite;

use crate::error::ServerError;
use crate::oracle::ChainStateOracle;
use crate::platform::MessagingPlatform;
use crate::registry::BindingRegistry;
use crate::store::Store;

#[derive(Clone)]
pub struct AdmissionController {
    store: Store,
    registry: BindingRegistry,
    oracle: Arc<dyn ChainStateOracle>,
    platform: Arc<dyn MessagingPlatform>,
}

impl AdmissionController {
    pub fn new(
        store: Store,
        registry: BindingRegistry,
        oracle: Arc<dyn ChainStateOracle>,
        platform: Arc<dyn MessagingPlatform>,
    ) -> Self {
        Self {
            store,
            registry,
            oracle,
            platform,
        }
    }

    /// Verify a signed access request and mint an invite for its signer.
    ///
    /// Every successful call creates a new link, even for an account that
    /// already holds one.
    pub async fn request_access(
        &self,
        share_address: Address,
        chain_id: ChainId,
        signature: &str,
        timestamp: u64,
    ) -> Result<MembershipInvite, ServerError> {
        let request = AccessRequest {
            chain_id,
            share_address,
            timestamp,
        };
        let account = request.recover_signer(signature).map_err(|e| {
            warn!(share = %share_address, chain_id, error = %e, "Access request signature rejected");
            ServerError::InvalidSignature
        })?;

        let holding = self
            .oracle
            .holding_of(chain_id, account, share_address)
            .await?;
        if !holding.has_whole_unit() {
            let held = format_units(holding.balance, holding.decimals);
            warn!(
                account = %account,
                share = %share_address,
                chain_id,
                held = %held,
                "Access denied: insufficient holding"
            );
            return Err(ServerError::InsufficientHolding { held });
        }

        let chat_id = self
            .registry
            .resolve_chat(&share_address, chain_id)?
            .ok_or_else(|| {
                info!(share = %share_address, chain_id, "Access requested for share without a chat");
                ServerError::ChatNotConfigured
            })?;

        let invite_link = self
            .platform
            .create_single_use_invite_link(chat_id)
            .await
            .map_err(|e| {
                warn!(chat_id, error = %e, "Invite link creation failed");
                ServerError::InviteCreationFailed(e.to_string())
            })?;

        let invite = MembershipInvite {
            id: Uuid::new_v4(),
            account,
            invite_link,
            chat_id,
            share_address,
            chain_id,
            signature: signature.to_string(),
            timestamp,
            joined_user_id: None,
            created_at: Utc::now(),
            resolved_at: None,
        };

        if let Err(e) = self.store.with(|db| db.insert_invite(&invite)) {
            // A conflicting link is already recorded against another invite
            // and must stay live. Any other failure leaves an unrecorded link.
            if matches!(e, ServerError::StorageConflict(_)) {
                warn!(chat_id, "Platform returned an invite link that is already recorded");
                return Err(e);
            }
            if let Err(revoke_err) = self
                .platform
                .revoke_invite_link(chat_id, &invite.invite_link)
                .await
            {
                warn!(chat_id, error = %revoke_err, "Failed to revoke unrecorded invite link");
            }
            return Err(e);
        }

        info!(
            invite = %invite.id,
            account = %account,
            share = %share_address,
            chain_id,
            chat_id,
            "Invite issued"
        );
        Ok(invite)
    }
}

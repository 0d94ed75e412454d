//! Resolution of join requests filed through invites this bot issued.
//!
//! Each invite moves `issued -> approved | declined -> revoked`. The only
//! authorization boundary is the conditional claim in the store: whichever
//! request moves `joined_user_id` off NULL is approved, every other request
//! for the same link is declined. The link is revoked in every branch.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use sharegate_shared::units::format_units;
use sharegate_shared::{ChatId, PlatformUserId};
use sharegate_store::MembershipInvite;

use crate::error::ServerError;
use crate::oracle::ChainStateOracle;
use crate::platform::MessagingPlatform;
use crate::store::Store;

/// A join request as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequestEvent {
    pub chat_id: ChatId,
    pub user_id: PlatformUserId,
    pub invite_link: Option<String>,
    /// Who created the link the request came through.
    pub link_creator_id: Option<PlatformUserId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    UnknownInvite,
    AlreadyClaimed,
    ChatMismatch,
    InsufficientHolding,
    /// The holding re-check could not reach the chain.
    HoldingUnverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    /// Not one of our links.
    Ignored,
    Approved,
    Declined(DeclineReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinResolution {
    pub decision: JoinDecision,
    pub link_revoked: bool,
}

#[derive(Clone)]
pub struct JoinReconciler {
    store: Store,
    oracle: Arc<dyn ChainStateOracle>,
    platform: Arc<dyn MessagingPlatform>,
    bot_id: PlatformUserId,
    recheck_holding: bool,
}

impl JoinReconciler {
    pub fn new(
        store: Store,
        oracle: Arc<dyn ChainStateOracle>,
        platform: Arc<dyn MessagingPlatform>,
        bot_id: PlatformUserId,
        recheck_holding: bool,
    ) -> Self {
        Self {
            store,
            oracle,
            platform,
            bot_id,
            recheck_holding,
        }
    }

    pub async fn on_join_request(
        &self,
        event: &JoinRequestEvent,
    ) -> Result<JoinResolution, ServerError> {
        let link = match (&event.invite_link, event.link_creator_id) {
            (Some(link), Some(creator)) if creator == self.bot_id => link,
            _ => {
                debug!(chat_id = event.chat_id, user_id = event.user_id, "Join request not via our invite");
                return Ok(JoinResolution {
                    decision: JoinDecision::Ignored,
                    link_revoked: false,
                });
            }
        };

        let decision = match self.decide(event, link).await {
            Ok(()) => JoinDecision::Approved,
            Err(reason) => JoinDecision::Declined(reason),
        };

        let delivered = match decision {
            JoinDecision::Approved => {
                self.platform
                    .approve_join_request(event.chat_id, event.user_id)
                    .await
            }
            _ => {
                self.platform
                    .decline_join_request(event.chat_id, event.user_id)
                    .await
            }
        };
        if let Err(e) = delivered {
            error!(
                chat_id = event.chat_id,
                user_id = event.user_id,
                ?decision,
                error = %e,
                "Failed to deliver join decision"
            );
        }

        let link_revoked = match self.platform.revoke_invite_link(event.chat_id, link).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id = event.chat_id, error = %e, "Failed to revoke invite link");
                false
            }
        };

        Ok(JoinResolution {
            decision,
            link_revoked,
        })
    }

    /// Everything up to and including the claim. `Ok` means the claim is ours.
    async fn decide(&self, event: &JoinRequestEvent, link: &str) -> Result<(), DeclineReason> {
        let invite = match self.store.with(|db| db.find_invite_by_link(link)) {
            Ok(Some(invite)) => invite,
            Ok(None) => {
                info!(chat_id = event.chat_id, user_id = event.user_id, "Join declined: unknown invite");
                return Err(DeclineReason::UnknownInvite);
            }
            Err(e) => {
                error!(error = %e, "Invite lookup failed; declining");
                return Err(DeclineReason::UnknownInvite);
            }
        };

        if invite.is_claimed() {
            info!(invite = %invite.id, user_id = event.user_id, "Join declined: invite already used");
            return Err(DeclineReason::AlreadyClaimed);
        }
        if invite.chat_id != event.chat_id {
            warn!(
                invite = %invite.id,
                invite_chat = invite.chat_id,
                event_chat = event.chat_id,
                "Join declined: invite was issued for another chat"
            );
            return Err(DeclineReason::ChatMismatch);
        }
        if self.recheck_holding {
            self.recheck(&invite).await?;
        }

        match self.claim(link, event.user_id) {
            Ok(()) => {
                info!(
                    invite = %invite.id,
                    account = %invite.account,
                    user_id = event.user_id,
                    chat_id = event.chat_id,
                    "Join approved"
                );
                Ok(())
            }
            Err(ServerError::AlreadyResolved) => {
                info!(invite = %invite.id, user_id = event.user_id, "Join declined: lost the claim");
                Err(DeclineReason::AlreadyClaimed)
            }
            Err(e) => {
                error!(invite = %invite.id, error = %e, "Invite claim failed; declining");
                Err(DeclineReason::AlreadyClaimed)
            }
        }
    }

    async fn recheck(&self, invite: &MembershipInvite) -> Result<(), DeclineReason> {
        match self
            .oracle
            .holding_of(invite.chain_id, invite.account, invite.share_address)
            .await
        {
            Ok(holding) if holding.has_whole_unit() => Ok(()),
            Ok(holding) => {
                warn!(
                    invite = %invite.id,
                    account = %invite.account,
                    share = %invite.share_address,
                    chain_id = invite.chain_id,
                    held = %format_units(holding.balance, holding.decimals),
                    "Join declined: holding dropped since issuance"
                );
                Err(DeclineReason::InsufficientHolding)
            }
            Err(e) => {
                warn!(invite = %invite.id, error = %e, "Join declined: holding could not be verified");
                Err(DeclineReason::HoldingUnverified)
            }
        }
    }

    fn claim(&self, link: &str, user_id: PlatformUserId) -> Result<(), ServerError> {
        if self
            .store
            .with(|db| db.claim_invite(link, user_id, Utc::now()))?
        {
            Ok(())
        } else {
            Err(ServerError::AlreadyResolved)
        }
    }
}

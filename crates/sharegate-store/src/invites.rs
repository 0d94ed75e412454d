//! CRUD operations for [`MembershipInvite`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use sharegate_shared::PlatformUserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::MembershipInvite;
use crate::sql::{address_at, opt_time_at, time_at, to_i64, u64_at, uuid_at};

impl Database {
    /// Record a freshly minted invite.
    ///
    /// `invite_link` is unique-indexed; a duplicate surfaces as
    /// [`StoreError::Conflict`](crate::StoreError::Conflict).
    pub fn insert_invite(&self, invite: &MembershipInvite) -> Result<()> {
        self.conn().execute(
            "INSERT INTO invites (id, account, invite_link, chat_id, share_address, chain_id,
                                  signature, signed_timestamp, joined_user_id, created_at,
                                  resolved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                invite.id.to_string(),
                invite.account.to_hex(),
                invite.invite_link,
                invite.chat_id,
                invite.share_address.to_hex(),
                to_i64(invite.chain_id, "chain_id")?,
                invite.signature,
                to_i64(invite.timestamp, "signed_timestamp")?,
                invite.joined_user_id,
                invite.created_at.to_rfc3339(),
                invite.resolved_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn find_invite_by_link(&self, invite_link: &str) -> Result<Option<MembershipInvite>> {
        let invite = self
            .conn()
            .query_row(
                "SELECT id, account, invite_link, chat_id, share_address, chain_id,
                        signature, signed_timestamp, joined_user_id, created_at, resolved_at
                 FROM invites
                 WHERE invite_link = ?1",
                params![invite_link],
                row_to_invite,
            )
            .optional()?;
        Ok(invite)
    }

    /// Claim an invite for `user_id`.
    ///
    /// Single conditional update: returns `true` only for the caller whose
    /// write moved `joined_user_id` from NULL. Returns `false` when the link
    /// is unknown or already claimed.
    pub fn claim_invite(
        &self,
        invite_link: &str,
        user_id: PlatformUserId,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE invites
             SET joined_user_id = ?2, resolved_at = ?3
             WHERE invite_link = ?1 AND joined_user_id IS NULL",
            params![invite_link, user_id, at.to_rfc3339()],
        )?;
        Ok(affected == 1)
    }
}

fn row_to_invite(row: &rusqlite::Row<'_>) -> rusqlite::Result<MembershipInvite> {
    Ok(MembershipInvite {
        id: uuid_at(row, 0)?,
        account: address_at(row, 1)?,
        invite_link: row.get(2)?,
        chat_id: row.get(3)?,
        share_address: address_at(row, 4)?,
        chain_id: u64_at(row, 5)?,
        signature: row.get(6)?,
        timestamp: u64_at(row, 7)?,
        joined_user_id: row.get(8)?,
        created_at: time_at(row, 9)?,
        resolved_at: opt_time_at(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use uuid::Uuid;

    use super::*;
    use crate::error::StoreError;

    fn invite(link: &str) -> MembershipInvite {
        MembershipInvite {
            id: Uuid::new_v4(),
            account: "0x00000000000000000000000000000000000000aa".parse().unwrap(),
            invite_link: link.to_string(),
            chat_id: -1001,
            share_address: "0x0000000000000000000000000000000000000abc".parse().unwrap(),
            chain_id: 1,
            signature: "0xsig".to_string(),
            timestamp: 100,
            joined_user_id: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[test]
    fn insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        let inv = invite("https://t.me/+tok1");
        db.insert_invite(&inv).unwrap();

        let found = db.find_invite_by_link("https://t.me/+tok1").unwrap().unwrap();
        assert_eq!(found.id, inv.id);
        assert_eq!(found.account, inv.account);
        assert!(!found.is_claimed());

        assert!(db.find_invite_by_link("https://t.me/+nope").unwrap().is_none());
    }

    #[test]
    fn duplicate_link_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.insert_invite(&invite("tok1")).unwrap();
        assert!(matches!(
            db.insert_invite(&invite("tok1")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn claim_once() {
        let db = Database::open_in_memory().unwrap();
        db.insert_invite(&invite("tok1")).unwrap();

        assert!(db.claim_invite("tok1", 42, Utc::now()).unwrap());
        assert!(!db.claim_invite("tok1", 43, Utc::now()).unwrap());
        assert!(!db.claim_invite("unknown", 42, Utc::now()).unwrap());

        let found = db.find_invite_by_link("tok1").unwrap().unwrap();
        assert_eq!(found.joined_user_id, Some(42));
        assert!(found.resolved_at.is_some());
    }

    #[test]
    fn concurrent_claims_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("race.db");
        Database::open_at(&path)
            .unwrap()
            .insert_invite(&invite("tok-race"))
            .unwrap();

        let contenders = 4;
        let barrier = Arc::new(Barrier::new(contenders));
        let handles: Vec<_> = (0..contenders)
            .map(|i| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let db = Database::open_at(&path).unwrap();
                    barrier.wait();
                    db.claim_invite("tok-race", 100 + i as i64, Utc::now()).unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);

        let db = Database::open_at(&path).unwrap();
        let claimed = db.find_invite_by_link("tok-race").unwrap().unwrap();
        assert!(claimed.joined_user_id.is_some());
    }
}

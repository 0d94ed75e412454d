//! CRUD operations for [`ShareChatBinding`] records.

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use sharegate_shared::{Address, ChainId, ChatDescriptor};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{ShareChatBinding, SignOutcome};
use crate::sql::{address_at, opt_u64_at, time_at, to_i64, u64_at, uuid_at};

const BINDING_COLUMNS: &str = "id, chat_id, chat_title, chat_type, share_address, chain_id,
     signature, signed_timestamp, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a binding. Provisional bindings carry no signature.
    pub fn create_binding(&self, binding: &ShareChatBinding) -> Result<()> {
        self.conn().execute(
            "INSERT INTO bindings (id, chat_id, chat_title, chat_type, share_address, chain_id,
                                   signature, signed_timestamp, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                binding.id.to_string(),
                binding.chat.id,
                binding.chat.title,
                binding.chat.kind.as_str(),
                binding.share_address.to_hex(),
                to_i64(binding.chain_id, "chain_id")?,
                binding.signature,
                binding.timestamp.map(|t| to_i64(t, "signed_timestamp")).transpose()?,
                binding.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single binding by UUID.
    pub fn get_binding(&self, id: Uuid) -> Result<ShareChatBinding> {
        self.conn()
            .query_row(
                &format!("SELECT {BINDING_COLUMNS} FROM bindings WHERE id = ?1"),
                params![id.to_string()],
                row_to_binding,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::from(other),
            })
    }

    /// The signed binding with the greatest signed timestamp for a share,
    /// later creation winning ties. Provisional bindings are never returned.
    pub fn latest_signed_binding(
        &self,
        share_address: &Address,
        chain_id: ChainId,
    ) -> Result<Option<ShareChatBinding>> {
        let binding = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {BINDING_COLUMNS}
                     FROM bindings
                     WHERE share_address = ?1 AND chain_id = ?2 AND signature IS NOT NULL
                     ORDER BY signed_timestamp DESC, rowid DESC
                     LIMIT 1"
                ),
                params![share_address.to_hex(), to_i64(chain_id, "chain_id")?],
                row_to_binding,
            )
            .optional()?;
        Ok(binding)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Attach a signature to a provisional binding.
    ///
    /// The write only applies while `signature IS NULL`, so of any number of
    /// concurrent signers exactly one gets [`SignOutcome::Signed`].
    pub fn sign_binding(&self, id: Uuid, signature: &str, timestamp: u64) -> Result<SignOutcome> {
        let affected = self.conn().execute(
            "UPDATE bindings
             SET signature = ?2, signed_timestamp = ?3
             WHERE id = ?1 AND signature IS NULL",
            params![id.to_string(), signature, to_i64(timestamp, "signed_timestamp")?],
        )?;
        if affected > 0 {
            return Ok(SignOutcome::Signed);
        }

        let exists = self
            .conn()
            .query_row(
                "SELECT 1 FROM bindings WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        Ok(if exists {
            SignOutcome::AlreadySigned
        } else {
            SignOutcome::NotFound
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`ShareChatBinding`].
fn row_to_binding(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareChatBinding> {
    let chat_type: String = row.get(3)?;
    let kind = chat_type.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(ShareChatBinding {
        id: uuid_at(row, 0)?,
        chat: ChatDescriptor {
            id: row.get(1)?,
            title: row.get(2)?,
            kind,
        },
        share_address: address_at(row, 4)?,
        chain_id: u64_at(row, 5)?,
        signature: row.get(6)?,
        timestamp: opt_u64_at(row, 7)?,
        created_at: time_at(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharegate_shared::ChatKind;

    fn share() -> Address {
        "0x0000000000000000000000000000000000000abc".parse().unwrap()
    }

    fn chat(id: i64) -> ChatDescriptor {
        ChatDescriptor {
            id,
            title: format!("chat {id}"),
            kind: ChatKind::Supergroup,
        }
    }

    fn signed(db: &Database, chat_id: i64, chain_id: ChainId, ts: u64) -> ShareChatBinding {
        let binding = ShareChatBinding::provisional(chat(chat_id), share(), chain_id);
        db.create_binding(&binding).unwrap();
        assert_eq!(
            db.sign_binding(binding.id, "0xsig", ts).unwrap(),
            SignOutcome::Signed
        );
        binding
    }

    #[test]
    fn create_and_get_provisional() {
        let db = Database::open_in_memory().unwrap();
        let binding = ShareChatBinding::provisional(chat(-100), share(), 1);
        db.create_binding(&binding).unwrap();

        let fetched = db.get_binding(binding.id).unwrap();
        assert_eq!(fetched.chat, binding.chat);
        assert_eq!(fetched.share_address, share());
        assert!(!fetched.is_signed());
        assert_eq!(fetched.timestamp, None);
    }

    #[test]
    fn get_missing_binding() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.get_binding(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn provisional_bindings_are_invisible() {
        let db = Database::open_in_memory().unwrap();
        let binding = ShareChatBinding::provisional(chat(-100), share(), 1);
        db.create_binding(&binding).unwrap();

        assert_eq!(db.latest_signed_binding(&share(), 1).unwrap(), None);
    }

    #[test]
    fn latest_timestamp_wins() {
        let db = Database::open_in_memory().unwrap();
        signed(&db, -1, 1, 200);
        signed(&db, -2, 1, 100);
        signed(&db, -3, 2, 300);

        let latest = db.latest_signed_binding(&share(), 1).unwrap().unwrap();
        assert_eq!(latest.chat.id, -1);
        assert_eq!(latest.timestamp, Some(200));
    }

    #[test]
    fn timestamp_tie_goes_to_later_creation() {
        let db = Database::open_in_memory().unwrap();
        signed(&db, -1, 1, 100);
        signed(&db, -2, 1, 100);

        let latest = db.latest_signed_binding(&share(), 1).unwrap().unwrap();
        assert_eq!(latest.chat.id, -2);
    }

    #[test]
    fn second_signature_is_rejected_without_mutation() {
        let db = Database::open_in_memory().unwrap();
        let binding = signed(&db, -1, 1, 100);

        assert_eq!(
            db.sign_binding(binding.id, "0xother", 999).unwrap(),
            SignOutcome::AlreadySigned
        );
        let fetched = db.get_binding(binding.id).unwrap();
        assert_eq!(fetched.signature.as_deref(), Some("0xsig"));
        assert_eq!(fetched.timestamp, Some(100));
    }

    #[test]
    fn sign_missing_binding() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.sign_binding(Uuid::new_v4(), "0xsig", 1).unwrap(),
            SignOutcome::NotFound
        );
    }

    #[test]
    fn out_of_range_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let binding = ShareChatBinding::provisional(chat(-1), share(), 1);
        db.create_binding(&binding).unwrap();
        assert!(matches!(
            db.sign_binding(binding.id, "0xsig", u64::MAX),
            Err(StoreError::OutOfRange("signed_timestamp"))
        ));
    }

    #[test]
    fn binding_json_shape() {
        let binding = ShareChatBinding::provisional(chat(-7), share(), 5);
        let json = serde_json::to_value(&binding).unwrap();
        assert_eq!(json["_id"], binding.id.to_string());
        assert_eq!(json["chatInfo"]["id"], -7);
        assert_eq!(json["dibsShareAddress"], share().to_hex());
        assert_eq!(json["chainId"], 5);
        assert!(json["signature"].is_null());
    }
}

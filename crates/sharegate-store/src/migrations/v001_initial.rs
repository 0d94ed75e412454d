//! v001 -- Initial schema creation.
//!
//! Creates `bindings` (chat ⇄ share contract) and `invites` (single-use
//! admission links).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Share chat bindings
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS bindings (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    chat_id          INTEGER NOT NULL,
    chat_title       TEXT NOT NULL,
    chat_type        TEXT NOT NULL,
    share_address    TEXT NOT NULL,               -- lower-case 0x hex
    chain_id         INTEGER NOT NULL,
    signature        TEXT,                        -- NULL while provisional
    signed_timestamp INTEGER,                     -- NULL while provisional
    created_at       TEXT NOT NULL                -- RFC-3339
);

-- rowid breaks timestamp ties in creation order
CREATE INDEX IF NOT EXISTS idx_bindings_signed_lookup
    ON bindings(share_address, chain_id, signed_timestamp DESC)
    WHERE signature IS NOT NULL;

-- ----------------------------------------------------------------
-- Membership invites
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS invites (
    id               TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    account          TEXT NOT NULL,               -- signer, lower-case 0x hex
    invite_link      TEXT NOT NULL,
    chat_id          INTEGER NOT NULL,
    share_address    TEXT NOT NULL,
    chain_id         INTEGER NOT NULL,
    signature        TEXT NOT NULL,
    signed_timestamp INTEGER NOT NULL,
    joined_user_id   INTEGER,                     -- NULL until claimed
    created_at       TEXT NOT NULL,
    resolved_at      TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_invites_link ON invites(invite_link);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

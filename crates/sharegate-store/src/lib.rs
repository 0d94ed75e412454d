//! # sharegate-store
//!
//! SQLite persistence for share chat bindings and membership invites.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every domain model.
//! Exclusivity (one signature per binding, one claim per invite, unique
//! invite links) is enforced by the database itself.

pub mod bindings;
pub mod database;
pub mod invites;
pub mod migrations;
pub mod models;

mod error;
mod sql;

pub use database::Database;
pub use error::StoreError;
pub use models::*;

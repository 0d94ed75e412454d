//! # sharegate-shared
//!
//! Domain primitives shared by the Sharegate store and server: addresses and
//! chat descriptors, typed structured-data signing and recovery, the signed
//! message schemas, deep-link parameters and unit formatting.

pub mod attestation;
pub mod constants;
pub mod deep_link;
pub mod error;
pub mod typed_data;
pub mod types;
pub mod units;

pub use error::SignatureError;
pub use types::{Address, ChainId, ChatDescriptor, ChatId, ChatKind, PlatformUserId};

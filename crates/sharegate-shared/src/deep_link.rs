//! Parameters carried by the bot's `/start` deep link.
//!
//! The share page links owners to `https://t.me/<bot>?start=s=<address>-c=<chainId>`,
//! which the platform delivers as the message text `/start s=<address>-c=<chainId>`.

use crate::constants::START_COMMAND;
use crate::types::{Address, ChainId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartParams {
    pub share_address: Option<Address>,
    pub chain_id: Option<ChainId>,
}

impl StartParams {
    /// Parse a `/start` command. Returns `None` for any other text.
    ///
    /// Unknown or malformed pairs are skipped rather than failing the
    /// whole command.
    pub fn parse(text: &str) -> Option<Self> {
        let rest = text.strip_prefix(START_COMMAND)?;
        // `/startgroup` and friends are different commands.
        if !(rest.is_empty() || rest.starts_with(' ')) {
            return None;
        }

        let mut params = Self::default();
        for pair in rest.trim().split('-') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            match name {
                "s" => params.share_address = value.parse().ok(),
                "c" => params.chain_id = value.parse().ok(),
                _ => {}
            }
        }
        Some(params)
    }

    pub fn to_payload(&self) -> String {
        let mut parts = Vec::new();
        if let Some(addr) = &self.share_address {
            parts.push(format!("s={addr}"));
        }
        if let Some(chain_id) = self.chain_id {
            parts.push(format!("c={chain_id}"));
        }
        parts.join("-")
    }
}

//! Read-only chain state used to authorize bindings and access requests.
//!
//! The oracle answers two questions about a share contract: who authored it,
//! and how much of it an account holds. Answers feed a time-sensitive
//! authorization decision, so calls are bounded by a timeout and never
//! retried here; the caller retries with a fresh request.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use primitive_types::U256;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use sharegate_shared::typed_data::keccak256;
use sharegate_shared::units::one_unit;
use sharegate_shared::{Address, ChainId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("no RPC endpoint configured for chain {0}")]
    UnsupportedChain(ChainId),

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("contract error: {0}")]
    ContractError(String),
}

/// An account's balance of a share token, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holding {
    pub balance: U256,
    pub decimals: u8,
}

impl Holding {
    /// At least one whole token, i.e. `balance >= 10^decimals`.
    pub fn has_whole_unit(&self) -> bool {
        one_unit(self.decimals).is_some_and(|unit| self.balance >= unit)
    }
}

#[async_trait]
pub trait ChainStateOracle: Send + Sync {
    /// The account recorded as the contract's author.
    async fn author_of(&self, chain_id: ChainId, contract: Address)
        -> Result<Address, OracleError>;

    /// `account`'s current balance of the token at `contract`.
    async fn holding_of(
        &self,
        chain_id: ChainId,
        account: Address,
        contract: Address,
    ) -> Result<Holding, OracleError>;
}

// ---------------------------------------------------------------------------
// JSON-RPC implementation
// ---------------------------------------------------------------------------

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// `eth_call` against one RPC endpoint per chain.
#[derive(Clone)]
pub struct JsonRpcOracle {
    client: reqwest::Client,
    endpoints: HashMap<ChainId, String>,
}

impl JsonRpcOracle {
    pub fn new(endpoints: HashMap<ChainId, String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoints })
    }

    async fn eth_call(
        &self,
        chain_id: ChainId,
        to: Address,
        calldata: Vec<u8>,
    ) -> Result<Vec<u8>, OracleError> {
        let url = self
            .endpoints
            .get(&chain_id)
            .ok_or(OracleError::UnsupportedChain(chain_id))?;

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": to.to_hex(), "data": format!("0x{}", hex::encode(&calldata)) },
                "latest"
            ],
        });

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            // Endpoint URLs often embed an API key.
            .map_err(|e| OracleError::ChainUnavailable(e.without_url().to_string()))?;

        if !resp.status().is_success() {
            return Err(OracleError::ChainUnavailable(format!(
                "RPC returned {}",
                resp.status()
            )));
        }

        let rpc: RpcResponse = resp
            .json()
            .await
            .map_err(|e| {
                OracleError::ChainUnavailable(format!("bad RPC response: {}", e.without_url()))
            })?;

        if let Some(err) = rpc.error {
            debug!(chain_id, code = err.code, message = %err.message, "eth_call failed");
            // code 3 is the standard "execution reverted" with data
            return Err(if err.code == 3 || err.message.contains("revert") {
                OracleError::ContractError(err.message)
            } else {
                OracleError::ChainUnavailable(err.message)
            });
        }

        let result = rpc
            .result
            .ok_or_else(|| OracleError::ChainUnavailable("RPC response has no result".into()))?;
        hex::decode(result.trim_start_matches("0x"))
            .map_err(|_| OracleError::ContractError("return data is not hex".into()))
    }
}

fn first_word(data: &[u8]) -> Result<&[u8], OracleError> {
    data.get(..32)
        .ok_or_else(|| OracleError::ContractError(format!("expected 32-byte return, got {}", data.len())))
}

fn decode_address(data: &[u8]) -> Result<Address, OracleError> {
    Address::from_word(first_word(data)?)
        .ok_or_else(|| OracleError::ContractError("return value is not an address".into()))
}

fn decode_uint(data: &[u8]) -> Result<U256, OracleError> {
    Ok(U256::from_big_endian(first_word(data)?))
}

fn decode_u8(data: &[u8]) -> Result<u8, OracleError> {
    let value = decode_uint(data)?;
    if value > U256::from(u8::MAX) {
        return Err(OracleError::ContractError(format!("decimals out of range: {value}")));
    }
    Ok(value.low_u32() as u8)
}

#[async_trait]
impl ChainStateOracle for JsonRpcOracle {
    async fn author_of(
        &self,
        chain_id: ChainId,
        contract: Address,
    ) -> Result<Address, OracleError> {
        let data = self
            .eth_call(chain_id, contract, selector("author()").to_vec())
            .await?;
        decode_address(&data)
    }

    async fn holding_of(
        &self,
        chain_id: ChainId,
        account: Address,
        contract: Address,
    ) -> Result<Holding, OracleError> {
        let mut balance_call = selector("balanceOf(address)").to_vec();
        balance_call.extend_from_slice(&account.to_word());

        let (balance, decimals) = tokio::try_join!(
            self.eth_call(chain_id, contract, balance_call),
            self.eth_call(chain_id, contract, selector("decimals()").to_vec()),
        )?;

        Ok(Holding {
            balance: decode_uint(&balance)?,
            decimals: decode_u8(&decimals)?,
        })
    }
}

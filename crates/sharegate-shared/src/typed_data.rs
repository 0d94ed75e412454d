//! Typed structured-data hashing and signer recovery (EIP-712, `eth_signTypedData_v4`).
//!
//! Only the flat subset used by this service is supported: a domain with
//! `name` and `version`, and a primary struct whose members are `uint256`,
//! `address` or `string`. No nested structs or arrays.
//!
//! digest = keccak256(0x19 0x01 ‖ domainSeparator ‖ hashStruct(message))

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use primitive_types::U256;
use sha3::{Digest, Keccak256};

use crate::error::SignatureError;
use crate::types::Address;

const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version)";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uint256,
    Address,
    String,
}

impl FieldKind {
    fn sol_name(&self) -> &'static str {
        match self {
            FieldKind::Uint256 => "uint256",
            FieldKind::Address => "address",
            FieldKind::String => "string",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TypedField {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A named struct type, e.g. `Mail(address from,string contents)`.
#[derive(Debug, Clone, Copy)]
pub struct StructType {
    pub name: &'static str,
    pub fields: &'static [TypedField],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Uint256(U256),
    Address(Address),
    String(String),
}

impl FieldValue {
    fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Uint256(_) => FieldKind::Uint256,
            FieldValue::Address(_) => FieldKind::Address,
            FieldValue::String(_) => FieldKind::String,
        }
    }

    fn encode(&self) -> [u8; 32] {
        match self {
            FieldValue::Uint256(v) => {
                let mut word = [0u8; 32];
                v.to_big_endian(&mut word);
                word
            }
            FieldValue::Address(a) => a.to_word(),
            FieldValue::String(s) => keccak256(s.as_bytes()),
        }
    }
}

impl StructType {
    pub fn encode_type(&self) -> String {
        let members: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.kind.sol_name(), f.name))
            .collect();
        format!("{}({})", self.name, members.join(","))
    }

    pub fn type_hash(&self) -> [u8; 32] {
        keccak256(self.encode_type().as_bytes())
    }

    /// `hashStruct(s) = keccak256(typeHash ‖ encodeData(s))`
    ///
    /// Values must be given in schema order.
    pub fn hash_struct(&self, values: &[FieldValue]) -> Result<[u8; 32], SignatureError> {
        if values.len() != self.fields.len() {
            return Err(SignatureError::SchemaMismatch {
                schema: self.name,
                reason: format!("expected {} members, got {}", self.fields.len(), values.len()),
            });
        }

        let mut buf = Vec::with_capacity(32 * (values.len() + 1));
        buf.extend_from_slice(&self.type_hash());
        for (field, value) in self.fields.iter().zip(values) {
            if field.kind != value.kind() {
                return Err(SignatureError::SchemaMismatch {
                    schema: self.name,
                    reason: format!("member {} must be {}", field.name, field.kind.sol_name()),
                });
            }
            buf.extend_from_slice(&value.encode());
        }
        Ok(keccak256(&buf))
    }
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
}

impl Eip712Domain {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn separator(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
        buf.extend_from_slice(&keccak256(self.name.as_bytes()));
        buf.extend_from_slice(&keccak256(self.version.as_bytes()));
        keccak256(&buf)
    }
}

/// The 32-byte digest a wallet signs for `message` under `domain`.
pub fn signing_digest(
    domain: &Eip712Domain,
    schema: &StructType,
    values: &[FieldValue],
) -> Result<[u8; 32], SignatureError> {
    let struct_hash = schema.hash_struct(values)?;
    let mut buf = [0u8; 66];
    buf[0] = 0x19;
    buf[1] = 0x01;
    buf[2..34].copy_from_slice(&domain.separator());
    buf[34..].copy_from_slice(&struct_hash);
    Ok(keccak256(&buf))
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Derive the account address controlled by a secp256k1 public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address(bytes)
}

/// Split a `0x`-prefixed 65-byte `r ‖ s ‖ v` signature.
fn parse_signature(signature: &str) -> Result<(Signature, RecoveryId), SignatureError> {
    let trimmed = signature.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|_| SignatureError::InvalidHex)?;
    if bytes.len() != 65 {
        return Err(SignatureError::InvalidLength(bytes.len()));
    }

    let v = bytes[64];
    let recovery_byte = match v {
        27 | 28 => v - 27,
        0 | 1 => v,
        other => return Err(SignatureError::InvalidRecoveryId(other)),
    };
    let mut recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(SignatureError::InvalidRecoveryId(v))?;
    let mut sig = Signature::from_slice(&bytes[..64]).map_err(|_| SignatureError::Malformed)?;

    // Wallets emit low-s, but ecrecover accepts either form. Flipping s
    // mirrors the point, so the parity bit flips with it.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    Ok((sig, recovery_id))
}

/// Recover the account that signed `values` under `domain`.
pub fn recover_signer(
    domain: &Eip712Domain,
    schema: &StructType,
    values: &[FieldValue],
    signature: &str,
) -> Result<Address, SignatureError> {
    let digest = signing_digest(domain, schema, values)?;
    let (sig, recovery_id) = parse_signature(signature)?;
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;
    Ok(address_of(&key))
}

/// Produce a `0x`-prefixed 65-byte signature the way a wallet would.
pub fn sign_typed_data(
    key: &SigningKey,
    domain: &Eip712Domain,
    schema: &StructType,
    values: &[FieldValue],
) -> Result<String, SignatureError> {
    let digest = signing_digest(domain, schema, values)?;
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|_| SignatureError::SigningFailed)?;

    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    Ok(format!("0x{}", hex::encode(bytes)))
}

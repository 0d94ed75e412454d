//! The two signed messages this service accepts.
//!
//! Domain and struct names are part of the wire format: the frontend builds
//! the same typed data for the wallet to sign, so they must not change.
//! Each schema gets its own domain name, which keeps a signature for one
//! purpose from being replayed as the other.

use primitive_types::U256;

use crate::constants::TYPED_DATA_VERSION;
use crate::error::SignatureError;
use crate::typed_data::{recover_signer, Eip712Domain, FieldKind, FieldValue, StructType, TypedField};
use crate::types::{Address, ChainId};

pub const CHAT_BINDING_SCHEMA: StructType = StructType {
    name: "DibsShareChatInfo",
    fields: &[
        TypedField { name: "chainId", kind: FieldKind::Uint256 },
        TypedField { name: "dibsShareAddress", kind: FieldKind::Address },
        TypedField { name: "requestId", kind: FieldKind::String },
        TypedField { name: "timestamp", kind: FieldKind::Uint256 },
    ],
};

pub const ACCESS_REQUEST_SCHEMA: StructType = StructType {
    name: "DibsShareChatJoinRequest",
    fields: &[
        TypedField { name: "chainId", kind: FieldKind::Uint256 },
        TypedField { name: "dibsShareAddress", kind: FieldKind::Address },
        TypedField { name: "timestamp", kind: FieldKind::Uint256 },
    ],
};

/// Signed by a share's author to bind a chat to the share contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatBindingAttestation {
    pub chain_id: ChainId,
    pub share_address: Address,
    /// Id of the provisional binding being attested.
    pub request_id: String,
    pub timestamp: u64,
}

impl ChatBindingAttestation {
    pub fn domain() -> Eip712Domain {
        Eip712Domain::new(CHAT_BINDING_SCHEMA.name, TYPED_DATA_VERSION)
    }

    pub fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uint256(U256::from(self.chain_id)),
            FieldValue::Address(self.share_address),
            FieldValue::String(self.request_id.clone()),
            FieldValue::Uint256(U256::from(self.timestamp)),
        ]
    }

    pub fn recover_signer(&self, signature: &str) -> Result<Address, SignatureError> {
        recover_signer(&Self::domain(), &CHAT_BINDING_SCHEMA, &self.values(), signature)
    }
}

/// Signed by a prospective member to prove control of the holding wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub chain_id: ChainId,
    pub share_address: Address,
    pub timestamp: u64,
}

impl AccessRequest {
    pub fn domain() -> Eip712Domain {
        Eip712Domain::new(ACCESS_REQUEST_SCHEMA.name, TYPED_DATA_VERSION)
    }

    pub fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uint256(U256::from(self.chain_id)),
            FieldValue::Address(self.share_address),
            FieldValue::Uint256(U256::from(self.timestamp)),
        ]
    }

    pub fn recover_signer(&self, signature: &str) -> Result<Address, SignatureError> {
        recover_signer(&Self::domain(), &ACCESS_REQUEST_SCHEMA, &self.values(), signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed_data::{address_of, sign_typed_data};
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;

    fn share() -> Address {
        "0x0000000000000000000000000000000000000abc".parse().unwrap()
    }

    #[test]
    fn test_encode_types() {
        assert_eq!(
            CHAT_BINDING_SCHEMA.encode_type(),
            "DibsShareChatInfo(uint256 chainId,address dibsShareAddress,string requestId,uint256 timestamp)"
        );
        assert_eq!(
            ACCESS_REQUEST_SCHEMA.encode_type(),
            "DibsShareChatJoinRequest(uint256 chainId,address dibsShareAddress,uint256 timestamp)"
        );
    }

    #[test]
    fn test_binding_attestation_recovers_author() {
        let author = SigningKey::random(&mut OsRng);
        let attestation = ChatBindingAttestation {
            chain_id: 1,
            share_address: share(),
            request_id: "b1".to_string(),
            timestamp: 100,
        };
        let sig = sign_typed_data(
            &author,
            &ChatBindingAttestation::domain(),
            &CHAT_BINDING_SCHEMA,
            &attestation.values(),
        )
        .unwrap();

        assert_eq!(
            attestation.recover_signer(&sig).unwrap(),
            address_of(author.verifying_key())
        );

        let other_binding = ChatBindingAttestation {
            request_id: "b2".to_string(),
            ..attestation
        };
        assert_ne!(
            other_binding.recover_signer(&sig).ok(),
            Some(address_of(author.verifying_key()))
        );
    }

    #[test]
    fn test_access_request_not_replayable_as_binding() {
        let member = SigningKey::random(&mut OsRng);
        let member_addr = address_of(member.verifying_key());
        let request = AccessRequest {
            chain_id: 1,
            share_address: share(),
            timestamp: 100,
        };
        let sig = sign_typed_data(
            &member,
            &AccessRequest::domain(),
            &ACCESS_REQUEST_SCHEMA,
            &request.values(),
        )
        .unwrap();

        assert_eq!(request.recover_signer(&sig).unwrap(), member_addr);

        let as_binding = ChatBindingAttestation {
            chain_id: 1,
            share_address: share(),
            request_id: String::new(),
            timestamp: 100,
        };
        assert_ne!(as_binding.recover_signer(&sig).ok(), Some(member_addr));
    }
}

use alloy_primitives::{
    B256,
    Bytes,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::payload::CommitmentKey;

/// Spellings under which a blinded block body may carry its execution payload header,
/// in the order they are tried.
pub const EXECUTION_PAYLOAD_HEADER_KEYS: [&str; 2] =
    ["execution_payload_header", "executionPayloadHeader"];

/// Proposer-signed blinded block as submitted with `builder_proposeBlindedBlockV1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedBlindedBeaconBlock {
    pub message: BlindedBeaconBlock,
    #[serde(default)]
    pub signature: Bytes,
}

/// Only the fields the proxy reads. The inbound request params are what gets forwarded,
/// so anything else a caller sends reaches the relay untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlindedBeaconBlock {
    #[serde(default)]
    pub parent_root: B256,
    #[serde(default)]
    pub state_root: B256,
    /// Opaque body, either a JSON object or a string holding JSON text.
    #[serde(default)]
    pub body: Value,
}

/// The header fields a proposer committed to, as found inside a blinded block body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedHeader {
    #[serde(rename = "blockHash", alias = "block_hash")]
    pub block_hash: B256,
    #[serde(rename = "parentHash", alias = "parent_hash")]
    pub parent_hash: B256,
    #[serde(rename = "stateRoot", alias = "state_root")]
    pub state_root: B256,
    #[serde(
        rename = "transactionsRoot",
        alias = "transactions_root",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transactions_root: Option<B256>,
}

impl CommittedHeader {
    pub fn commitment_key(&self) -> CommitmentKey {
        CommitmentKey {
            block_hash: self.block_hash,
            parent_hash: self.parent_hash,
            state_root: self.state_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn committed_header_accepts_both_field_spellings() {
        let camel: CommittedHeader = serde_json::from_value(json!({
            "blockHash": B256::with_last_byte(1),
            "parentHash": B256::ZERO,
            "stateRoot": B256::with_last_byte(3),
            "baseFeePerGas": "0x4",
        }))
        .unwrap();
        let snake: CommittedHeader = serde_json::from_value(json!({
            "block_hash": B256::with_last_byte(1),
            "parent_hash": B256::ZERO,
            "state_root": B256::with_last_byte(3),
        }))
        .unwrap();

        assert_eq!(camel, snake);
        assert_eq!(camel.transactions_root, None);
        assert_eq!(camel.commitment_key().state_root, B256::with_last_byte(3));
    }

    #[test]
    fn blinded_block_keeps_body_opaque() {
        let block: SignedBlindedBeaconBlock = serde_json::from_value(json!({
            "message": {
                "slot": "1",
                "parent_root": B256::with_last_byte(1),
                "state_root": B256::with_last_byte(3),
                "body": "{\"execution_payload_header\": {}}",
            },
            "signature": "0x02",
        }))
        .unwrap();

        assert!(block.message.body.is_string());
        assert_eq!(block.signature, Bytes::from_static(&[2]));
    }
}

use alloy_primitives::{
    Address,
    B256,
};
use alloy_rpc_types_engine::{
    PayloadAttributes,
    PayloadId,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};

/// Payload attributes as submitted with `engine_forkchoiceUpdatedV1`.
///
/// V1 callers name the randomness field `random`; later ones use `prevRandao`. Withdrawals
/// do not take part in the build id and are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkchoiceAttributes {
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    #[serde(alias = "random")]
    pub prev_randao: B256,
    pub suggested_fee_recipient: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_beacon_block_root: Option<B256>,
}

impl From<ForkchoiceAttributes> for PayloadAttributes {
    fn from(attributes: ForkchoiceAttributes) -> Self {
        PayloadAttributes {
            timestamp: attributes.timestamp,
            prev_randao: attributes.prev_randao,
            suggested_fee_recipient: attributes.suggested_fee_recipient,
            withdrawals: None,
            parent_beacon_block_root: attributes.parent_beacon_block_root,
        }
    }
}

/// Derives the 8-byte build identifier handed back from a forkchoice update.
///
/// The identifier is the sha256 of the head block hash and the payload attributes,
/// truncated to 8 bytes, so the same build request always yields the same id.
pub fn derive_build_id(head: &B256, attributes: Option<&PayloadAttributes>) -> PayloadId {
    let mut hasher = Sha256::new();
    hasher.update(head);
    if let Some(attributes) = attributes {
        hasher.update(attributes.timestamp.to_be_bytes());
        hasher.update(attributes.prev_randao);
        hasher.update(attributes.suggested_fee_recipient);
        if let Some(parent_beacon_block_root) = attributes.parent_beacon_block_root {
            hasher.update(parent_beacon_block_root);
        }
    }
    let out = hasher.finalize();

    let mut id = [0u8; 8];
    id.copy_from_slice(&out[..8]);
    PayloadId::new(id)
}

/// Parses a caller-supplied build identifier.
///
/// Accepts hex with or without `0x`, odd lengths included, of at most 8 bytes. Shorter
/// values are left padded, so `0x1` and `0x01` name the same build.
pub fn parse_build_id(raw: &str) -> Option<PayloadId> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }

    let padded = format!("{digits:0>16}");
    let mut id = [0u8; 8];
    hex::decode_to_slice(padded, &mut id).ok()?;
    Some(PayloadId::new(id))
}

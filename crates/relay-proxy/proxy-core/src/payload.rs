use alloy_primitives::{
    Address,
    B256,
    Bloom,
    Bytes,
    U256,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

use crate::transactions_root::{
    TransactionsRootError,
    transactions_root,
};

/// Execution payload as exchanged with relays.
///
/// A relay answers `relay_getPayloadHeaderV1` with the full record, transactions included.
/// The proxy hands the caller a blinded copy (`transactions` omitted, `transactionsRoot`
/// filled) and keeps the full record until the matching blinded block is proposed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPayloadWithTxRoot {
    pub parent_hash: B256,
    pub fee_recipient: Address,
    pub state_root: B256,
    pub receipts_root: B256,
    pub logs_bloom: Bloom,
    #[serde(alias = "random")]
    pub prev_randao: B256,
    #[serde(with = "alloy_serde::quantity")]
    pub block_number: u64,
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
    #[serde(with = "alloy_serde::quantity")]
    pub gas_used: u64,
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    pub extra_data: Bytes,
    pub base_fee_per_gas: U256,
    pub block_hash: B256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Bytes>>,
    #[serde(default)]
    pub transactions_root: B256,
    /// Value the relay pays the proposer's fee recipient on top of the block reward.
    #[serde(default)]
    pub fee_recipient_diff: U256,
}

impl ExecutionPayloadWithTxRoot {
    /// Key under which this payload is cached between header and proposal.
    pub fn commitment_key(&self) -> CommitmentKey {
        CommitmentKey {
            block_hash: self.block_hash,
            parent_hash: self.parent_hash,
            state_root: self.state_root,
        }
    }

    /// Fills `transactions_root` from the carried transactions. A payload without a
    /// transaction list keeps the root it arrived with.
    pub fn with_transactions_root(mut self) -> Result<Self, TransactionsRootError> {
        if let Some(transactions) = &self.transactions {
            self.transactions_root = transactions_root(transactions)?;
        }
        Ok(self)
    }

    /// Copy of this payload with the transaction content stripped.
    pub fn blinded(&self) -> Self {
        Self {
            transactions: None,
            ..self.clone()
        }
    }
}

/// Identifies a cached payload by the hashes a proposer commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitmentKey {
    pub block_hash: B256,
    pub parent_hash: B256,
    pub state_root: B256,
}

impl fmt::Display for CommitmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block_hash={} parent_hash={} state_root={}",
            self.block_hash, self.parent_hash, self.state_root
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{
        b256,
        bytes,
    };
    use serde_json::json;

    fn payload() -> ExecutionPayloadWithTxRoot {
        ExecutionPayloadWithTxRoot {
            block_hash: b256!("0000000000000000000000000000000000000000000000000000000000000001"),
            state_root: b256!("0000000000000000000000000000000000000000000000000000000000000003"),
            base_fee_per_gas: U256::from(4),
            transactions: Some(vec![bytes!("02f87201")]),
            ..Default::default()
        }
    }

    #[test]
    fn blinded_copy_omits_transactions_field() {
        let full = payload().with_transactions_root().unwrap();
        let value = serde_json::to_value(full.blinded()).unwrap();

        assert!(value.get("transactions").is_none());
        assert_eq!(
            value["transactionsRoot"],
            json!(full.transactions_root.to_string())
        );
        assert_eq!(value["baseFeePerGas"], json!("0x4"));
    }

    #[test]
    fn missing_transactions_keep_relay_root() {
        let mut header = payload();
        header.transactions = None;
        header.transactions_root = B256::with_last_byte(2);
        let header = header.with_transactions_root().unwrap();

        assert_eq!(header.transactions, None);
        assert_eq!(header.transactions_root, B256::with_last_byte(2));
    }

    #[test]
    fn empty_transactions_commit_to_empty_list() {
        let mut payload = payload();
        payload.transactions = Some(vec![]);
        let payload = payload.with_transactions_root().unwrap();

        assert_eq!(
            payload.transactions_root,
            b256!("7ffe241ea60187fdb0187bfa22de35d1f9bed7ab061d9401fd47e34a54fbede1")
        );
    }

    #[test]
    fn accepts_legacy_random_field() {
        let mut value = serde_json::to_value(payload()).unwrap();
        let object = value.as_object_mut().unwrap();
        let randao = object.remove("prevRandao").unwrap();
        object.insert("random".to_string(), randao);

        let decoded: ExecutionPayloadWithTxRoot = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, payload());
    }

    #[test]
    fn commitment_key_uses_identifying_hashes() {
        let key = payload().commitment_key();
        assert_eq!(key.block_hash, payload().block_hash);
        assert_eq!(key.parent_hash, B256::ZERO);
        assert_eq!(key.state_root, payload().state_root);

        let mut other = payload();
        other.base_fee_per_gas = U256::from(5);
        assert_eq!(other.commitment_key(), key);
    }
}

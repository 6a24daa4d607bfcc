//! SSZ `hash_tree_root` of an execution payload's transaction list.
//!
//! The list is typed `List[ByteList[MAX_BYTES_PER_TRANSACTION], MAX_TRANSACTIONS_PER_PAYLOAD]`
//! and is hashed with SHA-256, exactly like the `transactions_root` of a consensus-layer
//! execution payload header. The root is order sensitive and depends on nothing but the
//! transaction bytes.

use std::sync::LazyLock;

use alloy_primitives::{
    B256,
    Bytes,
};
use sha2::{
    Digest,
    Sha256,
};

/// Maximum number of transactions in one payload (`2^20`).
pub const MAX_TRANSACTIONS_PER_PAYLOAD: usize = 1 << 20;

/// Maximum size of one opaque transaction (`2^30` bytes).
pub const MAX_BYTES_PER_TRANSACTION: usize = 1 << 30;

const BYTES_PER_CHUNK: usize = 32;

/// Tree depth of the transaction list, `log2(MAX_TRANSACTIONS_PER_PAYLOAD)`.
const TRANSACTIONS_DEPTH: usize = 20;

/// Tree depth of a single transaction's chunks, `log2(MAX_BYTES_PER_TRANSACTION / 32)`.
const TRANSACTION_CHUNKS_DEPTH: usize = 25;

const MAX_DEPTH: usize = TRANSACTION_CHUNKS_DEPTH;

static ZERO_HASHES: LazyLock<[B256; MAX_DEPTH + 1]> = LazyLock::new(|| {
    let mut hashes = [B256::ZERO; MAX_DEPTH + 1];
    for depth in 0..MAX_DEPTH {
        hashes[depth + 1] = hash_pair(&hashes[depth], &hashes[depth]);
    }
    hashes
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionsRootError {
    #[error("payload carries {0} transactions, limit is {MAX_TRANSACTIONS_PER_PAYLOAD}")]
    TooManyTransactions(usize),
    #[error("transaction {index} is {len} bytes, limit is {MAX_BYTES_PER_TRANSACTION}")]
    TransactionTooLarge { index: usize, len: usize },
}

/// Computes the commitment over an ordered list of opaque transactions.
pub fn transactions_root(transactions: &[Bytes]) -> Result<B256, TransactionsRootError> {
    if transactions.len() > MAX_TRANSACTIONS_PER_PAYLOAD {
        return Err(TransactionsRootError::TooManyTransactions(
            transactions.len(),
        ));
    }

    let leaves = transactions
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            if tx.len() > MAX_BYTES_PER_TRANSACTION {
                return Err(TransactionsRootError::TransactionTooLarge {
                    index,
                    len: tx.len(),
                });
            }
            Ok(transaction_root(tx))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let root = merkleize(leaves, TRANSACTIONS_DEPTH);
    Ok(mix_in_length(&root, transactions.len()))
}

fn transaction_root(tx: &[u8]) -> B256 {
    let chunks = tx
        .chunks(BYTES_PER_CHUNK)
        .map(|chunk| {
            let mut padded = B256::ZERO;
            padded[..chunk.len()].copy_from_slice(chunk);
            padded
        })
        .collect();

    let root = merkleize(chunks, TRANSACTION_CHUNKS_DEPTH);
    mix_in_length(&root, tx.len())
}

/// Merkleizes `chunks` into a tree of the given depth, padding with zero subtrees.
/// Callers guarantee `chunks.len() <= 2^depth`.
fn merkleize(chunks: Vec<B256>, depth: usize) -> B256 {
    if chunks.is_empty() {
        return ZERO_HASHES[depth];
    }

    let mut layer = chunks;
    for level in 0..depth {
        layer = layer
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&ZERO_HASHES[level]);
                hash_pair(&pair[0], right)
            })
            .collect();
    }
    layer[0]
}

fn mix_in_length(root: &B256, len: usize) -> B256 {
    let mut length = B256::ZERO;
    length[..8].copy_from_slice(&(len as u64).to_le_bytes());
    hash_pair(root, &length)
}

fn hash_pair(left: &B256, right: &B256) -> B256 {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    B256::from_slice(&hasher.finalize())
}

//! Recovers the full payload behind a signed blinded block.
//!
//! The blinded block body embeds the execution payload header the proposer committed to.
//! Its key is spelled either `execution_payload_header` or `executionPayloadHeader`; both
//! are tried in that order and nothing else is accepted. The header's hashes locate the
//! payload cached when the header was issued. The store is only read here.

use std::sync::Arc;

use relay_proxy_core::{
    CommittedHeader,
    EXECUTION_PAYLOAD_HEADER_KEYS,
    SignedBlindedBeaconBlock,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{
        ProxyError,
        Result,
    },
    store::{
        CachedPayload,
        Store,
    },
};

/// Looks up the cached payload a blinded block commits to.
pub fn reconcile(store: &Store, block: &SignedBlindedBeaconBlock) -> Result<Arc<CachedPayload>> {
    let header = extract_committed_header(&block.message.body)?;
    let key = header.commitment_key();

    let Some(cached) = store.get_execution_payload(&key) else {
        metrics::counter!("relay_proxy_cache_misses_total").increment(1);
        tracing::warn!(target: "reconciler", commitment = %key, "No cached payload for committed header");
        return Err(ProxyError::CommitmentNotFound(key));
    };
    metrics::counter!("relay_proxy_cache_hits_total").increment(1);

    if let Some(committed) = header.transactions_root {
        let cached_root = cached.payload.transactions_root;
        if committed != cached_root {
            tracing::warn!(target: "reconciler", commitment = %key, %cached_root, %committed, "Committed transactions root differs from cached payload");
            return Err(ProxyError::CommitmentMismatch {
                key,
                cached: cached_root,
                committed,
            });
        }
    }

    tracing::debug!(target: "reconciler", commitment = %key, relay = %cached.relay, "Reconciled blinded block");
    Ok(cached)
}

/// Pulls the committed header out of an opaque block body.
///
/// The body may be a JSON object or a string holding JSON text.
pub fn extract_committed_header(body: &Value) -> Result<CommittedHeader> {
    let parsed;
    let body = match body {
        Value::String(text) => {
            parsed = serde_json::from_str::<Value>(text).map_err(|err| {
                ProxyError::InvalidParams(format!("blinded block body is not JSON: {err}"))
            })?;
            &parsed
        }
        other => other,
    };

    let mut failures = Vec::with_capacity(EXECUTION_PAYLOAD_HEADER_KEYS.len());
    for key in EXECUTION_PAYLOAD_HEADER_KEYS {
        match body.get(key) {
            Some(header) => match CommittedHeader::deserialize(header) {
                Ok(header) => return Ok(header),
                Err(err) => failures.push(format!("{key}: {err}")),
            },
            None => failures.push(format!("{key}: missing")),
        }
    }

    Err(ProxyError::InvalidParams(format!(
        "blinded block body carries no execution payload header ({})",
        failures.join(", ")
    )))
}

//! In-process correlation and payload cache.
//!
//! Holds two tables: forkchoice bindings (which relay and build id a session uses) and
//! full payloads keyed by the commitment a proposer will later sign. Every table is a
//! bounded [`moka`] cache, so entries disappear after a TTL or when capacity is reached.

use std::{
    sync::Arc,
    time::Duration,
};

use alloy_primitives::B256;
use moka::sync::Cache;
use relay_proxy_core::{
    CommitmentKey,
    ExecutionPayloadWithTxRoot,
    PayloadId,
};
use url::Url;

/// Which relay and build id a session is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkchoiceBinding {
    pub session_key: B256,
    pub relay: Url,
    pub build_id: PayloadId,
}

/// Lookup key for a [`ForkchoiceBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKey {
    Session(B256),
    Build(PayloadId),
}

/// Full payload retained between header and proposal, along with the relay that built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub payload: ExecutionPayloadWithTxRoot,
    pub relay: Url,
}

/// What happens when a payload is cached under a key that already holds one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictPolicy {
    /// Last writer wins.
    Overwrite,
    /// Keep the first payload; a later one with a different transactions root fails.
    #[default]
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error(
        "payload for {key} already cached with transactions root {cached}, refusing {incoming}"
    )]
    Conflict {
        key: CommitmentKey,
        cached: B256,
        incoming: B256,
    },
}

/// Configuration for store eviction and write conflicts.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum entries per table.
    pub max_entries: u64,
    /// Time after insertion at which an entry is evicted.
    pub ttl: Duration,
    pub conflict_policy: ConflictPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            // two epochs of 12s slots
            ttl: Duration::from_secs(384),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct Store {
    bindings: Cache<B256, ForkchoiceBinding>,
    /// build id -> session key of the binding that issued it
    build_ids: Cache<PayloadId, B256>,
    payloads: Cache<CommitmentKey, Arc<CachedPayload>>,
    conflict_policy: ConflictPolicy,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            bindings: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build(),
            build_ids: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build(),
            payloads: Cache::builder()
                .max_capacity(config.max_entries)
                .time_to_live(config.ttl)
                .build(),
            conflict_policy: config.conflict_policy,
        }
    }

    /// Binds a session to a relay and build id, replacing any earlier binding.
    pub fn set_forkchoice_response(&self, session_key: B256, relay: Url, build_id: PayloadId) {
        self.build_ids.insert(build_id, session_key);
        self.bindings.insert(
            session_key,
            ForkchoiceBinding {
                session_key,
                relay,
                build_id,
            },
        );
        tracing::trace!(%session_key, %build_id, "Stored forkchoice binding");
    }

    /// Looks up a binding by session key or by the build id it issued. A build id whose
    /// session has since been rebound resolves to `None`.
    pub fn get_forkchoice_response(&self, key: BindingKey) -> Option<ForkchoiceBinding> {
        match key {
            BindingKey::Session(session_key) => self.bindings.get(&session_key),
            BindingKey::Build(build_id) => {
                let session_key = self.build_ids.get(&build_id)?;
                self.bindings
                    .get(&session_key)
                    .filter(|binding| binding.build_id == build_id)
            }
        }
    }

    /// Caches a full payload under its commitment key, subject to the conflict policy.
    pub fn set_execution_payload(
        &self,
        key: CommitmentKey,
        cached: CachedPayload,
    ) -> Result<(), StoreError> {
        match self.conflict_policy {
            ConflictPolicy::Overwrite => {
                self.payloads.insert(key, Arc::new(cached));
                metrics::gauge!("relay_proxy_cached_payloads").set(self.payloads.entry_count() as f64);
                Ok(())
            }
            ConflictPolicy::Reject => {
                let incoming = cached.payload.transactions_root;
                let entry = self
                    .payloads
                    .entry(key)
                    .or_insert_with(|| Arc::new(cached));

                if entry.is_fresh() {
                    metrics::gauge!("relay_proxy_cached_payloads").set(self.payloads.entry_count() as f64);
                    return Ok(());
                }

                let existing = entry.value().payload.transactions_root;
                if existing == incoming {
                    return Ok(());
                }
                Err(StoreError::Conflict {
                    key,
                    cached: existing,
                    incoming,
                })
            }
        }
    }

    pub fn get_execution_payload(&self, key: &CommitmentKey) -> Option<Arc<CachedPayload>> {
        self.payloads.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{
        Bytes,
        bytes,
    };

    fn relay(port: u16) -> Url {
        Url::parse(&format!("http://127.0.0.1:{port}")).unwrap()
    }

    fn cached(transactions: Vec<Bytes>) -> CachedPayload {
        let payload = ExecutionPayloadWithTxRoot {
            block_hash: B256::with_last_byte(1),
            state_root: B256::with_last_byte(3),
            transactions: Some(transactions),
            ..Default::default()
        }
        .with_transactions_root()
        .unwrap();

        CachedPayload {
            payload,
            relay: relay(1),
        }
    }

    #[test]
    fn test_binding_lookup_by_session_and_build_id() {
        let store = Store::default();
        let session = B256::with_last_byte(9);
        let build_id = PayloadId::new([0, 0, 0, 0, 0, 0, 0, 1]);

        assert!(store.get_forkchoice_response(BindingKey::Session(session)).is_none());

        store.set_forkchoice_response(session, relay(1), build_id);

        let by_session = store
            .get_forkchoice_response(BindingKey::Session(session))
            .unwrap();
        let by_build = store
            .get_forkchoice_response(BindingKey::Build(build_id))
            .unwrap();
        assert_eq!(by_session, by_build);
        assert_eq!(by_build.relay, relay(1));
    }

    #[test]
    fn test_binding_last_writer_wins() {
        let store = Store::default();
        let session = B256::with_last_byte(9);
        let first = PayloadId::new([1; 8]);
        let second = PayloadId::new([2; 8]);

        store.set_forkchoice_response(session, relay(1), first);
        store.set_forkchoice_response(session, relay(2), second);

        let binding = store
            .get_forkchoice_response(BindingKey::Session(session))
            .unwrap();
        assert_eq!(binding.relay, relay(2));
        assert_eq!(binding.build_id, second);
        // the superseded build id no longer resolves
        assert!(store.get_forkchoice_response(BindingKey::Build(first)).is_none());
    }

    #[test]
    fn test_payload_roundtrip() {
        let store = Store::default();
        let entry = cached(vec![bytes!("01")]);
        let key = entry.payload.commitment_key();

        assert!(store.get_execution_payload(&key).is_none());
        store.set_execution_payload(key, entry.clone()).unwrap();
        assert_eq!(*store.get_execution_payload(&key).unwrap(), entry);
    }

    #[test]
    fn test_reject_policy_keeps_first_payload() {
        let store = Store::new(StoreConfig {
            conflict_policy: ConflictPolicy::Reject,
            ..Default::default()
        });
        let first = cached(vec![bytes!("01")]);
        let key = first.payload.commitment_key();

        store.set_execution_payload(key, first.clone()).unwrap();
        // identical content is accepted
        store.set_execution_payload(key, first.clone()).unwrap();

        let err = store
            .set_execution_payload(key, cached(vec![bytes!("02")]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(*store.get_execution_payload(&key).unwrap(), first);
    }

    #[test]
    fn test_overwrite_policy_replaces_payload() {
        let store = Store::new(StoreConfig {
            conflict_policy: ConflictPolicy::Overwrite,
            ..Default::default()
        });
        let first = cached(vec![bytes!("01")]);
        let second = cached(vec![bytes!("02")]);
        let key = first.payload.commitment_key();

        store.set_execution_payload(key, first).unwrap();
        store.set_execution_payload(key, second.clone()).unwrap();
        assert_eq!(*store.get_execution_payload(&key).unwrap(), second);
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let store = Store::new(StoreConfig {
            ttl: Duration::from_millis(50),
            ..Default::default()
        });
        let entry = cached(vec![]);
        let key = entry.payload.commitment_key();
        store.set_execution_payload(key, entry).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert!(store.get_execution_payload(&key).is_none());
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(Store::default());
        let handles: Vec<_> = (0u8..16)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let session = B256::with_last_byte(i);
                    store.set_forkchoice_response(session, relay(1), PayloadId::new([i; 8]));
                    let mut entry = cached(vec![Bytes::from(vec![i])]);
                    entry.payload.block_hash = B256::with_last_byte(i);
                    store
                        .set_execution_payload(entry.payload.commitment_key(), entry)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0u8..16 {
            assert!(store
                .get_forkchoice_response(BindingKey::Build(PayloadId::new([i; 8])))
                .is_some());
        }
    }
}

use std::{
    fmt::Debug,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
};

use alloy_primitives::B256;
use url::Url;

/// Picks the relay a new build session is bound to. Once chosen, the binding is sticky
/// for the session; the selector is only consulted on forkchoice updates.
pub trait RelaySelector: Send + Sync + Debug {
    /// Returns an index into `relays`, which is never empty.
    fn select_relay(&self, session_key: &B256, relays: &[Url]) -> usize;
}

/// Deterministic choice from the session key, so repeated updates for one head agree.
#[derive(Debug, Default)]
pub struct HashRelaySelector;

impl RelaySelector for HashRelaySelector {
    fn select_relay(&self, session_key: &B256, relays: &[Url]) -> usize {
        if relays.len() <= 1 {
            return 0;
        }
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&session_key[..8]);
        (u64::from_be_bytes(prefix) % relays.len() as u64) as usize
    }
}

/// Cycles through relays in configuration order.
#[derive(Debug, Default)]
pub struct RoundRobinRelaySelector {
    next: AtomicUsize,
}

impl RelaySelector for RoundRobinRelaySelector {
    fn select_relay(&self, _session_key: &B256, relays: &[Url]) -> usize {
        if relays.len() <= 1 {
            return 0;
        }
        self.next.fetch_add(1, Ordering::Relaxed) % relays.len()
    }
}

/// Selection strategies exposed on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RelaySelection {
    #[default]
    Hash,
    RoundRobin,
}

impl RelaySelection {
    pub fn into_selector(self) -> Box<dyn RelaySelector> {
        match self {
            RelaySelection::Hash => Box::new(HashRelaySelector),
            RelaySelection::RoundRobin => Box::new(RoundRobinRelaySelector::default()),
        }
    }
}

use std::{
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;

use crate::{
    router::RouterBuilder,
    selection::RelaySelection,
    server::ProxyServer,
    store::{
        ConflictPolicy,
        Store,
        StoreConfig,
    },
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Builder API relay proxy", long_about = None)]
pub struct Config {
    /// Relay endpoints, comma separated. The first one is the fallback relay.
    #[arg(long, env = "RELAY_PROXY_RELAY_URLS", value_delimiter = ',', required = true)]
    pub relay_urls: Vec<String>,
    /// Api server address
    #[arg(long, env = "RELAY_PROXY_LISTEN_ADDR", default_value = "0.0.0.0:18550")]
    pub listen_addr: SocketAddr,
    /// Timeout for a single relay call, in milliseconds
    #[arg(long, env = "RELAY_PROXY_RELAY_TIMEOUT_MS", default_value = "2000")]
    pub relay_timeout_ms: u64,
    /// Maximum entries per cache table
    #[arg(long, env = "RELAY_PROXY_CACHE_MAX_ENTRIES", default_value = "10000")]
    pub cache_max_entries: u64,
    /// Seconds a cached binding or payload is kept
    #[arg(long, env = "RELAY_PROXY_CACHE_TTL_SECS", default_value = "384")]
    pub cache_ttl_secs: u64,
    /// What to do when a payload is cached twice under one commitment
    #[arg(long, env = "RELAY_PROXY_CONFLICT_POLICY", value_enum, default_value_t = ConflictPolicy::Reject)]
    pub conflict_policy: ConflictPolicy,
    /// How a new session picks its relay
    #[arg(long, env = "RELAY_PROXY_RELAY_SELECTION", value_enum, default_value_t = RelaySelection::Hash)]
    pub relay_selection: RelaySelection,
    /// Log level
    #[arg(long, env = "RELAY_PROXY_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

impl Config {
    /// Build the relay proxy server
    pub async fn build(self) -> anyhow::Result<ProxyServer> {
        let store = Arc::new(Store::new(StoreConfig {
            max_entries: self.cache_max_entries,
            ttl: Duration::from_secs(self.cache_ttl_secs),
            conflict_policy: self.conflict_policy,
        }));

        let router = RouterBuilder::new(self.relay_urls.as_slice(), store)
            .relay_timeout(Duration::from_millis(self.relay_timeout_ms))
            .selector(self.relay_selection.into_selector())
            .build()?;

        // Bind to an address
        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!(listen_addr = ?listener.local_addr()?, "Listening on address");

        Ok(ProxyServer {
            listener,
            router: Arc::new(router),
        })
    }
}

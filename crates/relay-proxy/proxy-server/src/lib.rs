#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::unreadable_literal)]

pub mod api;
mod config;
pub mod error;
pub mod reconciler;
pub mod router;
pub mod selection;
mod server;
pub mod store;

pub use config::Config;
pub use error::ProxyError;
pub use router::{
    Router,
    RouterBuilder,
};
pub use server::ProxyServer;
pub use store::{
    ConflictPolicy,
    Store,
    StoreConfig,
};

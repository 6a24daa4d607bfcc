//! # `api`
//!
//! HTTP surface of the relay proxy. Every POST body is a JSON-RPC 2.0 request handled by
//! the [`Router`](crate::router::Router); `GET /health` answers `ok`.
//!
//! ## JSON-RPC Methods
//!
//! ### `engine_forkchoiceUpdatedV1`
//!
//! Binds the session named by the head block hash to a relay and returns a build id.
//! Answered locally.
//!
//! ```json
//! {
//!     "jsonrpc": "2.0",
//!     "method": "engine_forkchoiceUpdatedV1",
//!     "params": [{"headBlockHash": "0x..", "safeBlockHash": "0x..", "finalizedBlockHash": "0x.."}, null],
//!     "id": 1
//! }
//! ```
//!
//! ### `builder_getPayloadHeaderV1`
//!
//! Forwards to `relay_getPayloadHeaderV1`, caches the full payload and returns it without
//! transactions but with `transactionsRoot` filled in.
//!
//! ```json
//! {
//!     "jsonrpc": "2.0",
//!     "method": "builder_getPayloadHeaderV1",
//!     "params": ["0x0123456789abcdef"],
//!     "id": 1
//! }
//! ```
//!
//! ### `builder_proposeBlindedBlockV1`
//!
//! Forwards the signed blinded block to `relay_proposeBlindedBlockV1` and returns the
//! cached full payload it commits to.
//!
//! ## Error Codes
//!
//! - -32700: Body is not JSON
//! - -32600: Malformed JSON-RPC envelope
//! - -32601: Method not found
//! - -32602: Invalid parameters
//! - -32000: Relay failure, missing or mismatched commitment

pub mod accept;
pub mod json_rpc;

use std::{
    net::SocketAddr,
    sync::Arc,
};

use anyhow::Result;
use hyper_util::rt::TokioIo;
use tokio::net::{
    TcpListener,
    TcpStream,
};
use tokio_util::sync::CancellationToken;

use crate::router::Router;

/// Start the API server
pub async fn serve(
    listener: TcpListener,
    router: Arc<Router>,
    cancel_token: CancellationToken,
) -> Result<()> {
    // We start a loop to continuously accept incoming connections
    loop {
        tokio::select! {
                () = cancel_token.cancelled() => {
                    tracing::info!("Api received cancellation signal, shutting down...");
                    break;
                }
                res = listener.accept() => {
                    match res {
                        Ok((stream, socketaddr)) => {
                            serve_connection(socketaddr, router.clone(), stream);
                        }
                        Err(err) => {
                            tracing::error!(?err, "Error accepting connection");
                        }
                    }
                }
        }
    }

    Ok(())
}

fn serve_connection(socketaddr: SocketAddr, router: Arc<Router>, stream: TcpStream) {
    tracing::debug!("Connection from: {}", socketaddr);

    // Use an adapter to access something implementing `tokio::io` traits as if they implement
    // `hyper::rt` IO traits.
    let io = TokioIo::new(stream);

    // Spawn a tokio task to serve multiple connections concurrently
    tokio::task::spawn(async move {
        crate::accept!(io, router, socketaddr);
    });
}

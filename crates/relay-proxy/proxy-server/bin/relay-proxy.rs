use relay_proxy_server::Config;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{
    EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::builder()
        .with_default_directive(config.log_level.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = config.build().await?;
    let cancellation_token = CancellationToken::new();

    let mut boxed_server_future = Box::pin(server.run(cancellation_token.clone()));

    tokio::select! {
        result = &mut boxed_server_future => {
           handle_server_result(result);
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C signal, initiating graceful shutdown");
            cancellation_token.cancel();
            handle_server_result(boxed_server_future.await);
        }
    }

    Ok(())
}

/// Handle the result of the server
fn handle_server_result(result: Result<()>) {
    match result {
        Ok(()) => tracing::info!("Server shutdown gracefully"),
        Err(e) => {
            tracing::error!("Server encountered an error: {}", e);
        }
    }
}

use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::router::Router;

pub struct ProxyServer {
    pub listener: TcpListener,
    pub router: Arc<Router>,
}

impl ProxyServer {
    /// Run the server until the cancellation token is cancelled.
    pub async fn run(self, cancel_token: CancellationToken) -> Result<()> {
        tracing::info!(
            relays = ?self.router.relays().iter().map(url::Url::as_str).collect::<Vec<_>>(),
            "Started API server"
        );

        if let Err(e) = crate::api::serve(self.listener, self.router, cancel_token).await {
            metrics::counter!("relay_proxy_api_server_errors_total").increment(1);
            tracing::error!("API server encountered an error: {:?}", e);
            return Err(e);
        }
        tracing::info!("Api stopped.");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn test_server_cancellation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let router = Router::new(&["http://127.0.0.1:1"], Arc::new(Store::default())).unwrap();

        let server = ProxyServer {
            listener,
            router: Arc::new(router),
        };

        // Create cancellation token and clone for later cancellation
        let cancel_token = CancellationToken::new();
        let cancel_token_clone = cancel_token.clone();

        // Run server in background task
        let server_handle = tokio::spawn(async move {
            server.run(cancel_token).await.unwrap();
        });

        // Wait briefly to ensure server is running
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        // Cancel the server
        cancel_token_clone.cancel();

        // Server should shutdown gracefully
        server_handle.await.unwrap();
    }
}

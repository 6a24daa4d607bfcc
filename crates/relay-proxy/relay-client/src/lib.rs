use std::time::Duration;

use reqwest::{
    Client,
    StatusCode,
};
use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::Value;
use url::Url;

use relay_proxy_core::{
    BUILDER_GET_PAYLOAD_HEADER_V1,
    BUILDER_PROPOSE_BLINDED_BLOCK_V1,
    RELAY_GET_PAYLOAD_HEADER_V1,
    RELAY_PROPOSE_BLINDED_BLOCK_V1,
};

/// Request id sent with every relay call. Each call is a standalone HTTP exchange, so
/// responses never need to be told apart.
pub const RELAY_REQUEST_ID: u64 = 1;

/// Default bound on a whole relay call, connect included.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(2);

/// A client for forwarding JSON-RPC calls to block-building relays.
///
/// The client is not bound to a relay; every call names its target, so one instance is
/// shared by all sessions regardless of which relay they are pinned to.
///
/// ``` no_run
/// use relay_proxy_client::RelayClient;
/// use serde_json::Value;
///
/// #[tokio::main]
/// async fn main() {
///     let client = RelayClient::new(std::time::Duration::from_secs(2)).unwrap();
///     let relay = "http://localhost:28545".parse().unwrap();
///     let header: Value = client
///         .forward(&relay, "builder_getPayloadHeaderV1", &["0x01"])
///         .await
///         .unwrap();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: Client,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    #[error("relay unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),
    #[error("relay HTTP error: status {status}")]
    Http { status: StatusCode },
    #[error("relay error code {code}: {message}")]
    Application { code: i64, message: String },
    #[error("relay response malformed: {0}")]
    Malformed(String),
    #[error("no relay-side method for {0}")]
    UnsupportedMethod(String),
    #[error("HTTP client error: {0}")]
    Build(#[source] reqwest::Error),
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: u64,
}

/// JSON-RPC response envelope as returned by a relay
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Relay-side name of an inbound method, if the method is ever forwarded.
pub fn relay_method(inbound: &str) -> Option<&'static str> {
    match inbound {
        BUILDER_GET_PAYLOAD_HEADER_V1 => Some(RELAY_GET_PAYLOAD_HEADER_V1),
        BUILDER_PROPOSE_BLINDED_BLOCK_V1 => Some(RELAY_PROPOSE_BLINDED_BLOCK_V1),
        _ => None,
    }
}

impl RelayClient {
    /// Create a new relay client whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, RelayClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(RelayClientError::Build)?;

        Ok(Self { client })
    }

    /// Renames `inbound_method` to its relay-side counterpart and calls `relay` with it.
    pub async fn forward<P, R>(
        &self,
        relay: &Url,
        inbound_method: &str,
        params: P,
    ) -> Result<R, RelayClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let method = relay_method(inbound_method)
            .ok_or_else(|| RelayClientError::UnsupportedMethod(inbound_method.to_string()))?;
        self.call(relay, method, params).await
    }

    /// Make one JSON-RPC call against `relay`.
    pub async fn call<P, R>(&self, relay: &Url, method: &str, params: P) -> Result<R, RelayClientError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: RELAY_REQUEST_ID,
        };

        tracing::debug!(target: "relay_client", %relay, %method, "Calling relay");

        let response = self
            .client
            .post(relay.clone())
            .json(&request)
            .send()
            .await
            .map_err(RelayClientError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "relay_client", %relay, %method, %status, "Relay answered with HTTP error");
            return Err(RelayClientError::Http { status });
        }

        let body = response
            .bytes()
            .await
            .map_err(RelayClientError::Unreachable)?;
        let envelope: JsonRpcResponse = serde_json::from_slice(&body)
            .map_err(|err| RelayClientError::Malformed(err.to_string()))?;

        // Validate JSON-RPC 2.0 compliance
        if envelope.jsonrpc != "2.0" {
            return Err(RelayClientError::Malformed(format!(
                "invalid JSON-RPC version: expected '2.0', got '{}'",
                envelope.jsonrpc
            )));
        }

        if let Some(error) = envelope.error {
            tracing::warn!(target: "relay_client", %relay, %method, code = error.code, message = %error.message, "Relay returned JSON-RPC error");
            return Err(RelayClientError::Application {
                code: error.code,
                message: error.message,
            });
        }

        serde_json::from_value(envelope.result)
            .map_err(|err| RelayClientError::Malformed(format!("unexpected result: {err}")))
    }
}

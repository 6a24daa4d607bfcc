//! JSON-RPC dispatch and relay binding policy.

use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};

use metrics::{
    counter,
    histogram,
};
use relay_proxy_client::{
    DEFAULT_RELAY_TIMEOUT,
    RelayClient,
};
use relay_proxy_core::{
    BUILDER_GET_PAYLOAD_HEADER_V1,
    BUILDER_PROPOSE_BLINDED_BLOCK_V1,
    ENGINE_FORKCHOICE_UPDATED_V1,
    ExecutionPayloadWithTxRoot,
    ForkchoiceAttributes,
    ForkchoiceState,
    ForkchoiceUpdated,
    PayloadAttributes,
    PayloadStatusEnum,
    SignedBlindedBeaconBlock,
    derive_build_id,
    parse_build_id,
};
use serde_json::Value;
use tracing::{
    debug,
    info,
    warn,
};
use url::Url;
use uuid::Uuid;

use crate::{
    api::json_rpc::{
        JsonRpcErrorCode,
        JsonRpcRequest,
        MAX_JSON_SIZE,
        rpc_error,
        rpc_response,
    },
    error::{
        ProxyError,
        Result,
    },
    reconciler::reconcile,
    selection::{
        HashRelaySelector,
        RelaySelector,
    },
    store::{
        BindingKey,
        CachedPayload,
        Store,
        StoreError,
    },
};

/// Builder for a [`Router`] with non-default relay timeout or selection strategy.
#[derive(Debug)]
pub struct RouterBuilder {
    relay_urls: Vec<String>,
    store: Arc<Store>,
    relay_timeout: Duration,
    selector: Box<dyn RelaySelector>,
}

impl RouterBuilder {
    pub fn new<S: AsRef<str>>(relay_urls: &[S], store: Arc<Store>) -> Self {
        Self {
            relay_urls: relay_urls.iter().map(|url| url.as_ref().to_string()).collect(),
            store,
            relay_timeout: DEFAULT_RELAY_TIMEOUT,
            selector: Box::new(HashRelaySelector),
        }
    }

    pub fn relay_timeout(mut self, timeout: Duration) -> Self {
        self.relay_timeout = timeout;
        self
    }

    pub fn selector(mut self, selector: Box<dyn RelaySelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Validates every relay endpoint and wires the router together.
    pub fn build(self) -> Result<Router> {
        if self.relay_urls.is_empty() {
            return Err(ProxyError::Configuration(
                "at least one relay URL is required".to_string(),
            ));
        }
        let relays = self
            .relay_urls
            .iter()
            .map(|raw| parse_relay_url(raw))
            .collect::<Result<Vec<_>>>()?;

        if self.relay_timeout.is_zero() {
            return Err(ProxyError::Configuration(
                "relay timeout must be greater than zero".to_string(),
            ));
        }
        let client = RelayClient::new(self.relay_timeout)
            .map_err(|err| ProxyError::Configuration(err.to_string()))?;

        Ok(Router {
            relays,
            store: self.store,
            client,
            selector: self.selector,
        })
    }
}

fn parse_relay_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(ProxyError::Configuration("relay URL is empty".to_string()));
    }
    let url = Url::parse(raw)
        .map_err(|err| ProxyError::Configuration(format!("invalid relay URL {raw:?}: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(ProxyError::Configuration(format!(
            "relay URL {raw:?} must be an absolute http(s) URL"
        )));
    }
    Ok(url)
}

/// Dispatches inbound JSON-RPC calls and owns the policy for which relay a session uses.
#[derive(Debug)]
pub struct Router {
    /// Never empty; the first entry is the fallback relay.
    relays: Vec<Url>,
    store: Arc<Store>,
    client: RelayClient,
    selector: Box<dyn RelaySelector>,
}

impl Router {
    /// Router with the default relay timeout and hash based relay selection.
    pub fn new<S: AsRef<str>>(relay_urls: &[S], store: Arc<Store>) -> Result<Self> {
        RouterBuilder::new(relay_urls, store).build()
    }

    pub fn relays(&self) -> &[Url] {
        &self.relays
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn default_relay(&self) -> &Url {
        &self.relays[0]
    }

    /// Handles one raw JSON-RPC request body and returns the response envelope.
    ///
    /// Never fails: every problem is reported as a JSON-RPC error object.
    #[tracing::instrument(level = "debug", skip_all, target = "api::handle", fields(request_id))]
    pub async fn handle(&self, body: &[u8]) -> String {
        // Generate unique request ID for correlation
        let request_id = Uuid::new_v4();
        tracing::Span::current().record("request_id", tracing::field::display(&request_id));

        if body.len() > MAX_JSON_SIZE {
            warn!(target: "json_rpc", %request_id, size = body.len(), "Request payload too large");
            return rpc_error(
                &Value::Null,
                JsonRpcErrorCode::InvalidRequest,
                "Request too large",
                &request_id,
            );
        }

        let json_value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "json_rpc", %request_id, error = %err, "Failed to parse JSON");
                return rpc_error(
                    &Value::Null,
                    JsonRpcErrorCode::ParseError,
                    "Parse error",
                    &request_id,
                );
            }
        };

        // echoed even when the rest of the envelope is unusable
        let json_rpc_id = json_value.get("id").cloned().unwrap_or(Value::Null);
        let request = match JsonRpcRequest::validate(json_value) {
            Ok(request) => request,
            Err(msg) => {
                warn!(target: "json_rpc", %request_id, error = msg, "Invalid JSON-RPC structure");
                let err = ProxyError::MalformedRequest(msg.to_string());
                return rpc_error(&json_rpc_id, err.code(), &err.to_string(), &request_id);
            }
        };

        let method = method_label(&request.method);
        counter!("relay_proxy_requests_total", "method" => method).increment(1);
        info!(
            target: "json_rpc",
            method = %request.method,
            %request_id,
            json_rpc_id = %request.id,
            "Received request"
        );

        let req_start = Instant::now();
        let result = self.dispatch(&request).await;
        histogram!("relay_proxy_request_duration_seconds", "method" => method)
            .record(req_start.elapsed().as_secs_f64());

        match result {
            Ok(value) => {
                info!(target: "json_rpc", method = %request.method, %request_id, json_rpc_id = %request.id, duration_ms = req_start.elapsed().as_millis(), "Request completed successfully");
                rpc_response(&request.id, value)
            }
            Err(err) => {
                counter!("relay_proxy_request_errors_total", "method" => method, "kind" => err.kind())
                    .increment(1);
                warn!(target: "json_rpc", method = %request.method, %request_id, json_rpc_id = %request.id, error = %err, kind = err.kind(), duration_ms = req_start.elapsed().as_millis(), "Request completed with error");
                rpc_error(&request.id, err.code(), &err.to_string(), &request_id)
            }
        }
    }

    async fn dispatch(&self, request: &JsonRpcRequest) -> Result<Value> {
        match request.method.as_str() {
            ENGINE_FORKCHOICE_UPDATED_V1 => Ok(serde_json::to_value(self.forkchoice_updated(request)?)?),
            BUILDER_GET_PAYLOAD_HEADER_V1 => {
                Ok(serde_json::to_value(self.get_payload_header(request).await?)?)
            }
            BUILDER_PROPOSE_BLINDED_BLOCK_V1 => {
                Ok(serde_json::to_value(self.propose_blinded_block(request).await?)?)
            }
            other => Err(ProxyError::UnknownMethod(other.to_string())),
        }
    }

    /// Binds the session named by the forkchoice head to a relay and hands back a build id.
    /// Answered from local state only.
    fn forkchoice_updated(&self, request: &JsonRpcRequest) -> Result<ForkchoiceUpdated> {
        let state: ForkchoiceState = request
            .deserialize_param(0)
            .map_err(ProxyError::InvalidParams)?;
        let attributes: Option<PayloadAttributes> = request
            .deserialize_optional_param::<ForkchoiceAttributes>(1)
            .map_err(ProxyError::InvalidParams)?
            .map(PayloadAttributes::from);

        let session_key = state.head_block_hash;
        let index = self.selector.select_relay(&session_key, &self.relays);
        let relay = self
            .relays
            .get(index)
            .unwrap_or_else(|| self.default_relay())
            .clone();
        let build_id = derive_build_id(&session_key, attributes.as_ref());

        debug!(target: "json_rpc", %session_key, %relay, %build_id, "Binding session to relay");
        self.store
            .set_forkchoice_response(session_key, relay, build_id);

        Ok(ForkchoiceUpdated::from_status(PayloadStatusEnum::Valid).with_payload_id(build_id))
    }

    /// Fetches the full payload from the session's relay, caches it and returns it blinded.
    ///
    /// The build id is opaque; one this proxy never issued goes to the default
    /// relay with the params untouched.
    async fn get_payload_header(&self, request: &JsonRpcRequest) -> Result<ExecutionPayloadWithTxRoot> {
        let build_id = request
            .params
            .first()
            .and_then(Value::as_str)
            .and_then(parse_build_id);

        let binding = build_id.and_then(|build_id| {
            self.store
                .get_forkchoice_response(BindingKey::Build(build_id))
        });
        let relay = match binding {
            Some(binding) => binding.relay,
            None => {
                debug!(target: "json_rpc", build_id = ?request.params.first(), "No binding for build id, using default relay");
                self.default_relay().clone()
            }
        };

        counter!("relay_proxy_relay_calls_total", "method" => BUILDER_GET_PAYLOAD_HEADER_V1)
            .increment(1);
        let payload: ExecutionPayloadWithTxRoot = self
            .client
            .forward(&relay, BUILDER_GET_PAYLOAD_HEADER_V1, &request.params)
            .await?;

        let payload = payload.with_transactions_root()?;
        let key = payload.commitment_key();
        let header = payload.blinded();

        // Without the transaction list there is nothing to reveal later; the relay's own
        // root is passed through and a matching propose finds no cached payload.
        if payload.transactions.is_none() {
            warn!(target: "json_rpc", %relay, commitment = %key, transactions_root = %header.transactions_root, "Relay payload carries no transactions, not caching");
            return Ok(header);
        }

        self.store
            .set_execution_payload(key, CachedPayload { payload, relay })
            .map_err(|err| match err {
                StoreError::Conflict {
                    key,
                    cached,
                    incoming,
                } => ProxyError::CommitmentMismatch {
                    key,
                    cached,
                    committed: incoming,
                },
            })?;

        debug!(target: "json_rpc", commitment = %key, transactions_root = %header.transactions_root, "Cached payload, returning header");
        Ok(header)
    }

    /// Reveals the cached payload for a signed blinded block and forwards the block to the
    /// relay. Exactly one relay call is made per invocation, hit or miss.
    async fn propose_blinded_block(
        &self,
        request: &JsonRpcRequest,
    ) -> Result<ExecutionPayloadWithTxRoot> {
        let reconciled = request
            .deserialize_param::<SignedBlindedBeaconBlock>(0)
            .map_err(ProxyError::InvalidParams)
            .and_then(|block| reconcile(&self.store, &block));

        let relay = match &reconciled {
            Ok(cached) => cached.relay.clone(),
            Err(_) => self.default_relay().clone(),
        };

        counter!("relay_proxy_relay_calls_total", "method" => BUILDER_PROPOSE_BLINDED_BLOCK_V1)
            .increment(1);
        let forwarded: std::result::Result<Value, _> = self
            .client
            .forward(&relay, BUILDER_PROPOSE_BLINDED_BLOCK_V1, &request.params)
            .await;

        let cached = match reconciled {
            Ok(cached) => cached,
            Err(err) => {
                if let Err(relay_err) = &forwarded {
                    debug!(target: "json_rpc", %relay, error = %relay_err, "Relay also rejected unreconciled blinded block");
                }
                return Err(err);
            }
        };
        forwarded?;

        Ok(cached.payload.clone())
    }
}

/// Bounded metric label for a method name.
fn method_label(method: &str) -> &'static str {
    match method {
        ENGINE_FORKCHOICE_UPDATED_V1 => ENGINE_FORKCHOICE_UPDATED_V1,
        BUILDER_GET_PAYLOAD_HEADER_V1 => BUILDER_GET_PAYLOAD_HEADER_V1,
        BUILDER_PROPOSE_BLINDED_BLOCK_V1 => BUILDER_PROPOSE_BLINDED_BLOCK_V1,
        _ => "unknown",
    }
}

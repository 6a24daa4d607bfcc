use alloy_primitives::B256;
use relay_proxy_client::RelayClientError;
use relay_proxy_core::{
    CommitmentKey,
    TransactionsRootError,
};
use thiserror::Error;

use crate::api::json_rpc::JsonRpcErrorCode;

pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

/// Top level error type for the proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("malformed request: {0}")]
    MalformedRequest(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("method not found: {0}")]
    UnknownMethod(String),
    #[error(transparent)]
    Relay(#[from] RelayClientError),
    #[error("payload not found for commitment {0}")]
    CommitmentNotFound(CommitmentKey),
    #[error(
        "commitment mismatch for {key}: cached transactions root {cached}, committed {committed}"
    )]
    CommitmentMismatch {
        key: CommitmentKey,
        cached: B256,
        committed: B256,
    },
    #[error("cannot compute transactions root: {0}")]
    TransactionsRoot(#[from] TransactionsRootError),
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProxyError {
    /// JSON-RPC error code reported to the caller.
    pub fn code(&self) -> JsonRpcErrorCode {
        match self {
            ProxyError::MalformedRequest(_) => JsonRpcErrorCode::InvalidRequest,
            ProxyError::InvalidParams(_) => JsonRpcErrorCode::InvalidParams,
            ProxyError::UnknownMethod(_) => JsonRpcErrorCode::MethodNotFound,
            _ => JsonRpcErrorCode::ServerError,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Configuration(_) => "configuration",
            ProxyError::MalformedRequest(_) => "malformed_request",
            ProxyError::InvalidParams(_) => "invalid_params",
            ProxyError::UnknownMethod(_) => "unknown_method",
            ProxyError::Relay(RelayClientError::Unreachable(_)) => "relay_unreachable",
            ProxyError::Relay(RelayClientError::Http { .. }) => "relay_http_error",
            ProxyError::Relay(RelayClientError::Application { .. }) => "relay_application_error",
            ProxyError::Relay(RelayClientError::Malformed(_)) => "relay_response_malformed",
            ProxyError::Relay(_) => "relay_client",
            ProxyError::CommitmentNotFound(_) => "commitment_not_found",
            ProxyError::CommitmentMismatch { .. } => "commitment_mismatch",
            ProxyError::TransactionsRoot(_) => "transactions_root",
            ProxyError::Encode(_) => "encode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ProxyError::MalformedRequest("x".into()).code(),
            JsonRpcErrorCode::InvalidRequest
        );
        assert_eq!(
            ProxyError::InvalidParams("x".into()).code(),
            JsonRpcErrorCode::InvalidParams
        );
        assert_eq!(
            ProxyError::UnknownMethod("x".into()).code(),
            JsonRpcErrorCode::MethodNotFound
        );
        assert_eq!(
            ProxyError::CommitmentNotFound(CommitmentKey {
                block_hash: B256::ZERO,
                parent_hash: B256::ZERO,
                state_root: B256::ZERO,
            })
            .code(),
            JsonRpcErrorCode::ServerError
        );
    }

    #[test]
    fn test_relay_errors_are_opaque_server_errors() {
        let err: ProxyError = RelayClientError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
        .into();
        assert_eq!(err.code(), JsonRpcErrorCode::ServerError);
        assert_eq!(err.kind(), "relay_http_error");
    }
}

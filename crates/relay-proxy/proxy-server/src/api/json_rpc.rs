use serde::{
    Deserialize,
    Serialize,
    de::DeserializeOwned,
};
use serde_json::{
    Value,
    json,
};
use std::fmt;
use uuid::Uuid;

/// Maximum allowed JSON payload size (10MB)
pub const MAX_JSON_SIZE: usize = 10 * 1024 * 1024;

/// JSON-RPC error codes used by the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    /// Generic server-side failure, used whenever no standard code applies.
    ServerError = -32000,
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as i32)
    }
}

/// Validated JSON-RPC request structure
#[derive(Debug, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: Value,
}

impl JsonRpcRequest {
    /// Validates and parses a JSON-RPC request from raw JSON value
    pub fn validate(json: Value) -> Result<Self, &'static str> {
        let obj = json.as_object().ok_or("Request must be a JSON object")?;

        let jsonrpc = obj
            .get("jsonrpc")
            .and_then(|v| v.as_str())
            .ok_or("Missing or invalid 'jsonrpc' field")?;

        if jsonrpc != "2.0" {
            return Err("JSON-RPC version must be 2.0");
        }

        let method = obj
            .get("method")
            .and_then(|v| v.as_str())
            .ok_or("Missing or invalid 'method' field")?;

        // Validate id (can be number, string, or null)
        let id = obj.get("id").cloned().unwrap_or(Value::Null);

        let params = match obj.get("params") {
            Some(Value::Array(arr)) => arr.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err("Params must be an array or null"),
        };

        Ok(JsonRpcRequest {
            jsonrpc: jsonrpc.to_string(),
            method: method.to_string(),
            params,
            id,
        })
    }

    /// Deserialize the parameter at `index`, naming the position on failure.
    pub fn deserialize_param<T: DeserializeOwned>(&self, index: usize) -> Result<T, String> {
        let value = self
            .params
            .get(index)
            .ok_or_else(|| format!("missing parameter {index}"))?;
        serde_json::from_value(value.clone())
            .map_err(|err| format!("failed to deserialize parameter {index}: {err}"))
    }

    /// Deserialize an optional trailing parameter; absent or `null` yields `None`.
    pub fn deserialize_optional_param<T: DeserializeOwned>(
        &self,
        index: usize,
    ) -> Result<Option<T>, String> {
        match self.params.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.deserialize_param(index).map(Some),
        }
    }
}

pub fn rpc_response<T: Serialize>(id: &Value, result: T) -> String {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
    .to_string()
}

pub fn rpc_error(id: &Value, code: JsonRpcErrorCode, message: &str, request_id: &Uuid) -> String {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code as i32,
            "message": message,
            "data": {
                "request_id": request_id.to_string()
            }
        },
        "id": id
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_json_rpc_request() {
        let json = json!({
            "jsonrpc": "2.0",
            "method": "builder_getPayloadHeaderV1",
            "params": ["0x01"],
            "id": "1"
        });

        let request = JsonRpcRequest::validate(json).unwrap();
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.method, "builder_getPayloadHeaderV1");
        assert_eq!(request.deserialize_param::<String>(0).unwrap(), "0x01");
        assert_eq!(request.id, "1");
    }

    #[test]
    fn test_missing_params_are_empty() {
        let request = JsonRpcRequest::validate(json!({
            "jsonrpc": "2.0",
            "method": "engine_forkchoiceUpdatedV1",
            "id": 1
        }))
        .unwrap();

        assert!(request.params.is_empty());
        assert!(request.deserialize_param::<String>(0).is_err());
        assert_eq!(request.deserialize_optional_param::<Value>(1), Ok(None));
    }

    #[test]
    fn test_invalid_envelopes() {
        assert_eq!(
            JsonRpcRequest::validate(json!([])).unwrap_err(),
            "Request must be a JSON object"
        );
        assert_eq!(
            JsonRpcRequest::validate(json!({"jsonrpc": "1.0", "method": "m", "id": 1}))
                .unwrap_err(),
            "JSON-RPC version must be 2.0"
        );
        assert_eq!(
            JsonRpcRequest::validate(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err(),
            "Missing or invalid 'method' field"
        );
        assert_eq!(
            JsonRpcRequest::validate(json!({"jsonrpc": "2.0", "method": "m", "params": {}}))
                .unwrap_err(),
            "Params must be an array or null"
        );
    }

    #[test]
    fn test_error_envelope_shape() {
        let request_id = Uuid::new_v4();
        let body = rpc_error(
            &json!(7),
            JsonRpcErrorCode::MethodNotFound,
            "method not found: foo",
            &request_id,
        );
        let value: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["error"]["code"], -32601);
        assert_eq!(value["error"]["message"], "method not found: foo");
        assert_eq!(value["error"]["data"]["request_id"], request_id.to_string());
        assert!(value.get("result").is_none());
    }
}

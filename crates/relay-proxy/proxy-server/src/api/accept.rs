use core::convert::Infallible;

use http_body_util::{
    BodyExt,
    Full,
    LengthLimitError,
    Limited,
};
use hyper::{
    Method,
    Request,
    Response,
    StatusCode,
    body::Bytes,
    header::{
        CONTENT_TYPE,
        HeaderValue,
    },
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    api::json_rpc::{
        JsonRpcErrorCode,
        MAX_JSON_SIZE,
        rpc_error,
    },
    router::Router,
};

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Accepts an incoming HTTP request, which it responds with
/// the appropriate api call.
#[tracing::instrument(level = "debug", skip_all, target = "api::accept_request", fields(%client_addr))]
pub async fn accept_request<B>(
    req: Request<B>,
    router: &Router,
    client_addr: std::net::SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: hyper::body::Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if req.uri().path() == "/health" && req.method() == Method::GET {
        return Ok(response(StatusCode::OK, "text/plain", "ok"));
    }

    tracing::debug!(target: "api::accept_request", method = %req.method(), path = req.uri().path(), "Incoming request");

    let body = match Limited::new(req.into_body(), MAX_JSON_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let request_id = Uuid::new_v4();
            let message = if err.downcast_ref::<LengthLimitError>().is_some() {
                "Request too large"
            } else {
                "Failed to read request body"
            };
            tracing::warn!(target: "json_rpc", %request_id, error = %err, "{message}");
            let envelope = rpc_error(
                &Value::Null,
                JsonRpcErrorCode::InvalidRequest,
                message,
                &request_id,
            );
            return Ok(response(StatusCode::OK, "application/json", envelope));
        }
    };

    let envelope = router.handle(&body).await;
    Ok(response(StatusCode::OK, "application/json", envelope))
}

/// Serves one connection with [`accept_request`].
#[macro_export]
macro_rules! accept {
    (
        $io:expr,
        $router:expr,
        $client_addr:expr
    ) => {
        let router = $router.clone();
        let client_addr = $client_addr;
        // Bind the incoming connection to our service
        if let Err(err) = hyper::server::conn::http1::Builder::new()
            // `service_fn` converts our function in a `Service`
            .serve_connection(
                $io,
                hyper::service::service_fn(move |req| {
                    let router = router.clone();
                    async move {
                        $crate::api::accept::accept_request(req, &router, client_addr).await
                    }
                }),
            )
            .await
        {
            tracing::debug!(?err, "Error serving connection");
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use std::sync::Arc;

    fn router() -> Router {
        Router::new(&["http://127.0.0.1:1"], Arc::new(Store::default())).unwrap()
    }

    fn addr() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_check_answers_ok() {
        let req = Request::get("/health").body(Full::new(Bytes::new())).unwrap();
        let response = accept_request(req, &router(), addr()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn non_json_body_is_parse_error() {
        let req = Request::post("/")
            .body(Full::new(Bytes::from_static(b"{not json")))
            .unwrap();
        let response = accept_request(req, &router(), addr()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn oversized_body_is_invalid_request() {
        let req = Request::post("/")
            .body(Full::new(Bytes::from(vec![b' '; MAX_JSON_SIZE + 1])))
            .unwrap();
        let response = accept_request(req, &router(), addr()).await.unwrap();

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32600);
        assert_eq!(body["error"]["message"], "Request too large");
    }
}

use crate::tracing::RequestId;
use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Header carrying the request id, in and out and on peer calls.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reuses the caller's id when it is a printable header value, otherwise mints one.
fn resolve(headers: &HeaderMap) -> (RequestId, HeaderValue) {
    let incoming = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| HeaderValue::from_str(v).ok().map(|value| (RequestId::new(v), value)));

    incoming.unwrap_or_else(|| {
        let id = RequestId::default();
        let value = HeaderValue::from_str(id.as_str())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
        (id, value)
    })
}

/// Tags the request with an id, scopes it for the handler and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let (request_id, header_value) = resolve(request.headers());
    let header = HeaderName::from_static(REQUEST_ID_HEADER);

    request.headers_mut().insert(header.clone(), header_value.clone());
    request.extensions_mut().insert(request_id.clone());

    let mut response = crate::tracing::scope_request_id(request_id, next.run(request)).await;
    response.headers_mut().insert(header, header_value);
    response
}

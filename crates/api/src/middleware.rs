//! Request correlation middleware.

use axum::Json;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common::{REQUEST_ID_HEADER, RequestContext, RequestId};

use crate::error::ErrorBody;

/// Attaches a [`RequestContext`] to every request.
///
/// The inbound `X-Request-ID` is kept when present and non-blank, otherwise a
/// fresh id is generated. The id is echoed on the response, and error bodies
/// are completed with the request path and id.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_header(
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let path = request.uri().path().to_string();
    request
        .extensions_mut()
        .insert(RequestContext::new(request_id.clone()));

    let mut response = next.run(request).await;

    if let Some(mut body) = response.extensions_mut().remove::<ErrorBody>() {
        body.path = Some(path);
        body.request_id = Some(request_id.to_string());
        let (parts, _) = response.into_parts();
        response = (parts, Json(body)).into_response();
    }

    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

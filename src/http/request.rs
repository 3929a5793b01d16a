//! Request correlation.
//!
//! Every request gets an `x-request-id` before it reaches a handler. A client
//! supplied id is kept; otherwise a UUID v4 is generated. The same id is
//! copied onto the response.

use axum::http::HeaderName;
use tower::ServiceBuilder;
use tower::layer::util::{Identity, Stack};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";

pub type RequestIdLayers =
    Stack<PropagateRequestIdLayer, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>;

/// Layers that set and propagate the request id, outermost first.
pub fn request_id_layers() -> ServiceBuilder<RequestIdLayers> {
    let header = HeaderName::from_static(X_REQUEST_ID);
    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(header.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(header))
}

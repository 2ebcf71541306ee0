//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay the upstream response to the client
//! - Map dispatch failures to HTTP status codes
//!
//! # Design Decisions
//! - Upstream bodies are streamed, not buffered
//! - The relayed body owns the backend slot, so a request counts against
//!   `max_connections` until its body is finished or dropped
//! - Hop-by-hop headers stripped automatically
//! - Upstream status codes (including 5xx) are relayed untouched

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, BodyDataStream, Bytes};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use futures_util::{Stream, StreamExt};

use crate::http::dispatcher::DispatchError;
use crate::http::request::strip_hop_by_hop;
use crate::load_balancer::{BackendConnectionGuard, LoadBalancerError};

/// Prepare an upstream response for the client.
///
/// `slot` travels with the body and is checked back in once the body
/// reaches its end, fails, or is dropped unread.
pub fn from_upstream(response: Response<Body>, slot: BackendConnectionGuard) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = Body::from_stream(SlotBody {
        inner: body.into_data_stream(),
        slot: Some(slot),
    });
    Response::from_parts(parts, body)
}

/// Upstream body stream holding the slot it was forwarded through.
struct SlotBody {
    inner: BodyDataStream,
    slot: Option<BackendConnectionGuard>,
}

impl Stream for SlotBody {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = this.inner.poll_next_unpin(cx);
        if let Poll::Ready(None | Some(Err(_))) = next {
            this.slot.take();
        }
        next
    }
}

impl DispatchError {
    /// Status code returned to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Route(_) => StatusCode::NOT_FOUND,
            DispatchError::Balancer(LoadBalancerError::NoBackendAvailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Balancer(LoadBalancerError::PoolExhausted { .. }) => StatusCode::TOO_MANY_REQUESTS,
            DispatchError::RetriesExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            DispatchError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DispatchError::RequestBody(_) => StatusCode::BAD_REQUEST,
            DispatchError::InvalidUpstreamRequest(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), self.to_string()).into_response()
    }
}

//! Reload endpoint transports.
//!
//! Both transports register with the same [`ClientRegistry`]; they only
//! differ in how queued messages reach the browser.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

pub use hotpage_config::Transport;

use super::Installation;
use super::bootstrap::ACK_QUERY;
use super::registry::{ClientRegistry, ReloadMessage};

/// Interval between SSE keep-alive comments.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// State for the reload endpoint.
#[derive(Clone, Debug)]
pub(crate) struct ReloadState {
    pub(crate) registry: ClientRegistry,
    pub(crate) transport: Transport,
    /// Longest hold of a poll request, `None` to hold until a reload.
    pub(crate) poll_hold: Option<Duration>,
    /// Keeps the watchers and the pipeline running while the route exists.
    pub(crate) _installation: Option<Arc<Installation>>,
}

/// Handle `GET` on the reload endpoint with the configured transport.
pub(crate) async fn reload_handler(
    State(state): State<ReloadState>,
    RawQuery(query): RawQuery,
) -> Response {
    match state.transport {
        Transport::Push => push(&state.registry),
        Transport::Poll if query.as_deref() == Some(ACK_QUERY) => acknowledge(),
        Transport::Poll => poll(&state.registry, state.poll_hold).await,
    }
}

/// Open a server-sent event stream.
///
/// The first frame carries `connected`, every later frame `reload`. The
/// registration lives inside the stream, so the session is deregistered as
/// soon as the connection closes or errors.
fn push(registry: &ClientRegistry) -> Response {
    let (registration, rx) = registry.register(Transport::Push);

    let stream = ReceiverStream::new(rx).map(move |message| {
        tracing::trace!(client = %registration.id(), token = message.token(), "Sending event");
        Ok::<_, Infallible>(Event::default().data(message.token()))
    });

    (
        [
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)),
    )
        .into_response()
}

/// Confirm a fresh poll channel without registering a session.
fn acknowledge() -> Response {
    (StatusCode::NO_CONTENT, poll_headers()).into_response()
}

fn poll_headers() -> [(header::HeaderName, &'static str); 2] {
    [
        (header::CACHE_CONTROL, "no-cache"),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    ]
}

/// Hold the request until the next reload, then answer with an empty body.
///
/// A request held longer than `hold` is answered `204 No Content` and the
/// client asks again. If the caller cancels first, the handler future is
/// dropped together with its registration.
async fn poll(registry: &ClientRegistry, hold: Option<Duration>) -> Response {
    let (registration, mut rx) = registry.register(Transport::Poll);

    let next_reload = async {
        loop {
            match rx.recv().await {
                Some(ReloadMessage::Reload) => break StatusCode::OK,
                Some(ReloadMessage::Connected) => {}
                // Removed from the registry without a reload: let the client retry
                None => break StatusCode::SERVICE_UNAVAILABLE,
            }
        }
    };
    let status = match hold {
        Some(hold) => tokio::time::timeout(hold, next_reload)
            .await
            .unwrap_or(StatusCode::NO_CONTENT),
        None => next_reload.await,
    };
    drop(registration);

    (status, poll_headers()).into_response()
}

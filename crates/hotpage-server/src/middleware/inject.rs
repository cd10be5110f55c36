//! Bootstrap script injection.
//!
//! Wraps the send path of every route it is layered over: HTML documents
//! get the live reload script inserted right before their closing head tag,
//! everything else passes through byte-identical.
//!
//! A response counts as an HTML document when its `Content-Type` is
//! `text/html`. Bodies of any other type are never inspected, so JSON or
//! text payloads that merely contain the tag as data stay untouched.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::live_reload::SCRIPT_OPEN;

/// Closing head tag, matched case-insensitively.
const HEAD_CLOSE: &[u8] = b"</head>";

/// Inserts the bootstrap script into HTML documents.
#[derive(Clone, Debug)]
pub struct ResponseInjector {
    script: Arc<str>,
}

impl ResponseInjector {
    /// Create an injector for a rendered `<script>` element.
    pub fn new(script: impl Into<Arc<str>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Insert the script before the first closing head tag.
    ///
    /// Returns `None` when the document has no head tag or already carries
    /// the script element, i.e. when the body must be sent unchanged. A mere
    /// mention of the marker attribute in the page text does not count.
    pub fn inject(&self, html: &str) -> Option<String> {
        if find_ignore_ascii_case(html, SCRIPT_OPEN.as_bytes()).is_some() {
            return None;
        }
        let index = find_ignore_ascii_case(html, HEAD_CLOSE)?;

        let mut injected = String::with_capacity(html.len() + self.script.len());
        injected.push_str(&html[..index]);
        injected.push_str(&self.script);
        injected.push_str(&html[index..]);
        Some(injected)
    }
}

fn find_ignore_ascii_case(html: &str, needle: &[u8]) -> Option<usize> {
    html.as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Middleware entry point, see [`axum::middleware::from_fn_with_state`].
pub(crate) async fn inject_script(
    State(injector): State<ResponseInjector>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !is_html_document(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer HTML response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match std::str::from_utf8(&bytes).ok().and_then(|html| injector.inject(html)) {
        Some(html) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(html))
        }
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}

/// Complete, uncompressed `text/html` bodies only.
fn is_html_document(response: &Response) -> bool {
    let status = response.status();
    if !status.is_success() || status == StatusCode::PARTIAL_CONTENT {
        return false;
    }

    let headers = response.headers();
    if headers.contains_key(header::CONTENT_ENCODING) {
        return false;
    }

    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| {
            content_type
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("text/html")
        })
}

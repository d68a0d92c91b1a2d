//! HTML pages: landing redirect, chart, logs and the missing-credentials notice.

use std::sync::atomic::Ordering;

use axum::{
    Router,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use tracing::{info, warn};

use crate::api::chart::render_svg;
use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::scheduler::TickOrigin;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/graph", get(graph))
        .route("/logs", get(logs))
        .route("/no-credentials", get(no_credentials))
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// First visit takes today's snapshot, then every visit lands on the chart.
///
/// Without any credential file the visitor is sent to `/no-credentials` and
/// the first-visit tick stays pending until a file appears.
async fn index(State(state): State<AppState>) -> Redirect {
    if state.initialized.load(Ordering::Acquire) {
        return Redirect::to("/graph");
    }

    if !state.resolver.detect_source().is_found() {
        warn!("No credential source found, cannot take a snapshot");
        return Redirect::to("/no-credentials");
    }

    if !state.initialized.swap(true, Ordering::AcqRel) {
        info!("First request, running snapshot tick");
        let outcome = state.scheduler.tick(TickOrigin::Request).await;
        info!(outcome = ?outcome, "First-request tick finished");
    }

    Redirect::to("/graph")
}

async fn graph(State(state): State<AppState>) -> ApiResult<Response> {
    let snapshots = state.repository.list_all().await?;

    if snapshots.is_empty() {
        info!("No snapshots to chart yet");
        return Ok(Html("<h1>No data to show yet</h1>").into_response());
    }

    Ok((
        [(header::CONTENT_TYPE, "image/svg+xml")],
        render_svg(&snapshots),
    )
        .into_response())
}

async fn logs(State(state): State<AppState>) -> Html<String> {
    let lines = state.log_buffer.lines().join("\n");
    Html(format!("<pre>{}</pre>", escape_html(&lines)))
}

async fn no_credentials(State(state): State<AppState>) -> Html<String> {
    let paths = state.resolver.paths();
    let items: String = [
        &paths.host_token,
        &paths.local_token,
        &paths.client_secret,
    ]
    .iter()
    .map(|path| format!("<li><code>{}</code></li>", escape_html(&path.display().to_string())))
    .collect();

    Html(format!(
        "<h1>Authentication file not found</h1>\
         <p>None of the credential files exist. Provide one of the following, \
         in order of preference, and reload <a href=\"/\">the start page</a>:</p>\
         <ul>{items}</ul>"
    ))
}

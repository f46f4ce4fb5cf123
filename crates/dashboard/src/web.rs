use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::actions;
use crate::series::Sample;
use crate::session::{local_now, ClockTime, IrrigationConfig, IrrigationStatus, SessionStore};
use crate::view::{self, Tab};

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "garden_session";

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(store: SessionStore) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/irrigation/manual", post(manual))
        .route("/irrigation/automatic", post(automatic))
        .route("/irrigation/schedule", post(schedule))
        .route("/api/status", get(api_status))
        .with_state(store)
}

// ---------------------------------------------------------------------------
// Session cookie
// ---------------------------------------------------------------------------

fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// Attach the session cookie when the session was just created.
fn with_cookie(resp: impl IntoResponse, id: &str, created: bool) -> Response {
    let mut resp = resp.into_response();
    if created {
        let cookie = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
        match HeaderValue::from_str(&cookie) {
            Ok(v) => {
                resp.headers_mut().append(header::SET_COOKIE, v);
            }
            Err(e) => warn!("invalid session cookie value: {e}"),
        }
    }
    resp
}

async fn resolve(store: &SessionStore, headers: &HeaderMap) -> (String, bool) {
    store.get_or_create(session_cookie(headers), local_now()).await
}

fn irrigation_tab() -> Redirect {
    Redirect::to(&format!("/?tab={}", Tab::Irrigation))
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PageQuery {
    tab: Option<String>,
    hours: Option<u32>,
}

async fn index(
    State(store): State<SessionStore>,
    headers: HeaderMap,
    Query(q): Query<PageQuery>,
) -> Response {
    let now = local_now();
    let (id, created) = store.get_or_create(session_cookie(&headers), now).await;
    let tab = Tab::from_str_lossy(q.tab.as_deref().unwrap_or_default());
    let hours = view::clamp_window(q.hours);

    let page = store
        .with_session(&id, |st| {
            let flash = st.take_flash();
            view::render_page(st, tab, hours, now, flash.as_deref())
        })
        .await;

    match page {
        Some(html) => with_cookie(Html(html), &id, created),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "session vanished").into_response(),
    }
}

// ---------------------------------------------------------------------------
// Irrigation actions
// ---------------------------------------------------------------------------

async fn manual(State(store): State<SessionStore>, headers: HeaderMap) -> Response {
    let (id, created) = resolve(&store, &headers).await;
    let now = local_now();
    store
        .with_session(&id, |st| actions::activate_manual(st, now))
        .await;
    with_cookie(irrigation_tab(), &id, created)
}

#[derive(Debug, Deserialize)]
struct AutomaticForm {
    /// Checkbox: present when checked, absent otherwise.
    auto: Option<String>,
    threshold: f64,
}

async fn automatic(
    State(store): State<SessionStore>,
    headers: HeaderMap,
    Form(form): Form<AutomaticForm>,
) -> Response {
    let (id, created) = resolve(&store, &headers).await;
    let auto = form.auto.is_some();
    store
        .with_session(&id, |st| actions::set_automatic(st, auto, form.threshold))
        .await;
    with_cookie(irrigation_tab(), &id, created)
}

#[derive(Debug, Deserialize)]
struct ScheduleForm {
    time1: String,
    time2: String,
    duration_sec: i64,
}

async fn schedule(
    State(store): State<SessionStore>,
    headers: HeaderMap,
    Form(form): Form<ScheduleForm>,
) -> Result<Response, (StatusCode, String)> {
    let time1: ClockTime = form.time1.parse().map_err(bad_request)?;
    let time2: ClockTime = form.time2.parse().map_err(bad_request)?;

    let (id, created) = resolve(&store, &headers).await;
    store
        .with_session(&id, |st| {
            actions::save_schedule(st, time1, time2, form.duration_sec)
        })
        .await;
    Ok(with_cookie(irrigation_tab(), &id, created))
}

fn bad_request(msg: String) -> (StatusCode, String) {
    warn!("rejected form input: {msg}");
    (StatusCode::BAD_REQUEST, msg)
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct StatusResponse {
    config: IrrigationConfig,
    status: IrrigationStatus,
    samples: Vec<Sample>,
}

async fn api_status(State(store): State<SessionStore>, headers: HeaderMap) -> Response {
    let (id, created) = resolve(&store, &headers).await;
    let snapshot = store
        .with_session(&id, |st| StatusResponse {
            config: st.config.clone(),
            status: st.status.clone(),
            samples: st.series.samples().collect(),
        })
        .await;

    match snapshot {
        Some(body) => with_cookie(Json(body), &id, created),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "session vanished").into_response(),
    }
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(store: SessionStore, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    info!(%addr, "web ui listening");

    axum::serve(listener, router(store))
        .await
        .context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================

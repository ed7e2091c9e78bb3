//! Liveness and status endpoints served alongside the gateway client.
//!
//! Everything here reads the live in-process state: the usage counter,
//! the assist cache, and the session registry.

use crate::context::Shared;
use crate::log_internal;
use axum::extract::State;
use axum::response::{Html, Json};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use std::sync::Arc;

pub fn router(shared: Arc<Shared>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/ping", get(ping_handler))
        .with_state(shared)
}

async fn health_handler(State(shared): State<Arc<Shared>>) -> Json<serde_json::Value> {
    let configured = shared.pstate.read().await.guild.is_configured();
    Json(serde_json::json!({
        "status": "healthy",
        "configured": configured,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn status_handler(State(shared): State<Arc<Shared>>) -> Json<serde_json::Value> {
    let (calls_today, daily_limit, last_reset, cache_size, cache_hits) = {
        let scoring = shared.scoring.read().await;
        (
            scoring.limiter.calls_today(),
            scoring.limiter.daily_limit(),
            scoring.limiter.last_reset().to_string(),
            scoring.cache.len(),
            scoring.cache.hits(),
        )
    };
    let (active, completed, abandoned, counts) = {
        let vstate = shared.vstate.read().await;
        (
            vstate.sessions.active_count(),
            vstate.sessions.completed_count(),
            vstate.sessions.abandoned_count(),
            vstate.questions.counts(),
        )
    };
    let configured = shared.pstate.read().await.guild.is_configured();

    Json(serde_json::json!({
        "configured": configured,
        "ai": {
            "calls_today": calls_today,
            "daily_limit": daily_limit,
            "last_reset": last_reset,
            "cache_size": cache_size,
            "cache_hits": cache_hits,
        },
        "sessions": {
            "active": active,
            "completed": completed,
            "abandoned": abandoned,
        },
        "questions": {
            "entry": counts.entry,
            "reflective": counts.reflective,
            "psychological_trusted": counts.trusted,
            "psychological_medium": counts.medium,
            "psychological_high": counts.high,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn ping_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "pong": Utc::now().to_rfc3339() }))
}

async fn home_handler(State(shared): State<Arc<Shared>>) -> Html<String> {
    let configured = shared.pstate.read().await.guild.is_configured();
    let (calls_today, daily_limit) = {
        let scoring = shared.scoring.read().await;
        (scoring.limiter.calls_today(), scoring.limiter.daily_limit())
    };
    let active = shared.vstate.read().await.sessions.active_count();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Mandirbot</title><meta charset="utf-8"></head>
<body>
<h1>Mandirbot</h1>
<p>A gentle temple gatekeeper for a Krishna-conscious community.</p>
<ul>
<li>Configured: {configured}</li>
<li>Active verification sessions: {active}</li>
<li>AI calls today: {calls_today} / {daily_limit}</li>
</ul>
<p>See <a href="/status">/status</a> for details.</p>
</body>
</html>
"#
    ))
}

pub async fn serve(shared: Arc<Shared>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    log_internal!("Web server listening on port {}", port);
    axum::serve(listener, router(shared)).await?;
    Ok(())
}

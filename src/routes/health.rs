use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no store access
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: the store root must be listable, bounded by a timeout
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let root = state.store.read().await.root().to_path_buf();
    match tokio::time::timeout(std::time::Duration::from_secs(5), tokio::fs::read_dir(&root)).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.get_snapshot())
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let counters = [
        ("recognitions", "Recognition requests", m.recognitions),
        ("matches", "Recognitions that returned a match", m.matches),
        ("no_matches", "Recognitions without a match", m.no_matches),
        ("recognition_failures", "Failed or timed out recognitions", m.recognition_failures),
        ("registrations", "Images registered", m.registrations),
        ("renames", "Images renamed", m.renames),
        ("deletions", "Images deleted", m.deletions),
    ];
    let mut body = String::new();
    for (name, help, value) in counters {
        body.push_str(&format!(
            "# HELP facedir_{name} {help}\n# TYPE facedir_{name} counter\nfacedir_{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# HELP facedir_uptime_seconds Uptime seconds\n# TYPE facedir_uptime_seconds gauge\nfacedir_uptime_seconds {}\n",
        m.uptime_seconds
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON), including the deployed recognition settings
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let settings = state.gateway.settings();
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "recognition": {
            "metric": settings.metric.as_str(),
            "model": settings.model.as_str(),
            "detector": settings.detector.as_str(),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}

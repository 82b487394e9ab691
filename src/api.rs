use crate::models::Dashboard;
use crate::render::{render_page, PageContext};
use crate::state::AppState;
use axum::{extract::State, response::Html, routing::get, Json, Router};

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/api/dashboard", get(dashboard_json))
        .route("/healthz", get(healthz))
        .with_state(state)
}

// axum drops the handler future when the client goes away, which aborts
// the cycle's in-flight requests.
async fn dashboard_page(State(state): State<AppState>) -> Html<String> {
    let dashboard = state.aggregator.collect().await;
    let gitlab = &state.config.gitlab;
    let ctx = PageContext {
        username: &gitlab.username,
        host: &gitlab.url,
        refresh_seconds: gitlab.refresh_seconds,
    };
    Html(render_page(&dashboard, &ctx))
}

async fn dashboard_json(State(state): State<AppState>) -> Json<Dashboard> {
    Json(state.aggregator.collect().await)
}

async fn healthz() -> &'static str {
    "ok"
}

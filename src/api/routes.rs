use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{require_auth, AppState};

use super::health::health;
use super::metrics::prometheus_metrics;
use super::template::{
    create_template, delete_template, get_template, get_template_by_slug, list_templates,
    render_template, update_template,
};

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Bearer token required
    let protected = Router::new()
        .route("/", post(create_template).get(list_templates))
        .route(
            "/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    let public = Router::new()
        .route("/render", post(render_template))
        .route("/by-slug/{slug}", get(get_template_by_slug));

    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Template endpoints
        .nest("/api/v1/templates", public.merge(protected))
}

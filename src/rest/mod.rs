// rest/mod.rs — Public REST API server.
//
// Axum HTTP server fronting the task store. CORS is wide open so a web
// client served from another origin can reach it during development.
//
// Endpoints:
//   GET    /health
//   GET    /tasks
//   POST   /tasks
//   GET    /tasks/{id}
//   PATCH  /tasks/{id}
//   DELETE /tasks/{id}

pub mod routes;

use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::AppContext;

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/tasks/{id}",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .layer(cors)
        .with_state(ctx)
}

/// Serve the API on an already-bound listener. Binding is left to the caller
/// so tests can grab an ephemeral port before the server starts.
pub async fn serve(ctx: Arc<AppContext>, listener: TcpListener) -> Result<()> {
    info!("REST API listening on http://{}", listener.local_addr()?);
    let router = build_router(ctx);
    axum::serve(listener, router).await?;
    Ok(())
}

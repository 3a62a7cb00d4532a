//! Table CRUD routes. Tables are resolved per request from the schema catalog, so one route set serves them all.

use crate::handlers::entity::{create, delete as delete_handler, list, patch, read, replace, tables};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(tables))
        .route("/:table", get(list).post(create))
        .route(
            "/:table/:key",
            get(read).put(replace).patch(patch).delete(delete_handler),
        )
        .with_state(state)
}

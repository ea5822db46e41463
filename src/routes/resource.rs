//! Generated CRUD routes. Paths are parameterized so the Path extractor
//! receives the segment and id; handlers resolve the resource by segment.

use crate::handlers::resource::{bulk_insert, create_or_update, get_by_id, list, remove};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn resource_routes(state: AppState) -> Router {
    Router::new()
        .route("/:path_segment", get(list).post(create_or_update))
        .route("/:path_segment/bulk", post(bulk_insert))
        .route("/:path_segment/:id", get(get_by_id).delete(remove))
        .with_state(state)
}

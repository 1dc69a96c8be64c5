use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_RANGE;
use axum::http::{Extensions, HeaderMap, StatusCode, Version};
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::predicate::{DefaultPredicate, Predicate};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Partial content keeps its byte offsets, so it is never re-encoded.
fn whole_body(status: StatusCode, _: Version, headers: &HeaderMap, _: &Extensions) -> bool {
    status != StatusCode::PARTIAL_CONTENT && !headers.contains_key(CONTENT_RANGE)
}

/// Build the axum router with all fbox endpoints under `/v0`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.max_blob_size).unwrap_or(usize::MAX);
    let compression = CompressionLayer::new().compress_when(DefaultPredicate::new().and(whole_body));

    Router::new()
        .route("/v0/health", get(handler::health))
        .route("/v0/boxes", get(handler::list_boxes).post(handler::create_box))
        .route("/v0/boxes/:box", get(handler::get_box))
        .route("/v0/boxes/:box/push/plan", post(handler::push_plan))
        .route("/v0/boxes/:box/push/finalize", post(handler::push_finalize))
        .route("/v0/boxes/:box/commits", get(handler::list_commits))
        .route("/v0/boxes/:box/commits/latest", get(handler::latest_commit))
        .route("/v0/boxes/:box/tree/:commit_id", get(handler::commit_tree))
        .route(
            "/v0/blobs/:hash",
            put(handler::upload_blob).head(handler::blob_exists),
        )
        .route("/v0/files/:commit_id", get(handler::fetch_file))
        .layer(
            ServiceBuilder::new()
                .layer(CatchPanicLayer::new())
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive())
                .layer(compression)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

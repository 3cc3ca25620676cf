//! Doublons API server
//!
//! Exposes the duplicate-student core over REST:
//! - Scan job control (start/resume, status, cooperative stop)
//! - Duplicate group registry (list, review actions, ignore registry)
//! - Field-level merge of reviewed groups
//!
//! The router is built from an `AppState` so integration tests can run
//! it over the in-memory store without binding a port.

pub mod handlers;
pub mod merge;
pub mod scan;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use doublons_common::{config::AppConfig, SharedStore};
use merge::MergeResolver;
use scan::{NameSimilarity, ScanManager};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub scans: ScanManager,
    pub merges: MergeResolver,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, store: SharedStore) -> Self {
        let engine = Arc::new(
            NameSimilarity::new(config.scan.score_threshold)
                .with_block_size(config.scan.block_size),
        );
        let scans = ScanManager::new(store.clone(), engine, config.scan.clone());
        let merges = MergeResolver::new(store.clone());
        Self {
            config,
            store,
            scans,
            merges,
        }
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Scan job endpoints
        .route("/doublons/scan/start", post(handlers::scan::start_scan))
        .route(
            "/doublons/scan/status/{job_id}",
            get(handlers::scan::scan_status),
        )
        .route(
            "/doublons/scan/stop/{job_id}",
            post(handlers::scan::stop_scan),
        )
        // Group registry endpoints
        .route("/doublons/list", get(handlers::groups::list_groups))
        .route(
            "/doublons/action/{group_id}",
            post(handlers::groups::group_action),
        )
        .route("/doublons/ignore", post(handlers::groups::bulk_ignore))
        .route("/doublons/ignored", get(handlers::ignored::list_ignored))
        .route(
            "/doublons/ignored/{id}",
            delete(handlers::ignored::delete_ignored),
        )
        // Merge endpoint
        .route(
            "/doublons/merge/advanced",
            post(handlers::merge::advanced_merge),
        )
        // Student records
        .route("/etudiants/{id}", get(handlers::students::get_student));

    Router::new()
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

pub mod config;
pub mod db;
pub mod handlers;
pub mod models;

use axum::{routing::get, Router};
use sqlx::sqlite::SqlitePool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use handlers::records::routes;
use models::{
    CardiologyRecord, DialysisRecord, GastroenterologyRecord, NeurologyRecord, ObgynRecord,
    OncologyRecord, OphthalmologyRecord, OrthopedicsRecord, PediatricsRecord, PulmonologyRecord,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

impl AppState {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .nest("/patients", handlers::patients::routes())
        .nest("/cardiology", routes::<CardiologyRecord>())
        .nest("/oncology", routes::<OncologyRecord>())
        .nest("/neurology", routes::<NeurologyRecord>())
        .nest("/obgyn", routes::<ObgynRecord>())
        .nest("/pediatrics", routes::<PediatricsRecord>())
        .nest("/gastroenterology", routes::<GastroenterologyRecord>())
        .nest("/pulmonology", routes::<PulmonologyRecord>())
        .nest("/orthopedics", routes::<OrthopedicsRecord>())
        .nest("/ophthalmology", routes::<OphthalmologyRecord>())
        .nest("/dialysis", routes::<DialysisRecord>())
        .nest("/specimens", handlers::specimens::routes())
        .route("/dashboard/stats", get(handlers::dashboard_stats));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .fallback(handlers::fallback)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

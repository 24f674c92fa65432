use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::records::{self, ensure_patient, record_from_body, server_fields};
use crate::db::specimens::insert_with_barcode;
use crate::db::Repository;
use crate::models::{ApiError, ApiResponse, Specimen};
use crate::AppState;

/// Specimen routes; creation is replaced so the barcode is issued server side
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(records::list_records::<Specimen>).post(create_specimen),
        )
        .route("/barcode/:barcode", get(get_by_barcode))
        .merge(records::item_routes::<Specimen>())
}

/// POST /api/specimens
/// Register a specimen and issue its barcode
pub async fn create_specimen(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Specimen>>), ApiError> {
    let Json(body) = body?;
    let id = Uuid::new_v4().to_string();

    // placeholder until a sequence is allocated
    let mut fields = server_fields(&id, Utc::now());
    fields.insert("barcode".to_string(), json!(""));

    let mut specimen: Specimen = record_from_body(body, fields)?;
    ensure_patient(&state.db_pool, &specimen).await?;
    insert_with_barcode(&state.db_pool, &mut specimen).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            specimen,
            "Specimen created successfully",
        )),
    ))
}

/// GET /api/specimens/barcode/:barcode
pub async fn get_by_barcode(
    State(state): State<AppState>,
    barcode: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<Specimen>>, ApiError> {
    let Path(barcode) = barcode?;
    let barcode = barcode.trim().to_ascii_uppercase();
    let specimen = Repository::<Specimen>::new(state.db_pool)
        .find_by("barcode", &barcode)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Specimen with barcode {} not found", barcode)))?;

    Ok(Json(ApiResponse::ok(specimen)))
}

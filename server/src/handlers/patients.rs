use std::collections::BTreeMap;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::records;
use crate::db::repository::count_rows;
use crate::db::Repository;
use crate::models::{ApiError, ApiResponse, Patient, PATIENT_MODULES};
use crate::AppState;

/// A patient with the number of records each module holds for them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub patient: Patient,
    pub record_counts: BTreeMap<String, i64>,
    pub total_records: i64,
}

/// Patient registry routes: the shared CRUD set plus the summary view
pub fn routes() -> Router<AppState> {
    records::routes::<Patient>().route("/:id/summary", get(patient_summary))
}

/// GET /api/patients/:id/summary
pub async fn patient_summary(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<PatientSummary>>, ApiError> {
    let Path(id) = id?;
    let patient = Repository::<Patient>::new(state.db_pool.clone())
        .get(&id)
        .await?;

    let mut record_counts = BTreeMap::new();
    for &(module, table) in PATIENT_MODULES {
        let count = count_rows(&state.db_pool, table, Some(&id)).await?;
        record_counts.insert(module.to_string(), count);
    }
    let total_records: i64 = record_counts.values().sum();

    Ok(Json(ApiResponse::ok(PatientSummary {
        patient,
        record_counts,
        total_records,
    })))
}

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::repository::{count_created_on, count_rows};
use crate::db::specimens::count_pending;
use crate::db::Repository;
use crate::models::{ApiError, ApiResponse, ClinicalRecord, Patient, PATIENT_MODULES};
use crate::AppState;

/// Hospital-wide counters for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_patients: i64,
    pub active_patients: i64,
    pub records_by_module: BTreeMap<String, i64>,
    pub total_records: i64,
    pub pending_specimens: i64,
    pub records_created_today: i64,
}

/// GET /api/dashboard/stats
pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let pool = &state.db_pool;
    let today = Utc::now().date_naive();

    let patient_statuses = Repository::<Patient>::new(pool.clone())
        .status_counts()
        .await?;
    let total_patients: i64 = patient_statuses.iter().map(|(_, n)| n).sum();
    let active_patients = patient_statuses
        .iter()
        .find(|(status, _)| status == "ACTIVE")
        .map_or(0, |(_, n)| *n);

    let mut records_by_module = BTreeMap::new();
    let mut records_created_today = count_created_on(pool, Patient::TABLE, today).await?;
    for &(module, table) in PATIENT_MODULES {
        records_by_module.insert(module.to_string(), count_rows(pool, table, None).await?);
        records_created_today += count_created_on(pool, table, today).await?;
    }
    let total_records: i64 = records_by_module.values().sum();
    let pending_specimens = count_pending(pool).await?;

    Ok(Json(ApiResponse::ok(DashboardStats {
        total_patients,
        active_patients,
        records_by_module,
        total_records,
        pending_specimens,
        records_created_today,
    })))
}

//! Generic CRUD handlers shared by every record module.
//!
//! Each module mounts [`routes`] for its record type, so patients, the
//! specialty clinics and the lab all answer the same list/create/get/
//! update/patch/delete contract with the same envelopes.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use json_patch::Patch;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::db::repository::{patient_exists, DEFAULT_PAGE_SIZE};
use crate::db::{ListParams, Repository, SortOrder};
use crate::models::{
    ApiError, ApiResponse, ClinicalRecord, FieldError, PaginatedResponse, Pagination,
};
use crate::AppState;

/// Query string accepted by every list endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub patient_id: Option<String>,
    /// Inclusive lower bound (YYYY-MM-DD)
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound (YYYY-MM-DD)
    #[serde(default, deserialize_with = "empty_as_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sort_by: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sort_order: Option<SortOrder>,
}

/// Treat `?field=` the same as an absent field
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

impl ListQuery {
    pub fn into_params(self) -> Result<ListParams<'static>, ApiError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ApiError::BadRequest(
                    "dateFrom must not be after dateTo".to_string(),
                ));
            }
        }

        let mut params = ListParams::new()
            .with_page(self.page.unwrap_or(1))
            .with_limit(self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
            .with_date_range(self.date_from, self.date_to)
            .with_sort_order(self.sort_order.unwrap_or_default());

        if let Some(search) = self.search {
            params = params.with_search(search);
        }
        if let Some(status) = self.status {
            params = params.with_status(status);
        }
        if let Some(patient_id) = self.patient_id {
            params = params.with_patient_id(patient_id);
        }
        if let Some(sort_by) = self.sort_by {
            params.sort_by = Some(sort_by.into());
        }

        Ok(params)
    }
}

/// Per-status counts for one module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
}

/// Mount the collection and item endpoints for one record type
pub fn routes<R: ClinicalRecord>() -> Router<AppState> {
    Router::new()
        .route("/", get(list_records::<R>).post(create_record::<R>))
        .merge(item_routes::<R>())
}

/// Stats and single-record endpoints
pub fn item_routes<R: ClinicalRecord>() -> Router<AppState> {
    Router::new()
        .route("/stats", get(record_stats::<R>))
        .route(
            "/:id",
            get(get_record::<R>)
                .put(update_record::<R>)
                .patch(patch_record::<R>)
                .delete(delete_record::<R>),
        )
}

/// GET /api/{module}
/// Search with pagination, filters and sorting
pub async fn list_records<R: ClinicalRecord>(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<PaginatedResponse<R>>, ApiError> {
    let Query(query) = query?;
    let params = query.into_params()?;

    let page = Repository::<R>::new(state.db_pool).list(&params).await?;
    let pagination = Pagination::new(params.page, params.limit, page.total);

    Ok(Json(PaginatedResponse::new(page.items, pagination)))
}

/// POST /api/{module}
/// Create a new record
pub async fn create_record<R: ClinicalRecord>(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<R>>), ApiError> {
    let Json(body) = body?;
    let id = Uuid::new_v4().to_string();
    let record: R = record_from_body(body, server_fields(&id, Utc::now()))?;
    ensure_patient(&state.db_pool, &record).await?;

    Repository::<R>::new(state.db_pool).insert(&record).await?;
    tracing::info!(id = %id, table = R::TABLE, "record created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            record,
            format!("{} created successfully", R::LABEL),
        )),
    ))
}

/// GET /api/{module}/:id
pub async fn get_record<R: ClinicalRecord>(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<R>>, ApiError> {
    let Path(id) = id?;
    let record = Repository::<R>::new(state.db_pool).get(&id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

/// PUT /api/{module}/:id
/// Merge the body over the stored record
pub async fn update_record<R: ClinicalRecord>(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<R>>, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let repo = Repository::<R>::new(state.db_pool.clone());
    let existing = repo.get(&id).await?;

    let updated = merge_update(&existing, body, Utc::now())?;
    save(&state.db_pool, &repo, &existing, &updated).await?;

    Ok(Json(ApiResponse::with_message(
        updated,
        format!("{} updated successfully", R::LABEL),
    )))
}

/// PATCH /api/{module}/:id
/// Apply a JSON Patch document
pub async fn patch_record<R: ClinicalRecord>(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    patch: Result<Json<Patch>, JsonRejection>,
) -> Result<Json<ApiResponse<R>>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = patch?;
    let repo = Repository::<R>::new(state.db_pool.clone());
    let existing = repo.get(&id).await?;

    let patched = apply_patch(&existing, &patch, Utc::now())?;
    save(&state.db_pool, &repo, &existing, &patched).await?;

    Ok(Json(ApiResponse::with_message(
        patched,
        format!("{} updated successfully", R::LABEL),
    )))
}

/// DELETE /api/{module}/:id
pub async fn delete_record<R: ClinicalRecord>(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    let Path(id) = id?;
    if !Repository::<R>::new(state.db_pool).delete(&id).await? {
        return Err(ApiError::not_found(R::LABEL, &id));
    }
    tracing::info!(id = %id, table = R::TABLE, "record deleted");

    Ok(Json(ApiResponse::with_message(
        json!({ "id": id }),
        format!("{} deleted successfully", R::LABEL),
    )))
}

/// GET /api/{module}/stats
pub async fn record_stats<R: ClinicalRecord>(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RecordStats>>, ApiError> {
    let by_status: BTreeMap<String, i64> = Repository::<R>::new(state.db_pool)
        .status_counts()
        .await?
        .into_iter()
        .collect();
    let total: i64 = by_status.values().sum();

    Ok(Json(ApiResponse::ok(RecordStats { total, by_status })))
}

async fn save<R: ClinicalRecord>(
    pool: &SqlitePool,
    repo: &Repository<R>,
    existing: &R,
    updated: &R,
) -> Result<(), ApiError> {
    if updated.patient_id() != existing.patient_id() {
        ensure_patient(pool, updated).await?;
    }
    if !repo.update(updated).await? {
        return Err(ApiError::not_found(R::LABEL, existing.id()));
    }
    Ok(())
}

/// Reject records pointing at a patient that does not exist
pub async fn ensure_patient<R: ClinicalRecord>(
    pool: &SqlitePool,
    record: &R,
) -> Result<(), ApiError> {
    if let Some(patient_id) = record.patient_id() {
        if !patient_exists(pool, patient_id).await? {
            return Err(ApiError::Validation(vec![FieldError::new(
                "patientId",
                format!("patient {} does not exist", patient_id),
            )]));
        }
    }
    Ok(())
}

/// Server-managed fields for a record created at `now`
pub fn server_fields(id: &str, now: DateTime<Utc>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("id".to_string(), json!(id));
    fields.insert("createdAt".to_string(), json!(now));
    fields.insert("updatedAt".to_string(), json!(now));
    fields
}

/// Build a new record from a client body.
///
/// Read-only fields sent by the client are dropped and replaced by
/// `server`, then the result is decoded and validated.
pub fn record_from_body<R: ClinicalRecord>(
    body: Value,
    server: Map<String, Value>,
) -> Result<R, ApiError> {
    let mut fields = into_object(body)?;
    for key in R::READ_ONLY {
        fields.remove(*key);
    }
    fields.extend(server);

    decode(Value::Object(fields))
}

/// Merge a partial body over `existing`, keeping read-only fields
pub fn merge_update<R: ClinicalRecord>(
    existing: &R,
    body: Value,
    now: DateTime<Utc>,
) -> Result<R, ApiError> {
    let mut changes = into_object(body)?;
    for key in R::READ_ONLY {
        changes.remove(*key);
    }

    let mut doc = serde_json::to_value(existing)?;
    json_patch::merge(&mut doc, &Value::Object(changes));
    doc["updatedAt"] = json!(now);

    decode(doc)
}

/// Apply a JSON Patch to `existing`; patches touching read-only fields fail
pub fn apply_patch<R: ClinicalRecord>(
    existing: &R,
    patch: &Patch,
    now: DateTime<Utc>,
) -> Result<R, ApiError> {
    let original = serde_json::to_value(existing)?;
    let mut doc = original.clone();
    json_patch::patch(&mut doc, patch)
        .map_err(|e| ApiError::BadRequest(format!("Failed to apply patch: {}", e)))?;

    for key in R::READ_ONLY {
        if doc.get(*key) != original.get(*key) {
            return Err(ApiError::BadRequest(format!("{} cannot be changed", key)));
        }
    }
    doc["updatedAt"] = json!(now);

    decode(doc)
}

fn into_object(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

fn decode<R: ClinicalRecord>(doc: Value) -> Result<R, ApiError> {
    let record: R = serde_json::from_value(doc)
        .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", R::LABEL, e)))?;
    record.validate()?;
    Ok(record)
}

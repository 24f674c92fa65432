use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialysisType {
    Hemodialysis,
    Peritoneal,
    /// Continuous renal replacement therapy
    Crrt,
}

/// One dialysis session
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DialysisRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub session_date: NaiveDate,
    pub dialysis_type: DialysisType,
    pub duration_minutes: i32,
    pub pre_weight_kg: Option<f64>,
    pub post_weight_kg: Option<f64>,
    pub ultrafiltration_ml: Option<i32>,
    /// Fistula, graft, catheter, ...
    pub vascular_access: Option<String>,
    pub complications: Option<String>,
    pub nurse: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DialysisRecord {
    /// Fluid removed, from the weight difference
    pub fn weight_loss_kg(&self) -> Option<f64> {
        Some(self.pre_weight_kg? - self.post_weight_kg?)
    }
}

impl ClinicalRecord for DialysisRecord {
    const TABLE: &'static str = "dialysis_records";
    const LABEL: &'static str = "Dialysis record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "session_date",
        "dialysis_type",
        "duration_minutes",
        "pre_weight_kg",
        "post_weight_kg",
        "ultrafiltration_ml",
        "vascular_access",
        "complications",
        "nurse",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] =
        &["vascular_access", "complications", "nurse"];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("sessionDate", "session_date"),
        ("dialysisType", "dialysis_type"),
        ("durationMinutes", "duration_minutes"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "session_date";
    const DEFAULT_SORT: &'static str = "session_date";

    fn id(&self) -> &str {
        &self.id
    }

    fn patient_id(&self) -> Option<&str> {
        Some(&self.patient_id)
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.patient_id.clone())
            .push_bind(self.session_date)
            .push_bind(self.dialysis_type)
            .push_bind(self.duration_minutes)
            .push_bind(self.pre_weight_kg)
            .push_bind(self.post_weight_kg)
            .push_bind(self.ultrafiltration_ml)
            .push_bind(self.vascular_access.clone())
            .push_bind(self.complications.clone())
            .push_bind(self.nurse.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .check(
                "durationMinutes",
                self.duration_minutes > 0,
                "must be greater than 0",
            )
            .range("preWeightKg", self.pre_weight_kg, 1.0, 400.0)
            .range("postWeightKg", self.post_weight_kg, 1.0, 400.0)
            .range("ultrafiltrationMl", self.ultrafiltration_ml, 0, 10_000)
            .finish()
    }
}

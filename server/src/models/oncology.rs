use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreatmentStatus {
    #[default]
    Active,
    Remission,
    Completed,
    Palliative,
    Discontinued,
}

/// Oncology case: diagnosis plus the current treatment course
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OncologyRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub diagnosis_date: NaiveDate,
    pub cancer_type: String,
    /// TNM or roman-numeral stage as recorded
    pub stage: Option<String>,
    pub tumor_site: Option<String>,
    pub treatment_plan: Option<String>,
    pub chemotherapy_regimen: Option<String>,
    pub cycle_number: Option<i32>,
    pub oncologist: Option<String>,
    #[serde(default)]
    pub status: TreatmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalRecord for OncologyRecord {
    const TABLE: &'static str = "oncology_records";
    const LABEL: &'static str = "Oncology record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "diagnosis_date",
        "cancer_type",
        "stage",
        "tumor_site",
        "treatment_plan",
        "chemotherapy_regimen",
        "cycle_number",
        "oncologist",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "cancer_type",
        "tumor_site",
        "stage",
        "chemotherapy_regimen",
        "oncologist",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("diagnosisDate", "diagnosis_date"),
        ("cancerType", "cancer_type"),
        ("stage", "stage"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "diagnosis_date";
    const DEFAULT_SORT: &'static str = "diagnosis_date";

    fn id(&self) -> &str {
        &self.id
    }

    fn patient_id(&self) -> Option<&str> {
        Some(&self.patient_id)
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.patient_id.clone())
            .push_bind(self.diagnosis_date)
            .push_bind(self.cancer_type.clone())
            .push_bind(self.stage.clone())
            .push_bind(self.tumor_site.clone())
            .push_bind(self.treatment_plan.clone())
            .push_bind(self.chemotherapy_regimen.clone())
            .push_bind(self.cycle_number)
            .push_bind(self.oncologist.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .not_blank("cancerType", &self.cancer_type)
            .range("cycleNumber", self.cycle_number, 1, 100)
            .check(
                "cycleNumber",
                self.cycle_number.is_none() || self.chemotherapy_regimen.is_some(),
                "requires a chemotherapy regimen",
            )
            .finish()
    }
}

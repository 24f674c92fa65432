use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrthopedicsRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub visit_date: NaiveDate,
    pub injury_type: String,
    pub affected_area: String,
    pub imaging_findings: Option<String>,
    pub treatment: Option<String>,
    #[serde(default)]
    pub surgery_required: bool,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalRecord for OrthopedicsRecord {
    const TABLE: &'static str = "orthopedics_records";
    const LABEL: &'static str = "Orthopedics record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "visit_date",
        "injury_type",
        "affected_area",
        "imaging_findings",
        "treatment",
        "surgery_required",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "injury_type",
        "affected_area",
        "imaging_findings",
        "treatment",
        "physician",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("visitDate", "visit_date"),
        ("injuryType", "injury_type"),
        ("affectedArea", "affected_area"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "visit_date";
    const DEFAULT_SORT: &'static str = "visit_date";

    fn id(&self) -> &str {
        &self.id
    }

    fn patient_id(&self) -> Option<&str> {
        Some(&self.patient_id)
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.patient_id.clone())
            .push_bind(self.visit_date)
            .push_bind(self.injury_type.clone())
            .push_bind(self.affected_area.clone())
            .push_bind(self.imaging_findings.clone())
            .push_bind(self.treatment.clone())
            .push_bind(self.surgery_required)
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .not_blank("injuryType", &self.injury_type)
            .not_blank("affectedArea", &self.affected_area)
            .finish()
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

/// Eye examination. Acuity is kept as written (`20/20`, `6/9`, `CF`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OphthalmologyRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub exam_date: NaiveDate,
    pub visual_acuity_left: Option<String>,
    pub visual_acuity_right: Option<String>,
    /// Intraocular pressure, mmHg
    pub iop_left: Option<f64>,
    pub iop_right: Option<f64>,
    pub findings: Option<String>,
    pub diagnosis: Option<String>,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalRecord for OphthalmologyRecord {
    const TABLE: &'static str = "ophthalmology_records";
    const LABEL: &'static str = "Ophthalmology record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "exam_date",
        "visual_acuity_left",
        "visual_acuity_right",
        "iop_left",
        "iop_right",
        "findings",
        "diagnosis",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &["findings", "diagnosis", "physician"];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("examDate", "exam_date"),
        ("iopLeft", "iop_left"),
        ("iopRight", "iop_right"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "exam_date";
    const DEFAULT_SORT: &'static str = "exam_date";

    fn id(&self) -> &str {
        &self.id
    }

    fn patient_id(&self) -> Option<&str> {
        Some(&self.patient_id)
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.patient_id.clone())
            .push_bind(self.exam_date)
            .push_bind(self.visual_acuity_left.clone())
            .push_bind(self.visual_acuity_right.clone())
            .push_bind(self.iop_left)
            .push_bind(self.iop_right)
            .push_bind(self.findings.clone())
            .push_bind(self.diagnosis.clone())
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .range("iopLeft", self.iop_left, 0.0, 80.0)
            .range("iopRight", self.iop_right, 0.0, 80.0)
            .finish()
    }
}

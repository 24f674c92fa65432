use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NeurologyRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub visit_date: NaiveDate,
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    /// Glasgow Coma Scale, 3 to 15
    pub gcs_score: Option<i32>,
    pub imaging_findings: Option<String>,
    pub eeg_findings: Option<String>,
    #[serde(default)]
    pub seizure_history: bool,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalRecord for NeurologyRecord {
    const TABLE: &'static str = "neurology_records";
    const LABEL: &'static str = "Neurology record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "visit_date",
        "chief_complaint",
        "diagnosis",
        "gcs_score",
        "imaging_findings",
        "eeg_findings",
        "seizure_history",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "chief_complaint",
        "diagnosis",
        "imaging_findings",
        "eeg_findings",
        "physician",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("visitDate", "visit_date"),
        ("gcsScore", "gcs_score"),
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
            .push_bind(self.chief_complaint.clone())
            .push_bind(self.diagnosis.clone())
            .push_bind(self.gcs_score)
            .push_bind(self.imaging_findings.clone())
            .push_bind(self.eeg_findings.clone())
            .push_bind(self.seizure_history)
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .not_blank("chiefComplaint", &self.chief_complaint)
            .range("gcsScore", self.gcs_score, 3, 15)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    #[test]
    fn test_gcs_bounds_and_binding() {
        let mut body = json!({
            "id": "n-1",
            "patientId": "p-1",
            "visitDate": "2024-04-10",
            "chiefComplaint": "Recurrent headaches",
            "gcsScore": 15,
            "createdAt": "2024-04-10T09:00:00Z",
            "updatedAt": "2024-04-10T09:00:00Z"
        });
        let ok: NeurologyRecord = serde_json::from_value(body.clone()).unwrap();
        assert!(ok.validate().is_ok());
        assert!(!ok.seizure_history);
        assert_eq!(bound_placeholders(&ok), NeurologyRecord::COLUMNS.len());

        body["gcsScore"] = json!(2);
        let low: NeurologyRecord = serde_json::from_value(body).unwrap();
        assert!(low.validate().is_err());
    }
}

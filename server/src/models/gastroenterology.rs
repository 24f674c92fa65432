use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GastroenterologyRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub procedure_date: NaiveDate,
    /// Endoscopy, colonoscopy, ERCP, ...
    pub procedure_type: String,
    pub indication: Option<String>,
    pub findings: Option<String>,
    #[serde(default)]
    pub biopsy_taken: bool,
    pub diagnosis: Option<String>,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalRecord for GastroenterologyRecord {
    const TABLE: &'static str = "gastroenterology_records";
    const LABEL: &'static str = "Gastroenterology record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "procedure_date",
        "procedure_type",
        "indication",
        "findings",
        "biopsy_taken",
        "diagnosis",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "procedure_type",
        "indication",
        "findings",
        "diagnosis",
        "physician",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("procedureDate", "procedure_date"),
        ("procedureType", "procedure_type"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "procedure_date";
    const DEFAULT_SORT: &'static str = "procedure_date";

    fn id(&self) -> &str {
        &self.id
    }

    fn patient_id(&self) -> Option<&str> {
        Some(&self.patient_id)
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.patient_id.clone())
            .push_bind(self.procedure_date)
            .push_bind(self.procedure_type.clone())
            .push_bind(self.indication.clone())
            .push_bind(self.findings.clone())
            .push_bind(self.biopsy_taken)
            .push_bind(self.diagnosis.clone())
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .not_blank("procedureType", &self.procedure_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    #[test]
    fn test_requires_procedure_type() {
        let r: GastroenterologyRecord = serde_json::from_value(json!({
            "id": "g-1",
            "patientId": "p-1",
            "procedureDate": "2024-03-03",
            "procedureType": " ",
            "biopsyTaken": true,
            "createdAt": "2024-03-03T09:00:00Z",
            "updatedAt": "2024-03-03T09:00:00Z"
        }))
        .unwrap();

        assert!(r.biopsy_taken);
        assert!(r.validate().is_err());
        assert_eq!(bound_placeholders(&r), GastroenterologyRecord::COLUMNS.len());
    }
}

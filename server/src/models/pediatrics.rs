use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

/// Well-child or sick visit with growth measurements
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PediatricsRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub visit_date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub head_circumference_cm: Option<f64>,
    pub immunizations_given: Option<String>,
    pub developmental_notes: Option<String>,
    pub diagnosis: Option<String>,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PediatricsRecord {
    /// Body mass index, when both weight and height were measured
    pub fn bmi(&self) -> Option<f64> {
        match (self.weight_kg, self.height_cm) {
            (Some(weight), Some(height)) if height > 0.0 => {
                let meters = height / 100.0;
                Some(weight / (meters * meters))
            }
            _ => None,
        }
    }
}

impl ClinicalRecord for PediatricsRecord {
    const TABLE: &'static str = "pediatrics_records";
    const LABEL: &'static str = "Pediatrics record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "visit_date",
        "weight_kg",
        "height_cm",
        "head_circumference_cm",
        "immunizations_given",
        "developmental_notes",
        "diagnosis",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "immunizations_given",
        "developmental_notes",
        "diagnosis",
        "physician",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("visitDate", "visit_date"),
        ("weightKg", "weight_kg"),
        ("heightCm", "height_cm"),
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
            .push_bind(self.weight_kg)
            .push_bind(self.height_cm)
            .push_bind(self.head_circumference_cm)
            .push_bind(self.immunizations_given.clone())
            .push_bind(self.developmental_notes.clone())
            .push_bind(self.diagnosis.clone())
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .range("weightKg", self.weight_kg, 0.2, 200.0)
            .range("heightCm", self.height_cm, 20.0, 220.0)
            .range("headCircumferenceCm", self.head_circumference_cm, 20.0, 70.0)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    #[test]
    fn test_growth_measurements() {
        let mut body = json!({
            "id": "pd-1",
            "patientId": "p-1",
            "visitDate": "2024-06-15",
            "weightKg": 20.0,
            "heightCm": 100.0,
            "createdAt": "2024-06-15T09:00:00Z",
            "updatedAt": "2024-06-15T09:00:00Z"
        });
        let r: PediatricsRecord = serde_json::from_value(body.clone()).unwrap();
        assert!(r.validate().is_ok());
        assert!((r.bmi().unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(bound_placeholders(&r), PediatricsRecord::COLUMNS.len());

        body["heightCm"] = json!(500.0);
        let tall: PediatricsRecord = serde_json::from_value(body).unwrap();
        assert!(tall.validate().is_err());
    }
}

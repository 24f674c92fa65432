use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

/// Pulmonology visit with spirometry results
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PulmonologyRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub visit_date: NaiveDate,
    /// Peripheral oxygen saturation, percent
    pub spo2: Option<i32>,
    /// Forced expiratory volume in one second, litres
    pub fev1: Option<f64>,
    /// Forced vital capacity, litres
    pub fvc: Option<f64>,
    /// Peak expiratory flow, L/min
    pub peak_flow: Option<f64>,
    pub smoking_status: Option<String>,
    pub findings: Option<String>,
    pub diagnosis: Option<String>,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PulmonologyRecord {
    /// FEV1/FVC ratio; below 0.7 suggests obstruction
    pub fn fev1_fvc_ratio(&self) -> Option<f64> {
        match (self.fev1, self.fvc) {
            (Some(fev1), Some(fvc)) if fvc > 0.0 => Some(fev1 / fvc),
            _ => None,
        }
    }
}

impl ClinicalRecord for PulmonologyRecord {
    const TABLE: &'static str = "pulmonology_records";
    const LABEL: &'static str = "Pulmonology record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "visit_date",
        "spo2",
        "fev1",
        "fvc",
        "peak_flow",
        "smoking_status",
        "findings",
        "diagnosis",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] =
        &["smoking_status", "findings", "diagnosis", "physician"];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("visitDate", "visit_date"),
        ("spo2", "spo2"),
        ("fev1", "fev1"),
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
            .push_bind(self.spo2)
            .push_bind(self.fev1)
            .push_bind(self.fvc)
            .push_bind(self.peak_flow)
            .push_bind(self.smoking_status.clone())
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
            .range("spo2", self.spo2, 0, 100)
            .range("fev1", self.fev1, 0.0, 10.0)
            .range("fvc", self.fvc, 0.0, 10.0)
            .range("peakFlow", self.peak_flow, 0.0, 1000.0)
            .check(
                "fev1",
                self.fev1_fvc_ratio().map_or(true, |ratio| ratio <= 1.0),
                "cannot exceed FVC",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    fn record(fev1: f64, fvc: f64) -> PulmonologyRecord {
        serde_json::from_value(json!({
            "id": "pl-1",
            "patientId": "p-1",
            "visitDate": "2024-01-09",
            "spo2": 95,
            "fev1": fev1,
            "fvc": fvc,
            "createdAt": "2024-01-09T09:00:00Z",
            "updatedAt": "2024-01-09T09:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_spirometry_ratio() {
        let r = record(2.1, 3.0);
        assert!((r.fev1_fvc_ratio().unwrap() - 0.7).abs() < 1e-9);
        assert!(r.validate().is_ok());
        assert!(record(3.5, 3.0).validate().is_err());
        assert_eq!(bound_placeholders(&r), PulmonologyRecord::COLUMNS.len());
    }
}

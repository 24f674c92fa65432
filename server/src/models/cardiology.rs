use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

/// Cardiology consult or follow-up visit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CardiologyRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub visit_date: NaiveDate,
    pub chief_complaint: String,
    pub diagnosis: Option<String>,
    /// Systolic/diastolic in mmHg, e.g. `120/80`
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<i32>,
    pub ecg_findings: Option<String>,
    /// Left ventricular ejection fraction, percent
    pub ejection_fraction: Option<f64>,
    pub procedure_performed: Option<String>,
    pub medications: Option<String>,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parse a `SYS/DIA` reading, returning both pressures
pub fn parse_blood_pressure(raw: &str) -> Option<(u16, u16)> {
    let (systolic, diastolic) = raw.trim().split_once('/')?;
    let systolic: u16 = systolic.trim().parse().ok()?;
    let diastolic: u16 = diastolic.trim().parse().ok()?;
    (systolic > diastolic && systolic <= 300 && diastolic > 0).then_some((systolic, diastolic))
}

impl ClinicalRecord for CardiologyRecord {
    const TABLE: &'static str = "cardiology_records";
    const LABEL: &'static str = "Cardiology record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "visit_date",
        "chief_complaint",
        "diagnosis",
        "blood_pressure",
        "heart_rate",
        "ecg_findings",
        "ejection_fraction",
        "procedure_performed",
        "medications",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "chief_complaint",
        "diagnosis",
        "ecg_findings",
        "procedure_performed",
        "physician",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("visitDate", "visit_date"),
        ("heartRate", "heart_rate"),
        ("ejectionFraction", "ejection_fraction"),
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
            .push_bind(self.blood_pressure.clone())
            .push_bind(self.heart_rate)
            .push_bind(self.ecg_findings.clone())
            .push_bind(self.ejection_fraction)
            .push_bind(self.procedure_performed.clone())
            .push_bind(self.medications.clone())
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .not_blank("chiefComplaint", &self.chief_complaint)
            .range("heartRate", self.heart_rate, 20, 300)
            .range("ejectionFraction", self.ejection_fraction, 0.0, 100.0)
            .check(
                "bloodPressure",
                self.blood_pressure
                    .as_deref()
                    .map_or(true, |bp| parse_blood_pressure(bp).is_some()),
                "must be systolic/diastolic, e.g. 120/80",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    fn record(overrides: serde_json::Value) -> CardiologyRecord {
        let mut body = json!({
            "id": "c-1",
            "patientId": "p-1",
            "visitDate": "2024-02-01",
            "chiefComplaint": "Chest pain on exertion",
            "createdAt": "2024-02-01T09:00:00Z",
            "updatedAt": "2024-02-01T09:00:00Z"
        });
        json_patch::merge(&mut body, &overrides);
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_parse_blood_pressure() {
        assert_eq!(parse_blood_pressure("120/80"), Some((120, 80)));
        assert_eq!(parse_blood_pressure(" 145 / 95 "), Some((145, 95)));
        assert_eq!(parse_blood_pressure("80/120"), None);
        assert_eq!(parse_blood_pressure("high"), None);
    }

    #[test]
    fn test_validation() {
        assert!(record(json!({})).validate().is_ok());
        assert!(record(json!({ "heartRate": 12 })).validate().is_err());
        assert!(record(json!({ "ejectionFraction": 130.0 })).validate().is_err());
        assert!(record(json!({ "bloodPressure": "120-80" })).validate().is_err());
    }

    #[test]
    fn test_columns_match_bind_count() {
        let r = record(json!({}));
        assert_eq!(r.status, VisitStatus::Scheduled);
        assert_eq!(bound_placeholders(&r), CardiologyRecord::COLUMNS.len());
    }
}

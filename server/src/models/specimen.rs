use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator};

/// Prefix shared by every specimen barcode
pub const BARCODE_PREFIX: &str = "SP";
/// Width of the zero-padded daily sequence
pub const SEQUENCE_WIDTH: usize = 4;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecimenPriority {
    #[default]
    Routine,
    Urgent,
    Stat,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpecimenStatus {
    #[default]
    Collected,
    InTransit,
    Received,
    Processing,
    Completed,
    Rejected,
}

impl SpecimenStatus {
    /// Completed and rejected specimens need no further lab work
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }
}

/// Laboratory specimen, identified on the bench by its barcode
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Specimen {
    pub id: String,
    pub barcode: String,
    pub patient_id: String,
    /// Blood, urine, tissue, swab, ...
    pub specimen_type: String,
    pub test_requested: String,
    #[serde(default)]
    pub priority: SpecimenPriority,
    #[serde(deserialize_with = "coerce::timestamp")]
    pub collected_at: DateTime<Utc>,
    pub collected_by: Option<String>,
    #[serde(default, deserialize_with = "coerce::option_timestamp")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: SpecimenStatus,
    pub result: Option<String>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `SP` followed by the day as `YYMMDD`
pub fn barcode_prefix(day: NaiveDate) -> String {
    format!("{}{}", BARCODE_PREFIX, day.format("%y%m%d"))
}

/// Barcode following the highest sequence already issued under `prefix`
pub fn next_barcode(prefix: &str, highest: Option<i64>) -> String {
    let next = highest.unwrap_or(0).max(0) + 1;
    format!("{}{:0width$}", prefix, next, width = SEQUENCE_WIDTH)
}

impl ClinicalRecord for Specimen {
    const TABLE: &'static str = "specimens";
    const LABEL: &'static str = "Specimen";
    const COLUMNS: &'static [&'static str] = &[
        "barcode",
        "patient_id",
        "specimen_type",
        "test_requested",
        "priority",
        "collected_at",
        "collected_by",
        "received_at",
        "status",
        "result",
        "rejection_reason",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "barcode",
        "specimen_type",
        "test_requested",
        "collected_by",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("barcode", "barcode"),
        ("collectedAt", "collected_at"),
        ("receivedAt", "received_at"),
        ("priority", "priority"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "collected_at";
    const DEFAULT_SORT: &'static str = "collected_at";
    const READ_ONLY: &'static [&'static str] = &["id", "barcode", "createdAt", "updatedAt"];

    fn id(&self) -> &str {
        &self.id
    }

    fn patient_id(&self) -> Option<&str> {
        Some(&self.patient_id)
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.barcode.clone())
            .push_bind(self.patient_id.clone())
            .push_bind(self.specimen_type.clone())
            .push_bind(self.test_requested.clone())
            .push_bind(self.priority)
            .push_bind(self.collected_at)
            .push_bind(self.collected_by.clone())
            .push_bind(self.received_at)
            .push_bind(self.status)
            .push_bind(self.result.clone())
            .push_bind(self.rejection_reason.clone())
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        Validator::new()
            .not_blank("specimenType", &self.specimen_type)
            .not_blank("testRequested", &self.test_requested)
            .check(
                "receivedAt",
                self.received_at.map_or(true, |at| at >= self.collected_at),
                "must not precede collectedAt",
            )
            .check(
                "rejectionReason",
                self.status != SpecimenStatus::Rejected
                    || self
                        .rejection_reason
                        .as_deref()
                        .map_or(false, |r| !r.trim().is_empty()),
                "is required when the specimen is rejected",
            )
            .check(
                "result",
                self.result.is_none() || self.status == SpecimenStatus::Completed,
                "can only be recorded on completed specimens",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    fn specimen(overrides: serde_json::Value) -> Specimen {
        let mut body = json!({
            "id": "s-1",
            "barcode": "SP2401150001",
            "patientId": "p-1",
            "specimenType": "Blood",
            "testRequested": "CBC",
            "collectedAt": "2024-01-15T08:30:00Z",
            "createdAt": "2024-01-15T08:31:00Z",
            "updatedAt": "2024-01-15T08:31:00Z"
        });
        json_patch::merge(&mut body, &overrides);
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_barcode_format() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let prefix = barcode_prefix(day);
        assert_eq!(prefix, "SP240115");
        assert_eq!(next_barcode(&prefix, None), "SP2401150001");
        assert_eq!(next_barcode(&prefix, Some(41)), "SP2401150042");
        assert_eq!(next_barcode(&prefix, Some(9999)), "SP24011510000");
    }

    #[test]
    fn test_defaults() {
        let s = specimen(json!({}));
        assert_eq!(s.priority, SpecimenPriority::Routine);
        assert_eq!(s.status, SpecimenStatus::Collected);
        assert!(s.validate().is_ok());
        assert_eq!(bound_placeholders(&s), Specimen::COLUMNS.len());
    }

    #[test]
    fn test_collected_at_accepts_plain_date() {
        let s = specimen(json!({ "collectedAt": "2024-01-15" }));
        assert_eq!(s.collected_at.to_rfc3339(), "2024-01-15T00:00:00+00:00");
    }

    #[test]
    fn test_rejection_needs_reason() {
        assert!(specimen(json!({ "status": "REJECTED" })).validate().is_err());
        assert!(specimen(json!({ "status": "REJECTED", "rejectionReason": "Hemolyzed" }))
            .validate()
            .is_ok());
        assert!(SpecimenStatus::Rejected.is_final());
        assert!(!SpecimenStatus::Processing.is_final());
    }

    #[test]
    fn test_received_before_collected_is_invalid() {
        let s = specimen(json!({ "receivedAt": "2024-01-14T08:00:00Z" }));
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_result_only_on_completed() {
        assert!(specimen(json!({ "result": "Normal" })).validate().is_err());
        assert!(specimen(json!({ "result": "Normal", "status": "COMPLETED" }))
            .validate()
            .is_ok());
    }
}

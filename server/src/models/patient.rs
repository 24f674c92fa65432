use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unknown,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatientStatus {
    #[default]
    Active,
    Inactive,
    Deceased,
}

/// Patient registry entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    /// Medical record number, unique across the registry
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(deserialize_with = "coerce::date")]
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub status: PatientStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

impl ClinicalRecord for Patient {
    const TABLE: &'static str = "patients";
    const LABEL: &'static str = "Patient";
    const COLUMNS: &'static [&'static str] = &[
        "mrn",
        "first_name",
        "last_name",
        "date_of_birth",
        "gender",
        "phone",
        "email",
        "address",
        "blood_type",
        "allergies",
        "emergency_contact",
        "status",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &[
        "mrn",
        "first_name",
        "last_name",
        "first_name || ' ' || last_name",
        "phone",
        "email",
    ];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("mrn", "mrn"),
        ("firstName", "first_name"),
        ("lastName", "last_name"),
        ("dateOfBirth", "date_of_birth"),
        ("status", "status"),
    ];
    const DATE_COLUMN: &'static str = "created_at";
    const DEFAULT_SORT: &'static str = "created_at";
    const PATIENT_SCOPED: bool = false;

    fn id(&self) -> &str {
        &self.id
    }

    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>) {
        row.push_bind(self.mrn.clone())
            .push_bind(self.first_name.clone())
            .push_bind(self.last_name.clone())
            .push_bind(self.date_of_birth)
            .push_bind(self.gender)
            .push_bind(self.phone.clone())
            .push_bind(self.email.clone())
            .push_bind(self.address.clone())
            .push_bind(self.blood_type.clone())
            .push_bind(self.allergies.clone())
            .push_bind(self.emergency_contact.clone())
            .push_bind(self.status)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        let today = Utc::now().date_naive();
        Validator::new()
            .not_blank("mrn", &self.mrn)
            .not_blank("firstName", &self.first_name)
            .not_blank("lastName", &self.last_name)
            .check(
                "dateOfBirth",
                self.date_of_birth <= today,
                "must not be in the future",
            )
            .check(
                "email",
                self.email.as_deref().map_or(true, |e| e.contains('@')),
                "must be a valid email address",
            )
            .check(
                "bloodType",
                self.blood_type
                    .as_deref()
                    .map_or(true, |b| BLOOD_TYPES.contains(&b)),
                "must be one of A+, A-, B+, B-, AB+, AB-, O+, O-",
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::bound_placeholders;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "id": "p-1",
            "mrn": "MRN-0001",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "dateOfBirth": "1985-12-10",
            "gender": "FEMALE",
            "bloodType": "O+",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_defaults_to_active() {
        let patient: Patient = serde_json::from_value(sample()).unwrap();
        assert_eq!(patient.status, PatientStatus::Active);
        assert!(patient.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_blood_type_and_future_birth() {
        let mut body = sample();
        body["bloodType"] = json!("C+");
        body["dateOfBirth"] = json!("2999-01-01");
        let patient: Patient = serde_json::from_value(body).unwrap();

        match patient.validate() {
            Err(ApiError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["dateOfBirth", "bloodType"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_columns_match_bind_count() {
        let patient: Patient = serde_json::from_value(sample()).unwrap();
        assert_eq!(bound_placeholders(&patient), Patient::COLUMNS.len());
    }
}

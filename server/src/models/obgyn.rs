use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_builder::Separated, FromRow, Sqlite};

use super::error::ApiError;
use super::record::{coerce, ClinicalRecord, Validator, VisitStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObgynVisitType {
    Prenatal,
    Postnatal,
    Gynecology,
    FamilyPlanning,
}

/// Obstetrics and gynecology visit.
///
/// Pregnancy fields (`gestationalAgeWeeks`, `expectedDeliveryDate`,
/// `fetalHeartRate`) only make sense for prenatal visits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ObgynRecord {
    pub id: String,
    pub patient_id: String,
    #[serde(deserialize_with = "coerce::date")]
    pub visit_date: NaiveDate,
    pub visit_type: ObgynVisitType,
    pub gestational_age_weeks: Option<i32>,
    pub gravida: Option<i32>,
    pub para: Option<i32>,
    #[serde(default, deserialize_with = "coerce::option_date")]
    pub expected_delivery_date: Option<NaiveDate>,
    pub fetal_heart_rate: Option<i32>,
    pub findings: Option<String>,
    pub physician: Option<String>,
    #[serde(default)]
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClinicalRecord for ObgynRecord {
    const TABLE: &'static str = "obgyn_records";
    const LABEL: &'static str = "OB/GYN record";
    const COLUMNS: &'static [&'static str] = &[
        "patient_id",
        "visit_date",
        "visit_type",
        "gestational_age_weeks",
        "gravida",
        "para",
        "expected_delivery_date",
        "fetal_heart_rate",
        "findings",
        "physician",
        "status",
        "notes",
        "created_at",
        "updated_at",
    ];
    const SEARCHABLE: &'static [&'static str] = &["visit_type", "findings", "physician"];
    const SORTABLE: &'static [(&'static str, &'static str)] = &[
        ("visitDate", "visit_date"),
        ("visitType", "visit_type"),
        ("gestationalAgeWeeks", "gestational_age_weeks"),
        ("expectedDeliveryDate", "expected_delivery_date"),
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
            .push_bind(self.visit_type)
            .push_bind(self.gestational_age_weeks)
            .push_bind(self.gravida)
            .push_bind(self.para)
            .push_bind(self.expected_delivery_date)
            .push_bind(self.fetal_heart_rate)
            .push_bind(self.findings.clone())
            .push_bind(self.physician.clone())
            .push_bind(self.status)
            .push_bind(self.notes.clone())
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn validate(&self) -> Result<(), ApiError> {
        let prenatal = self.visit_type == ObgynVisitType::Prenatal;
        Validator::new()
            .range("gestationalAgeWeeks", self.gestational_age_weeks, 0, 45)
            .range("gravida", self.gravida, 0, 30)
            .range("para", self.para, 0, 30)
            .range("fetalHeartRate", self.fetal_heart_rate, 60, 220)
            .check(
                "para",
                match (self.gravida, self.para) {
                    (Some(g), Some(p)) => p <= g,
                    _ => true,
                },
                "cannot exceed gravida",
            )
            .check(
                "gestationalAgeWeeks",
                prenatal || self.gestational_age_weeks.is_none(),
                "only applies to prenatal visits",
            )
            .check(
                "expectedDeliveryDate",
                self.expected_delivery_date
                    .map_or(true, |due| due >= self.visit_date),
                "must not precede the visit date",
            )
            .finish()
    }
}

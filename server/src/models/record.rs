use std::fmt::Display;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{query_builder::Separated, sqlite::SqliteRow, FromRow, Sqlite};

use super::error::{ApiError, FieldError};

/// Fields owned by the server, never accepted from a request body
pub const SERVER_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

/// A row type stored in one table and served under one `/api/{module}` prefix.
///
/// Implementors are plain structs deriving `Serialize`, `Deserialize` (camelCase)
/// and `FromRow` (snake_case columns). The repository and handlers are generic
/// over this trait, so a module only declares its table layout and validation.
pub trait ClinicalRecord:
    Serialize + DeserializeOwned + for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static
{
    /// Backing table
    const TABLE: &'static str;
    /// Human readable name used in messages
    const LABEL: &'static str;
    /// Every column except `id`, in the order `bind_columns` pushes values
    const COLUMNS: &'static [&'static str];
    /// SQL expressions matched by the free-text `search` filter
    const SEARCHABLE: &'static [&'static str];
    /// API sort key to column, in addition to `createdAt` / `updatedAt`
    const SORTABLE: &'static [(&'static str, &'static str)];
    /// Column used by `dateFrom` / `dateTo`
    const DATE_COLUMN: &'static str;
    /// Column used when no `sortBy` is given
    const DEFAULT_SORT: &'static str;
    /// Body fields clients may not change after creation
    const READ_ONLY: &'static [&'static str] = SERVER_FIELDS;
    /// Whether rows belong to a patient (enables `patientId` filtering)
    const PATIENT_SCOPED: bool = true;

    fn id(&self) -> &str;

    fn patient_id(&self) -> Option<&str> {
        None
    }

    /// Push one bound value per entry of `COLUMNS`, in the same order
    fn bind_columns<'args>(&self, row: &mut Separated<'_, 'args, Sqlite, &'static str>);

    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Status shared by visit and procedure records
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisitStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// Collects field errors and turns them into a single `ApiError::Validation`
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error unless `ok` holds
    pub fn check(&mut self, field: &str, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    /// Required text must contain something other than whitespace
    pub fn not_blank(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(field, !value.trim().is_empty(), "must not be blank")
    }

    /// Optional value must fall inside `min..=max` when present
    pub fn range<T>(&mut self, field: &str, value: Option<T>, min: T, max: T) -> &mut Self
    where
        T: PartialOrd + Display + Copy,
    {
        match value {
            Some(v) => self.check(
                field,
                v >= min && v <= max,
                format!("must be between {} and {}", min, max),
            ),
            None => self,
        }
    }

    pub fn finish(&mut self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Lenient date and timestamp deserializers for form input.
///
/// Dates accept `YYYY-MM-DD` or any full timestamp (the date part is kept).
/// Timestamps accept RFC 3339, `datetime-local` values (read as UTC) or a
/// bare date (midnight UTC). Optional variants read `null` and `""` as absent.
pub mod coerce {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Ok(Utc.from_utc_datetime(&naive));
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|day| Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN)))
            .map_err(|_| format!("invalid timestamp '{}'", raw))
    }

    pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| parse_timestamp(raw).map(|ts| ts.date_naive()))
            .map_err(|_| format!("invalid date '{}'", raw))
    }

    fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
    }

    pub fn date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw).map_err(de::Error::custom)
    }

    pub fn option_date<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        optional(deserializer)?
            .map(|raw| parse_date(&raw).map_err(de::Error::custom))
            .transpose()
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).map_err(de::Error::custom)
    }

    pub fn option_timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        optional(deserializer)?
            .map(|raw| parse_timestamp(&raw).map_err(de::Error::custom))
            .transpose()
    }
}

/// Number of placeholders `bind_columns` emits, for checking against `COLUMNS`
#[cfg(test)]
pub(crate) fn bound_placeholders<R: ClinicalRecord>(record: &R) -> usize {
    let mut qb = sqlx::QueryBuilder::<Sqlite>::new("");
    {
        let mut row = qb.separated(", ");
        record.bind_columns(&mut row);
    }
    qb.sql().matches('?').count()
}

use std::borrow::Cow;
use std::marker::PhantomData;
use std::str::FromStr;

use chrono::NaiveDate;
use sqlx::sqlite::SqlitePool;
use sqlx::{Executor, QueryBuilder, Sqlite};

use crate::models::{ApiError, ClinicalRecord};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Sort keys available on every table
const COMMON_SORTABLE: &[(&str, &str)] = &[("createdAt", "created_at"), ("updatedAt", "updated_at")];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    const fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("invalid sort order '{}', expected asc or desc", other)),
        }
    }
}

/// List filters, sorting and pagination with `Cow` for borrowed query input
#[derive(Debug, Clone)]
pub struct ListParams<'a> {
    pub page: u32,
    pub limit: u32,
    pub search: Option<Cow<'a, str>>,
    pub status: Option<Cow<'a, str>>,
    pub patient_id: Option<Cow<'a, str>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub sort_by: Option<Cow<'a, str>>,
    pub sort_order: SortOrder,
}

impl<'a> ListParams<'a> {
    /// First page, default page size, newest first
    pub fn new() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            search: None,
            status: None,
            patient_id: None,
            date_from: None,
            date_to: None,
            sort_by: None,
            sort_order: SortOrder::default(),
        }
    }

    /// Set page, pages start at 1
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Set page size, clamped to `1..=MAX_PAGE_SIZE`
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_search<S: Into<Cow<'a, str>>>(mut self, search: S) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_status<S: Into<Cow<'a, str>>>(mut self, status: S) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_patient_id<S: Into<Cow<'a, str>>>(mut self, patient_id: S) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn with_sort<S: Into<Cow<'a, str>>>(mut self, sort_by: S, order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = order;
        self
    }

    pub fn with_sort_order(mut self, order: SortOrder) -> Self {
        self.sort_order = order;
        self
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl<'a> Default for ListParams<'a> {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of rows plus the number of rows matching the filters
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub items: Vec<R>,
    pub total: i64,
}

/// Data access for one record table
pub struct Repository<R> {
    pool: SqlitePool,
    record: PhantomData<fn() -> R>,
}

impl<R: ClinicalRecord> Repository<R> {
    /// Create new repository instance
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            record: PhantomData,
        }
    }

    /// Filtered, sorted page plus total; both queries run concurrently
    pub async fn list(&self, params: &ListParams<'_>) -> Result<Page<R>, ApiError> {
        let order_column = sort_column::<R>(params.sort_by.as_deref())?;
        let direction = params.sort_order.keyword();

        let mut rows_query = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", R::TABLE));
        push_filters::<R>(&mut rows_query, params);
        rows_query
            .push(format!(
                " ORDER BY {} {}, rowid {}",
                order_column, direction, direction
            ))
            .push(" LIMIT ")
            .push_bind(i64::from(params.limit))
            .push(" OFFSET ")
            .push_bind(params.offset());

        let mut count_query =
            QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", R::TABLE));
        push_filters::<R>(&mut count_query, params);

        let (items, total) = tokio::try_join!(
            rows_query.build_query_as::<R>().fetch_all(&self.pool),
            count_query
                .build_query_scalar::<i64>()
                .fetch_one(&self.pool),
        )?;

        Ok(Page { items, total })
    }

    pub async fn find(&self, id: &str) -> Result<Option<R>, sqlx::Error> {
        self.find_by("id", id).await
    }

    /// Fetch by id, failing with 404 when absent
    pub async fn get(&self, id: &str) -> Result<R, ApiError> {
        self.find(id)
            .await?
            .ok_or_else(|| ApiError::not_found(R::LABEL, id))
    }

    /// Fetch the first row whose `column` equals `value`
    pub async fn find_by(&self, column: &'static str, value: &str) -> Result<Option<R>, sqlx::Error> {
        let sql = format!("SELECT * FROM {} WHERE {} = ? LIMIT 1", R::TABLE, column);
        sqlx::query_as::<_, R>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert(&self, record: &R) -> Result<(), sqlx::Error> {
        insert_record(&self.pool, record).await
    }

    /// Overwrite every column of an existing row; false when the row is gone
    pub async fn update(&self, record: &R) -> Result<bool, sqlx::Error> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "UPDATE {} SET ({}) = (",
            R::TABLE,
            R::COLUMNS.join(", ")
        ));
        {
            let mut row = query.separated(", ");
            record.bind_columns(&mut row);
        }
        query
            .push(") WHERE id = ")
            .push_bind(record.id().to_string());

        let result = query.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, sqlx::Error> {
        let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Row count per status value
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>, sqlx::Error> {
        let sql = format!(
            "SELECT status, COUNT(*) FROM {} GROUP BY status ORDER BY status",
            R::TABLE
        );
        sqlx::query_as::<_, (String, i64)>(&sql)
            .fetch_all(&self.pool)
            .await
    }
}

/// Insert a record through any executor (pool or open transaction)
pub async fn insert_record<'e, R, E>(executor: E, record: &R) -> Result<(), sqlx::Error>
where
    R: ClinicalRecord,
    E: Executor<'e, Database = Sqlite>,
{
    let mut query = QueryBuilder::<Sqlite>::new(format!(
        "INSERT INTO {} (id, {}) VALUES (",
        R::TABLE,
        R::COLUMNS.join(", ")
    ));
    {
        let mut row = query.separated(", ");
        row.push_bind(record.id().to_string());
        record.bind_columns(&mut row);
    }
    query.push(")");

    query.build().execute(executor).await?;
    Ok(())
}

pub async fn patient_exists(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Rows in `table`, optionally limited to one patient
pub async fn count_rows(
    pool: &SqlitePool,
    table: &'static str,
    patient_id: Option<&str>,
) -> Result<i64, sqlx::Error> {
    let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", table));
    if let Some(patient_id) = patient_id {
        query.push(" WHERE patient_id = ").push_bind(patient_id.to_string());
    }
    query.build_query_scalar::<i64>().fetch_one(pool).await
}

/// Rows in `table` created on `day` (UTC)
pub async fn count_created_on(
    pool: &SqlitePool,
    table: &'static str,
    day: NaiveDate,
) -> Result<i64, sqlx::Error> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE date(created_at) = ?", table);
    sqlx::query_scalar::<_, i64>(&sql)
        .bind(day)
        .fetch_one(pool)
        .await
}

/// Resolve an API sort key to a column, rejecting anything not whitelisted
fn sort_column<R: ClinicalRecord>(sort_by: Option<&str>) -> Result<&'static str, ApiError> {
    let Some(key) = sort_by.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok(R::DEFAULT_SORT);
    };

    R::SORTABLE
        .iter()
        .chain(COMMON_SORTABLE)
        .find(|(name, _)| *name == key)
        .map(|(_, column)| *column)
        .ok_or_else(|| ApiError::BadRequest(format!("Cannot sort {} by '{}'", R::LABEL, key)))
}

/// `%term%` with LIKE wildcards in the term escaped by `\`
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filters<R: ClinicalRecord>(query: &mut QueryBuilder<'_, Sqlite>, params: &ListParams<'_>) {
    query.push(" WHERE 1 = 1");

    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty());
    if let Some(term) = search {
        if !R::SEARCHABLE.is_empty() {
            let pattern = like_pattern(term);
            query.push(" AND (");
            for (i, expr) in R::SEARCHABLE.iter().enumerate() {
                if i > 0 {
                    query.push(" OR ");
                }
                query
                    .push("(")
                    .push(*expr)
                    .push(") LIKE ")
                    .push_bind(pattern.clone())
                    .push(" ESCAPE '\\'");
            }
            query.push(")");
        }
    }

    if let Some(status) = params.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query
            .push(" AND status = ")
            .push_bind(status.to_ascii_uppercase());
    }

    if R::PATIENT_SCOPED {
        if let Some(patient_id) = params.patient_id.as_deref() {
            query
                .push(" AND patient_id = ")
                .push_bind(patient_id.to_string());
        }
    }

    if let Some(from) = params.date_from {
        query
            .push(format!(" AND date({}) >= ", R::DATE_COLUMN))
            .push_bind(from);
    }
    if let Some(to) = params.date_to {
        query
            .push(format!(" AND date({}) <= ", R::DATE_COLUMN))
            .push_bind(to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{run_migrations, DbConfig};
    use crate::models::{CardiologyRecord, Patient, VisitStatus};
    use serde_json::json;

    async fn setup_test_db() -> SqlitePool {
        let pool = DbConfig::in_memory()
            .connect()
            .await
            .expect("Failed to open test database");
        run_migrations(&pool).await.expect("Failed to migrate");
        pool
    }

    fn create_test_patient(n: usize, first: &str, last: &str) -> Patient {
        serde_json::from_value(json!({
            "id": format!("patient-{:03}", n),
            "mrn": format!("MRN-{:05}", n),
            "firstName": first,
            "lastName": last,
            "dateOfBirth": "1980-01-01",
            "gender": "UNKNOWN",
            "createdAt": format!("2024-01-{:02}T10:00:00Z", (n % 28) + 1),
            "updatedAt": "2024-02-01T10:00:00Z"
        }))
        .unwrap()
    }

    fn create_test_visit(id: &str, patient_id: &str, date: &str, status: &str) -> CardiologyRecord {
        serde_json::from_value(json!({
            "id": id,
            "patientId": patient_id,
            "visitDate": date,
            "chiefComplaint": "Palpitations",
            "diagnosis": "Atrial fibrillation",
            "status": status,
            "createdAt": "2024-03-01T10:00:00Z",
            "updatedAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let pool = setup_test_db().await;
        let repo = Repository::<Patient>::new(pool);
        let patient = create_test_patient(1, "Ada", "Lovelace");
        repo.insert(&patient).await.unwrap();

        let found = repo.find("patient-001").await.unwrap().unwrap();
        assert_eq!(found.mrn, "MRN-00001");
        assert_eq!(found.date_of_birth, patient.date_of_birth);
        assert_eq!(found.created_at, patient.created_at);

        assert!(repo.find("missing").await.unwrap().is_none());
        assert!(matches!(repo.get("missing").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pagination_and_total() {
        let pool = setup_test_db().await;
        let repo = Repository::<Patient>::new(pool);
        for n in 0..15 {
            repo.insert(&create_test_patient(n, "Test", &format!("Patient{}", n)))
                .await
                .unwrap();
        }

        let first = repo.list(&ListParams::new()).await.unwrap();
        assert_eq!(first.total, 15);
        assert_eq!(first.items.len(), 10);

        let second = repo.list(&ListParams::new().with_page(2)).await.unwrap();
        assert_eq!(second.total, 15);
        assert_eq!(second.items.len(), 5);

        let beyond = repo.list(&ListParams::new().with_page(9)).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 15);
    }

    #[tokio::test]
    async fn test_search_matches_full_name_case_insensitively() {
        let pool = setup_test_db().await;
        let repo = Repository::<Patient>::new(pool);
        repo.insert(&create_test_patient(1, "Ada", "Lovelace")).await.unwrap();
        repo.insert(&create_test_patient(2, "Alan", "Turing")).await.unwrap();

        let page = repo
            .list(&ListParams::new().with_search("ada love"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].last_name, "Lovelace");

        let by_mrn = repo
            .list(&ListParams::new().with_search("mrn-00002"))
            .await
            .unwrap();
        assert_eq!(by_mrn.items[0].first_name, "Alan");

        // wildcards in the term are literal
        let wildcard = repo.list(&ListParams::new().with_search("%")).await.unwrap();
        assert_eq!(wildcard.total, 0);
    }

    #[tokio::test]
    async fn test_sorting() {
        let pool = setup_test_db().await;
        let repo = Repository::<Patient>::new(pool);
        repo.insert(&create_test_patient(1, "Ada", "Lovelace")).await.unwrap();
        repo.insert(&create_test_patient(2, "Alan", "Turing")).await.unwrap();
        repo.insert(&create_test_patient(3, "Grace", "Hopper")).await.unwrap();

        let asc = repo
            .list(&ListParams::new().with_sort("lastName", SortOrder::Asc))
            .await
            .unwrap();
        let names: Vec<_> = asc.items.iter().map(|p| p.last_name.as_str()).collect();
        assert_eq!(names, vec!["Hopper", "Lovelace", "Turing"]);

        // default: newest createdAt first
        let default = repo.list(&ListParams::new()).await.unwrap();
        assert_eq!(default.items[0].last_name, "Hopper");

        let invalid = repo
            .list(&ListParams::new().with_sort("password", SortOrder::Asc))
            .await;
        assert!(matches!(invalid, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_status_patient_and_date_filters() {
        let pool = setup_test_db().await;
        let patients = Repository::<Patient>::new(pool.clone());
        patients.insert(&create_test_patient(1, "Ada", "Lovelace")).await.unwrap();
        patients.insert(&create_test_patient(2, "Alan", "Turing")).await.unwrap();

        let visits = Repository::<CardiologyRecord>::new(pool.clone());
        visits
            .insert(&create_test_visit("v1", "patient-001", "2024-01-10", "COMPLETED"))
            .await
            .unwrap();
        visits
            .insert(&create_test_visit("v2", "patient-001", "2024-02-10", "SCHEDULED"))
            .await
            .unwrap();
        visits
            .insert(&create_test_visit("v3", "patient-002", "2024-03-10", "COMPLETED"))
            .await
            .unwrap();

        let completed = visits
            .list(&ListParams::new().with_status("completed"))
            .await
            .unwrap();
        assert_eq!(completed.total, 2);
        assert!(completed
            .items
            .iter()
            .all(|v| v.status == VisitStatus::Completed));

        let for_ada = visits
            .list(&ListParams::new().with_patient_id("patient-001"))
            .await
            .unwrap();
        assert_eq!(for_ada.total, 2);

        let february = visits
            .list(&ListParams::new().with_date_range(
                NaiveDate::from_ymd_opt(2024, 2, 1),
                NaiveDate::from_ymd_opt(2024, 3, 10),
            ))
            .await
            .unwrap();
        let ids: Vec<_> = february.items.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v3", "v2"]);

        let counts = visits.status_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![("COMPLETED".to_string(), 2), ("SCHEDULED".to_string(), 1)]
        );
        assert_eq!(
            count_rows(&pool, CardiologyRecord::TABLE, Some("patient-002"))
                .await
                .unwrap(),
            1
        );
        assert_eq!(count_rows(&pool, CardiologyRecord::TABLE, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let pool = setup_test_db().await;
        let repo = Repository::<Patient>::new(pool);
        let mut patient = create_test_patient(1, "Ada", "Lovelace");
        repo.insert(&patient).await.unwrap();

        patient.phone = Some("+44 20 7946 0000".to_string());
        assert!(repo.update(&patient).await.unwrap());
        let stored = repo.get("patient-001").await.unwrap();
        assert_eq!(stored.phone.as_deref(), Some("+44 20 7946 0000"));

        assert!(repo.delete("patient-001").await.unwrap());
        assert!(!repo.delete("patient-001").await.unwrap());
        assert!(!repo.update(&patient).await.unwrap());
    }

    #[tokio::test]
    async fn test_constraint_violations_map_to_conflict() {
        let pool = setup_test_db().await;
        let patients = Repository::<Patient>::new(pool.clone());
        patients.insert(&create_test_patient(1, "Ada", "Lovelace")).await.unwrap();

        let mut duplicate = create_test_patient(2, "Other", "Person");
        duplicate.mrn = "MRN-00001".to_string();
        let err: ApiError = patients.insert(&duplicate).await.unwrap_err().into();
        assert!(matches!(err, ApiError::Conflict(_)));

        let visits = Repository::<CardiologyRecord>::new(pool);
        visits
            .insert(&create_test_visit("v1", "patient-001", "2024-01-10", "SCHEDULED"))
            .await
            .unwrap();
        let err: ApiError = patients.delete("patient-001").await.unwrap_err().into();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert!(patients.find("patient-001").await.unwrap().is_some());

        assert!(visits.delete("v1").await.unwrap());
        assert!(patients.delete("patient-001").await.unwrap());
    }

    #[tokio::test]
    async fn test_restrict_reference_maps_to_conflict() {
        let pool = DbConfig::in_memory().connect().await.unwrap();
        for sql in [
            "CREATE TABLE wards (id TEXT PRIMARY KEY)",
            "CREATE TABLE beds (id TEXT PRIMARY KEY, ward_id TEXT REFERENCES wards (id) ON DELETE RESTRICT)",
            "INSERT INTO wards (id) VALUES ('w1')",
            "INSERT INTO beds (id, ward_id) VALUES ('b1', 'w1')",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }

        let err: ApiError = sqlx::query("DELETE FROM wards WHERE id = 'w1'")
            .execute(&pool)
            .await
            .unwrap_err()
            .into();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_list_params_clamping() {
        let params = ListParams::new().with_page(0).with_limit(1000);
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, MAX_PAGE_SIZE);
        assert_eq!(ListParams::new().with_page(3).with_limit(20).offset(), 40);
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}

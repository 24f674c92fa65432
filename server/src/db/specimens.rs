use sqlx::sqlite::{SqliteConnection, SqlitePool};

use super::repository::insert_record;
use crate::models::specimen::{barcode_prefix, next_barcode};
use crate::models::{ApiError, Specimen};

/// Attempts before a busy database or barcode collision is reported
const MAX_BARCODE_ATTEMPTS: u32 = 5;

/// Highest daily sequence already issued under `prefix`
async fn highest_sequence(
    conn: &mut SqliteConnection,
    prefix: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(CAST(substr(barcode, ?) AS INTEGER)) FROM specimens WHERE barcode LIKE ?",
    )
    .bind(prefix.len() as i64 + 1)
    .bind(format!("{}%", prefix))
    .fetch_one(conn)
    .await
}

/// Assign the next barcode for the specimen's creation day and insert it.
///
/// Each attempt holds the database write lock from the sequence lookup to
/// the insert, so concurrent registrations queue instead of reading the same
/// maximum. A busy database or a barcode collision is retried with a fresh
/// lookup.
pub async fn insert_with_barcode(
    pool: &SqlitePool,
    specimen: &mut Specimen,
) -> Result<(), ApiError> {
    // detached so a dropped request cannot hand a connection back mid-transaction
    let task = tokio::spawn(register(pool.clone(), specimen.clone()));
    *specimen = task
        .await
        .map_err(|e| ApiError::Internal(format!("barcode allocation aborted: {}", e)))??;
    Ok(())
}

async fn register(pool: SqlitePool, mut specimen: Specimen) -> Result<Specimen, ApiError> {
    let prefix = barcode_prefix(specimen.created_at.date_naive());
    let mut attempt = 0;

    loop {
        attempt += 1;
        match try_register(&pool, &prefix, &mut specimen).await {
            Ok(()) => {
                tracing::info!(barcode = %specimen.barcode, id = %specimen.id, "specimen registered");
                return Ok(specimen);
            }
            Err(err) if is_retryable(&err) && attempt < MAX_BARCODE_ATTEMPTS => {
                tracing::warn!(error = %err, attempt, "barcode allocation contended, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// One allocation attempt inside a `BEGIN IMMEDIATE` transaction
async fn try_register(
    pool: &SqlitePool,
    prefix: &str,
    specimen: &mut Specimen,
) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    let result = async {
        let highest = highest_sequence(&mut conn, prefix).await?;
        specimen.barcode = next_barcode(prefix, highest);
        insert_record(&mut *conn, &*specimen).await?;
        sqlx::query("COMMIT").execute(&mut *conn).await?;
        Ok::<(), sqlx::Error>(())
    }
    .await;

    if result.is_err() {
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
            tracing::warn!(error = %e, "rollback after failed barcode allocation");
        }
    }
    result
}

/// SQLITE_BUSY (5) and BUSY_SNAPSHOT (517), or a lost race on the barcode index
fn is_retryable(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || matches!(db.code().as_deref(), Some("5" | "517"))
        }
        _ => false,
    }
}

/// Specimens still waiting on lab work
pub async fn count_pending(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM specimens WHERE status NOT IN ('COMPLETED', 'REJECTED')")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{run_migrations, DbConfig, Repository};
    use crate::models::{Patient, SpecimenStatus};
    use serde_json::json;

    async fn setup_with_patient() -> SqlitePool {
        let pool = DbConfig::in_memory().connect().await.unwrap();
        add_patient(&pool).await;
        pool
    }

    async fn add_patient(pool: &SqlitePool) {
        run_migrations(pool).await.unwrap();
        let patient: Patient = serde_json::from_value(json!({
            "id": "p-1",
            "mrn": "MRN-1",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "dateOfBirth": "1815-12-10",
            "gender": "FEMALE",
            "createdAt": "2024-01-15T08:00:00Z",
            "updatedAt": "2024-01-15T08:00:00Z"
        }))
        .unwrap();
        Repository::<Patient>::new(pool.clone())
            .insert(&patient)
            .await
            .unwrap();
    }

    fn specimen(id: &str, created_at: &str) -> Specimen {
        serde_json::from_value(json!({
            "id": id,
            "barcode": "",
            "patientId": "p-1",
            "specimenType": "Blood",
            "testRequested": "CBC",
            "collectedAt": created_at,
            "createdAt": created_at,
            "updatedAt": created_at
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_barcodes_are_sequential_per_day() {
        let pool = setup_with_patient().await;

        let mut first = specimen("s-1", "2024-01-15T09:00:00Z");
        let mut second = specimen("s-2", "2024-01-15T23:59:00Z");
        let mut next_day = specimen("s-3", "2024-01-16T00:01:00Z");
        insert_with_barcode(&pool, &mut first).await.unwrap();
        insert_with_barcode(&pool, &mut second).await.unwrap();
        insert_with_barcode(&pool, &mut next_day).await.unwrap();

        assert_eq!(first.barcode, "SP2401150001");
        assert_eq!(second.barcode, "SP2401150002");
        assert_eq!(next_day.barcode, "SP2401160001");

        let stored = Repository::<Specimen>::new(pool)
            .find_by("barcode", "SP2401150002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, "s-2");
    }

    #[tokio::test]
    async fn test_sequence_continues_after_gaps() {
        let pool = setup_with_patient().await;
        let repo = Repository::<Specimen>::new(pool.clone());

        let mut imported = specimen("s-old", "2024-01-15T09:00:00Z");
        imported.barcode = "SP2401150041".to_string();
        repo.insert(&imported).await.unwrap();

        let mut fresh = specimen("s-new", "2024-01-15T10:00:00Z");
        insert_with_barcode(&pool, &mut fresh).await.unwrap();
        assert_eq!(fresh.barcode, "SP2401150042");
    }

    #[tokio::test]
    async fn test_count_pending() {
        let pool = setup_with_patient().await;
        let mut open = specimen("s-1", "2024-01-15T09:00:00Z");
        let mut done = specimen("s-2", "2024-01-15T09:30:00Z");
        done.status = SpecimenStatus::Completed;
        insert_with_barcode(&pool, &mut open).await.unwrap();
        insert_with_barcode(&pool, &mut done).await.unwrap();

        assert_eq!(count_pending(&pool).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_get_distinct_sequences() {
        let path = std::env::temp_dir().join(format!("hms-barcodes-{}.db", uuid::Uuid::new_v4()));
        let pool = DbConfig::new(format!("sqlite://{}?mode=rwc", path.display()))
            .with_max_connections(8)
            .connect()
            .await
            .unwrap();
        add_patient(&pool).await;

        let tasks: Vec<_> = (0..24)
            .map(|n| {
                let pool = pool.clone();
                tokio::spawn(async move {
                    let mut s = specimen(&format!("s-{}", n), "2024-01-15T09:00:00Z");
                    insert_with_barcode(&pool, &mut s).await.map(|()| s.barcode)
                })
            })
            .collect();

        let mut barcodes = Vec::new();
        for task in tasks {
            barcodes.push(task.await.unwrap().unwrap());
        }
        barcodes.sort();
        let expected: Vec<String> = (1..=24).map(|n| format!("SP240115{:04}", n)).collect();
        assert_eq!(barcodes, expected);

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}

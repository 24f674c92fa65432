use sqlx::sqlite::{SqliteConnection, SqlitePool};
use sqlx::Executor;

/// Schema migrations, applied in order, each exactly once
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_patients",
        include_str!("../../migrations/0001_patients.sql"),
    ),
    (
        "0002_specialty_records",
        include_str!("../../migrations/0002_specialty_records.sql"),
    ),
    (
        "0003_specimens",
        include_str!("../../migrations/0003_specimens.sql"),
    ),
];

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize, sqlx::Error> {
    init_migrations_tracker(pool).await?;

    let mut applied = 0;
    for (name, sql) in MIGRATIONS {
        if is_applied(pool, name).await? {
            continue;
        }

        let mut tx = pool.begin().await?;
        apply_script(&mut tx, sql).await?;
        sqlx::query("INSERT OR IGNORE INTO migrations (name) VALUES (?)")
            .bind(*name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(migration = *name, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

/// Create the table that tracks applied migrations
pub async fn init_migrations_tracker(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn is_applied(pool: &SqlitePool, name: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;

    Ok(count > 0)
}

/// Execute a whole migration script, letting SQLite find statement boundaries
async fn apply_script(conn: &mut SqliteConnection, sql: &str) -> Result<(), sqlx::Error> {
    (&mut *conn).execute(sql).await?;
    Ok(())
}

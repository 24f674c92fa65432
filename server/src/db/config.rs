use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::borrow::Cow;
use std::str::FromStr;
use std::time::Duration;

/// File database next to the working directory, created on first start
pub const DEFAULT_DATABASE_URL: &str = "sqlite://hms.db?mode=rwc";

/// Database configuration with `Cow` so static defaults are not copied
#[derive(Debug, Clone)]
pub struct DbConfig<'a> {
    pub url: Cow<'a, str>,
    pub max_connections: u32,
}

impl<'a> DbConfig<'a> {
    /// Create new database configuration
    pub fn new(url: impl Into<Cow<'a, str>>) -> Self {
        Self {
            url: url.into(),
            max_connections: 5,
        }
    }

    /// Private in-memory database, used by tests
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:").with_max_connections(1)
    }

    /// Set max connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Open a pool with foreign keys enforced.
    ///
    /// Writers wait up to five seconds for the database lock; file databases
    /// use WAL so readers are not blocked by a writer.
    pub async fn connect(&self) -> Result<SqlitePool, sqlx::Error> {
        let mut options = SqliteConnectOptions::from_str(&self.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !self.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool = SqlitePoolOptions::new().max_connections(self.max_connections.max(1));
        if self.is_in_memory() {
            // each connection to an in-memory database sees its own empty database
            pool = pool
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        pool.connect_with(options).await
    }
}

impl<'a> Default for DbConfig<'a> {
    fn default() -> Self {
        Self {
            url: Cow::Borrowed(DEFAULT_DATABASE_URL),
            max_connections: 5,
        }
    }
}

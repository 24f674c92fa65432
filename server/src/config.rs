use clap::Parser;

use crate::db::config::DEFAULT_DATABASE_URL;
use crate::db::DbConfig;

/// Server settings, read from flags or the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "hms-server", version, about = "Hospital management REST API")]
pub struct AppConfig {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Pool size for file-backed databases
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,
}

impl AppConfig {
    pub fn db_config(&self) -> DbConfig<'_> {
        DbConfig::new(self.database_url.as_str()).with_max_connections(self.max_connections)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = AppConfig::try_parse_from([
            "hms-server",
            "--database-url",
            "sqlite::memory:",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--max-connections",
            "2",
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        let db = config.db_config();
        assert!(db.is_in_memory());
        assert_eq!(db.max_connections, 2);
    }
}

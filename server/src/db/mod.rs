pub mod config;
pub mod migrations;
pub mod repository;
pub mod specimens;

pub use config::DbConfig;
pub use migrations::run_migrations;
pub use repository::{ListParams, Page, Repository, SortOrder};

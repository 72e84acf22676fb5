//! SQLite record cache for vaccination and mortality statistics.
//!
//! Downloaded tables are parsed from CSV into typed rows, stored in SQLite
//! (on disk or in memory) and read back per region for the analyses.
//!
//! # Usage
//!
//! ```rust
//! use emv_db::Database;
//!
//! let db = Database::new().unwrap();
//! db.load_population("region,population\nТверская область,1230171\n").unwrap();
//! let population = db.query_population().unwrap();
//! assert_eq!(population.len(), 1);
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.

pub mod schema;
mod loader;
mod queries;
pub mod models;

pub use loader::parse_region_table;

use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

/// Record cache wrapping a single SQLite connection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    pub fn new() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(schema::create_schema())?;
        Ok(Self { conn })
    }

    /// Open (or create) a cache file and apply the schema.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open cache {}", path.display()))?;
        conn.execute_batch(schema::create_schema())?;
        log::info!("Opened cache {}", path.display());
        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_creates_successfully() {
        let db = Database::new();
        assert!(db.is_ok(), "Database should create without errors");
    }

    #[test]
    fn database_starts_empty() {
        let db = Database::new().unwrap();
        assert!(db.cached_regions().unwrap().is_empty());
        assert!(db.query_population().unwrap().is_empty());
    }

    #[test]
    fn cache_file_persists_between_connections() {
        let path = std::env::temp_dir().join(format!("emv-db-test-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let db = Database::open(&path).unwrap();
            db.load_population("region,population\nТверская область,1230171\n")
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.query_population().unwrap().len(), 1);
        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}

// Database schema — table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// This is idempotent — safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One finished categorization run per POS selection.
        -- Results are JSON so their structure can evolve without migrations.
        CREATE TABLE IF NOT EXISTS category_runs (
            label TEXT PRIMARY KEY,            -- POS label, e.g. ADJADV
            pos_tags TEXT NOT NULL,            -- e.g. 'ADJ, ADV'
            provider TEXT NOT NULL,            -- static / contextual
            threshold REAL NOT NULL,
            max_categories INTEGER NOT NULL,
            top_k INTEGER NOT NULL,
            document_count INTEGER NOT NULL,
            observation_count INTEGER NOT NULL,
            category_count INTEGER NOT NULL,
            column_count INTEGER NOT NULL,
            categories_json TEXT NOT NULL,     -- CategorySet
            aggregation_json TEXT NOT NULL,    -- frequency table + top-K
            corpus_path TEXT,                  -- corpus file the run was built from
            dropped_occurrences INTEGER NOT NULL DEFAULT 0,  -- no usable vector
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Index for listing runs newest first
        CREATE INDEX IF NOT EXISTS idx_runs_created
            ON category_runs(created_at);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
/// Later schema changes go through here, numbered from 2.
#[allow(dead_code)]
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Highest applied migration.
pub fn schema_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        // Running create_tables twice should not error
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_table_count() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        // schema_version, category_runs
        assert_eq!(table_count(&conn).unwrap(), 2i64);
    }

    #[test]
    fn test_initial_schema_has_run_columns() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 1);

        conn.execute(
            "INSERT INTO category_runs (label, pos_tags, provider, threshold, max_categories,
                top_k, document_count, observation_count, category_count, column_count,
                categories_json, aggregation_json, corpus_path)
             VALUES ('ADJ', 'ADJ', 'static', 0.7, 100, 10, 1, 1, 1, 1, '[]', '{}', 'texte.json')",
            [],
        )
        .unwrap();

        let (path, dropped): (String, i64) = conn
            .query_row(
                "SELECT corpus_path, dropped_occurrences FROM category_runs WHERE label = 'ADJ'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(path, "texte.json");
        assert_eq!(dropped, 0);
    }

    #[test]
    fn test_run_migration_applies_once() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let add_note = |c: &Connection| c.execute_batch("ALTER TABLE category_runs ADD COLUMN note TEXT;");
        run_migration(&conn, 2, add_note).unwrap();
        // A second ALTER would fail if the migration ran again
        run_migration(&conn, 2, add_note).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 2);
    }
}

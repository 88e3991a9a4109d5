// Database queries — CRUD operations for stored runs.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::models::{CategoryRun, RunSummary};
use crate::categories::aggregate::{AggregateSettings, Aggregation};
use crate::categories::models::CategorySet;

// --- Category runs ---

/// Store a run (upsert by label). A newer run for the same POS selection
/// replaces the older one.
pub fn save_run(conn: &Connection, run: &CategoryRun) -> Result<()> {
    let categories_json =
        serde_json::to_string(&run.categories).context("Failed to serialize categories")?;
    let aggregation_json =
        serde_json::to_string(&run.aggregation).context("Failed to serialize aggregation")?;

    conn.execute(
        "INSERT INTO category_runs (label, pos_tags, provider, threshold, max_categories,
            top_k, document_count, observation_count, category_count, column_count,
            categories_json, aggregation_json, corpus_path, dropped_occurrences, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, COALESCE(?15, datetime('now')))
         ON CONFLICT(label) DO UPDATE SET
            pos_tags = ?2,
            provider = ?3,
            threshold = ?4,
            max_categories = ?5,
            top_k = ?6,
            document_count = ?7,
            observation_count = ?8,
            category_count = ?9,
            column_count = ?10,
            categories_json = ?11,
            aggregation_json = ?12,
            corpus_path = ?13,
            dropped_occurrences = ?14,
            created_at = excluded.created_at",
        params![
            run.label,
            run.pos_tags,
            run.provider,
            run.threshold,
            run.settings.max_categories as i64,
            run.settings.top_k as i64,
            run.document_count as i64,
            run.observation_count as i64,
            run.categories.len() as i64,
            run.aggregation.table.columns.len() as i64,
            categories_json,
            aggregation_json,
            run.corpus_path,
            run.dropped_occurrences as i64,
            run.created_at,
        ],
    )?;
    Ok(())
}

/// Load a stored run by label.
pub fn load_run(conn: &Connection, label: &str) -> Result<Option<CategoryRun>> {
    let mut stmt = conn.prepare(
        "SELECT label, pos_tags, provider, threshold, max_categories, top_k,
                document_count, observation_count, dropped_occurrences,
                categories_json, aggregation_json, created_at, corpus_path
         FROM category_runs WHERE label = ?1",
    )?;

    let row = stmt
        .query_row(params![label], |row| {
            Ok(StoredRow {
                label: row.get(0)?,
                pos_tags: row.get(1)?,
                provider: row.get(2)?,
                threshold: row.get(3)?,
                max_categories: row.get(4)?,
                top_k: row.get(5)?,
                document_count: row.get(6)?,
                observation_count: row.get(7)?,
                dropped_occurrences: row.get(8)?,
                categories_json: row.get(9)?,
                aggregation_json: row.get(10)?,
                created_at: row.get(11)?,
                corpus_path: row.get(12)?,
            })
        })
        .optional()?;

    row.map(StoredRow::into_run).transpose()
}

/// All stored runs, newest first.
pub fn list_runs(conn: &Connection) -> Result<Vec<RunSummary>> {
    let mut stmt = conn.prepare(
        "SELECT label, provider, threshold, category_count, column_count, created_at
         FROM category_runs
         ORDER BY created_at DESC, label ASC",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(RunSummary {
                label: row.get(0)?,
                provider: row.get(1)?,
                threshold: row.get(2)?,
                category_count: row.get::<_, i64>(3)? as usize,
                column_count: row.get::<_, i64>(4)? as usize,
                created_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Delete a stored run. Returns true if a row was removed.
pub fn delete_run(conn: &Connection, label: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM category_runs WHERE label = ?1", params![label])?;
    Ok(removed > 0)
}

/// Raw row before the JSON columns are decoded.
struct StoredRow {
    label: String,
    pos_tags: String,
    provider: String,
    threshold: f64,
    max_categories: i64,
    top_k: i64,
    document_count: i64,
    observation_count: i64,
    dropped_occurrences: i64,
    categories_json: String,
    aggregation_json: String,
    created_at: String,
    corpus_path: Option<String>,
}

impl StoredRow {
    fn into_run(self) -> Result<CategoryRun> {
        let categories: CategorySet = serde_json::from_str(&self.categories_json)
            .with_context(|| format!("Corrupt category data for run {}", self.label))?;
        let aggregation: Aggregation = serde_json::from_str(&self.aggregation_json)
            .with_context(|| format!("Corrupt aggregation data for run {}", self.label))?;

        Ok(CategoryRun {
            label: self.label,
            pos_tags: self.pos_tags,
            provider: self.provider,
            threshold: self.threshold,
            settings: AggregateSettings {
                max_categories: self.max_categories.max(0) as usize,
                top_k: self.top_k.max(0) as usize,
            },
            document_count: self.document_count.max(0) as usize,
            observation_count: self.observation_count.max(0) as usize,
            dropped_occurrences: self.dropped_occurrences.max(0) as usize,
            categories,
            aggregation,
            created_at: Some(self.created_at),
            corpus_path: self.corpus_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::aggregate::Aggregator;
    use crate::categories::models::{AssignmentCount, Category};
    use crate::corpus::models::GroupKey;
    use crate::db::schema;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    fn sample_run(label: &str) -> CategoryRun {
        let categories = CategorySet::from_categories(vec![
            Category::new("gut", vec![1.0, 0.0]),
            Category::new("schnell", vec![0.0, 1.0]),
        ])
        .unwrap();
        let counts: AssignmentCount = [("gut", 4u64), ("schnell", 1)].into_iter().collect();
        let aggregation =
            Aggregator::for_categories(AggregateSettings::default(), &categories)
                .aggregate(vec![(GroupKey::human(), counts)]);

        CategoryRun {
            label: label.to_string(),
            pos_tags: "ADJ, ADV".to_string(),
            provider: "static".to_string(),
            threshold: 0.7,
            settings: AggregateSettings::default(),
            document_count: 1,
            observation_count: 2,
            dropped_occurrences: 0,
            categories,
            aggregation,
            created_at: None,
            corpus_path: Some("texte.json".to_string()),
        }
    }

    #[test]
    fn test_save_and_load_run() {
        let conn = test_conn();
        save_run(&conn, &sample_run("ADJADV")).unwrap();

        let run = load_run(&conn, "ADJADV").unwrap().unwrap();
        assert_eq!(run.pos_tags, "ADJ, ADV");
        assert_eq!(run.categories.len(), 2);
        assert_eq!(run.categories.position("schnell"), Some(1));
        assert_eq!(run.aggregation.table.columns, vec!["gut", "schnell"]);
        assert_eq!(run.aggregation.table.get(&GroupKey::human(), "gut"), 4);
        assert!(run.created_at.is_some());
    }

    #[test]
    fn test_load_missing_run_is_none() {
        let conn = test_conn();
        assert!(load_run(&conn, "NOUN").unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_existing_label() {
        let conn = test_conn();
        save_run(&conn, &sample_run("ADJ")).unwrap();
        let mut newer = sample_run("ADJ");
        newer.threshold = 0.5;
        save_run(&conn, &newer).unwrap();

        let runs = list_runs(&conn).unwrap();
        assert_eq!(runs.len(), 1);
        assert!((runs[0].threshold - 0.5).abs() < 1e-9);
        assert_eq!(runs[0].category_count, 2);
    }

    #[test]
    fn test_delete_run() {
        let conn = test_conn();
        save_run(&conn, &sample_run("VERB")).unwrap();
        assert!(delete_run(&conn, "VERB").unwrap());
        assert!(!delete_run(&conn, "VERB").unwrap());
    }
}

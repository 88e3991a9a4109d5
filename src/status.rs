// System status display — shows DB stats, stored runs, model availability.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::db::{self, queries, schema};
use crate::output::terminal;

/// Display system status to the terminal.
pub fn show(config: &Config) -> Result<()> {
    if !Path::new(&config.db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `wortfeld init` to set up the database.");
        return Ok(());
    }

    // Database file size
    let file_size = std::fs::metadata(&config.db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", config.db_path, file_size);

    let conn = db::open(&config.db_path)?;
    println!("Schema version: {}", schema::schema_version(&conn)?);

    // Vector sources
    match &config.vectors_path {
        Some(path) if path.exists() => println!("Static vectors: {}", path.display()),
        Some(path) => println!("Static vectors: {} (missing)", path.display()),
        None => println!("Static vectors: not configured (WORTFELD_VECTORS)"),
    }
    if crate::embeddings::download::contextual_files_present(&config.model_dir) {
        println!("Contextual model: installed in {}", config.model_dir.display());
    } else {
        println!("Contextual model: not downloaded");
        println!("  Run `wortfeld download-model` to fetch it");
    }

    let runs = queries::list_runs(&conn)?;
    terminal::display_run_list(&runs);

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

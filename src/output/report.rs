// Report files — markdown for reading, JSON for further processing.
//
// Everything for one POS selection goes to <output_dir>/<label>/, where the
// label comes from the POS filter (e.g. output/ADJADV/). Writing never mixes
// runs with different selections.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::analysis::classify::Classification;
use crate::analysis::deviation::DeviationReport;
use crate::categories::models::CategoryReport;
use crate::db::models::CategoryRun;

/// Directory for one run's files.
pub fn run_dir(output_dir: &Path, label: &str) -> PathBuf {
    output_dir.join(label)
}

/// Render the full markdown report of a run.
pub fn render_run(run: &CategoryRun) -> String {
    let mut md = String::new();
    let table = &run.aggregation.table;

    let _ = writeln!(md, "# Semantic categories: {}\n", run.pos_tags);
    let _ = writeln!(md, "| | |\n|---|---|");
    let _ = writeln!(md, "| Provider | {} |", run.provider);
    let _ = writeln!(md, "| Threshold | {:.2} |", run.threshold);
    let _ = writeln!(md, "| Documents | {} |", run.document_count);
    let _ = writeln!(md, "| Observations | {} |", run.observation_count);
    let _ = writeln!(md, "| Categories | {} |", run.categories.len());
    let _ = writeln!(
        md,
        "| Categories in table | {} (max {}) |",
        table.columns.len(),
        run.settings.max_categories
    );
    if let Some(path) = &run.corpus_path {
        let _ = writeln!(md, "| Corpus | `{path}` |");
    }
    if let Some(created) = &run.created_at {
        let _ = writeln!(md, "| Created | {created} UTC |");
    }

    // Frequency table
    let _ = writeln!(md, "\n## Frequency table\n");
    if table.columns.is_empty() {
        let _ = writeln!(md, "_No occurrences were assigned._");
    } else {
        let _ = writeln!(md, "| Source | Variant | {} |", table.columns.join(" | "));
        let _ = writeln!(md, "|---|---|{}", "---:|".repeat(table.columns.len()));
        for row in &table.rows {
            let cells: Vec<String> = row.counts.iter().map(|c| c.to_string()).collect();
            let _ = writeln!(
                md,
                "| {} | {} | {} |",
                row.group.source,
                row.group.variant,
                cells.join(" | ")
            );
        }
    }

    // Top-K
    let _ = writeln!(md, "\n## Top {} per group\n", run.settings.top_k);
    let _ = writeln!(md, "| Source | Variant | Rank | Category | Count |");
    let _ = writeln!(md, "|---|---|---:|---|---:|");
    for ranking in &run.aggregation.top_k.groups {
        for entry in &ranking.entries {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                ranking.group.source,
                ranking.group.variant,
                entry.rank,
                entry.category,
                entry.count
            );
        }
    }

    // Category list
    let report = CategoryReport::from_set(&run.categories);
    let _ = writeln!(md, "\n## Categories\n");
    for entry in &report.entries {
        let _ = writeln!(
            md,
            "- **{}** ({} lemmas, {} observations): {}",
            entry.id,
            entry.member_count,
            entry.observations,
            entry.members.join(", ")
        );
    }

    md
}

/// Write report.md plus the JSON exports. Returns the markdown path.
pub fn write_run(run: &CategoryRun, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(output_dir, &run.label);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let report_path = dir.join("report.md");
    write_file(&report_path, &render_run(run))?;

    write_json(&dir.join("categories.json"), &CategoryReport::from_set(&run.categories))?;
    write_json(&dir.join("frequencies.json"), &run.aggregation.table)?;
    write_json(&dir.join("top_k.json"), &run.aggregation.top_k)?;

    info!(dir = %dir.display(), "Wrote run reports");
    Ok(report_path)
}

pub fn render_deviations(label: &str, report: &DeviationReport) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Category deviations: {label}\n");

    for (title, entries) in [
        ("Over-represented", &report.over),
        ("Under-represented", &report.under),
    ] {
        let _ = writeln!(md, "## {title}\n");
        if entries.is_empty() {
            let _ = writeln!(md, "_None._\n");
            continue;
        }
        let _ = writeln!(md, "| Group | Category | Count | Mean | Absolute | Percent |");
        let _ = writeln!(md, "|---|---|---:|---:|---:|---:|");
        for d in entries {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {:.2} | {:+.2} | {:+.2}% |",
                d.group, d.category, d.count, d.mean, d.absolute, d.percent
            );
        }
        md.push('\n');
    }

    md
}

pub fn write_deviations(label: &str, report: &DeviationReport, output_dir: &Path) -> Result<PathBuf> {
    let dir = run_dir(output_dir, label);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join("deviations.md");
    write_file(&path, &render_deviations(label, report))?;
    write_json(&dir.join("deviations.json"), report)?;
    Ok(path)
}

pub fn render_classification(source: &str, c: &Classification) -> String {
    let mut md = String::new();
    let _ = writeln!(md, "# Classification: {source}\n");
    let _ = writeln!(md, "- Eligible lemmas: {}", c.lemma_count);
    let _ = writeln!(md, "- Categories compared: {}", c.category_count);
    let _ = writeln!(md, "- Generated score: {:.2}", c.generated_score);
    let _ = writeln!(md, "- Human score: {:.2}", c.human_score);
    let _ = writeln!(
        md,
        "- Generated: {:.2}% / Human: {:.2}% ({})\n",
        c.generated_confidence * 100.0,
        c.human_confidence * 100.0,
        c.tendency().label()
    );
    let _ = writeln!(md, "| Category | Count | Mean | Difference | Percent | Lean |");
    let _ = writeln!(md, "|---|---:|---:|---:|---:|---|");
    for v in c.verdicts.iter().take(30) {
        let _ = writeln!(
            md,
            "| {} | {} | {:.2} | {:+.0} | {:+.1}% | {} |",
            v.category,
            v.count,
            v.global_mean,
            v.difference,
            v.percent,
            v.tendency.label()
        );
    }
    md
}

pub fn write_classification(
    label: &str,
    source: &str,
    c: &Classification,
    output_dir: &Path,
) -> Result<PathBuf> {
    let dir = run_dir(output_dir, label);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join("classification.md");
    write_file(&path, &render_classification(source, c))?;
    Ok(path)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_file(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::aggregate::{AggregateSettings, Aggregator};
    use crate::categories::models::{AssignmentCount, Category, CategorySet};
    use crate::corpus::models::GroupKey;

    fn run() -> CategoryRun {
        let categories = CategorySet::from_categories(vec![
            Category::new("gut", vec![1.0, 0.0]),
            Category::new("schnell", vec![0.0, 1.0]),
        ])
        .unwrap();
        let human: AssignmentCount = [("gut", 3u64), ("schnell", 1)].into_iter().collect();
        let gen: AssignmentCount = [("schnell", 5u64)].into_iter().collect();
        let aggregation = Aggregator::for_categories(AggregateSettings::default(), &categories)
            .aggregate(vec![
                (GroupKey::human(), human),
                (GroupKey::new("llama", "TextA"), gen),
            ]);
        CategoryRun {
            label: "ADJADV".into(),
            pos_tags: "ADJ, ADV".into(),
            provider: "static".into(),
            threshold: 0.7,
            settings: AggregateSettings::default(),
            document_count: 2,
            observation_count: 2,
            dropped_occurrences: 0,
            categories,
            aggregation,
            created_at: None,
            corpus_path: None,
        }
    }

    #[test]
    fn test_markdown_contains_table_and_categories() {
        let md = render_run(&run());
        assert!(md.contains("| Source | Variant | schnell | gut |"));
        assert!(md.contains("| HumanText | Original | 1 | 3 |"));
        assert!(md.contains("| llama | TextA | 5 | 0 |"));
        assert!(md.contains("- **gut** (1 lemmas, 1 observations): gut"));
    }

    #[test]
    fn test_write_run_creates_label_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_run(&run(), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("ADJADV").join("report.md"));
        assert!(dir.path().join("ADJADV").join("frequencies.json").exists());
        assert!(dir.path().join("ADJADV").join("categories.json").exists());
        assert!(dir.path().join("ADJADV").join("top_k.json").exists());
    }
}

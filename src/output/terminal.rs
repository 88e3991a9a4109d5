// Colored terminal output for categories, frequency tables and analyses.
//
// This module handles all terminal-specific formatting: colors, tables,
// alignment. The main.rs command handlers delegate here.

use colored::Colorize;

use crate::analysis::classify::{Classification, Tendency};
use crate::analysis::deviation::{Deviation, DeviationReport};
use crate::categories::aggregate::{FrequencyTable, GroupTopK};
use crate::categories::models::CategoryReport;
use crate::db::models::{CategoryRun, RunSummary};

/// Columns shown in the terminal frequency table; the report file has all.
const TERMINAL_COLUMNS: usize = 8;

/// One-paragraph overview of a run.
pub fn display_run_summary(run: &CategoryRun) {
    println!(
        "\n{}",
        format!("=== Categories for {} ({}) ===", run.pos_tags, run.label).bold()
    );
    println!(
        "  Provider: {}  |  Threshold: {:.2}  |  Documents: {}",
        run.provider, run.threshold, run.document_count
    );
    println!(
        "  Observations: {}  |  Categories: {}  |  In table: {}",
        run.observation_count,
        run.categories.len(),
        run.aggregation.table.columns.len()
    );
    if run.dropped_occurrences > 0 {
        println!(
            "  {} {} occurrences without a usable vector",
            "~".yellow(),
            run.dropped_occurrences
        );
    }
    if let Some(created) = &run.created_at {
        println!("  {}", format!("Stored {created}").dimmed());
    }
}

/// Largest categories first, with a preview of their members.
pub fn display_categories(report: &CategoryReport, limit: usize) {
    if report.entries.is_empty() {
        println!("\nNo categories were formed.");
        return;
    }

    let mut entries: Vec<_> = report.entries.iter().collect();
    entries.sort_by(|a, b| b.observations.cmp(&a.observations).then(a.id.cmp(&b.id)));

    println!("\n{}", "Largest categories:".bold());
    for entry in entries.iter().take(limit) {
        let members = super::truncate_chars(&entry.members.join(", "), 90);
        println!(
            "  {:<20} {:>4} lemmas  {}",
            entry.id.cyan(),
            entry.member_count,
            members.dimmed()
        );
    }
    if entries.len() > limit {
        println!("  {}", format!("... and {} more", entries.len() - limit).dimmed());
    }
}

/// Frequency table, first columns only.
pub fn display_frequency_table(table: &FrequencyTable) {
    if table.columns.is_empty() {
        println!("\nFrequency table is empty (no occurrences were assigned).");
        return;
    }

    let shown = table.columns.len().min(TERMINAL_COLUMNS);
    println!(
        "\n{}",
        format!(
            "Frequency table ({} of {} categories):",
            shown,
            table.columns.len()
        )
        .bold()
    );

    let mut header = format!("  {:<28}", "Group".dimmed());
    for column in &table.columns[..shown] {
        header.push_str(&format!(" {:>10}", super::truncate_chars(column, 10).dimmed()));
    }
    println!("{header}");
    println!("  {}", "-".repeat(28 + 11 * shown).dimmed());

    for row in &table.rows {
        let label = row.group.to_string();
        let mut line = if row.group.is_human() {
            format!("  {:<28}", label.green())
        } else {
            format!("  {:<28}", label)
        };
        for count in &row.counts[..shown] {
            line.push_str(&format!(" {:>10}", count));
        }
        println!("{line}");
    }
}

/// Per-group top-K lists.
pub fn display_top_k(top_k: &GroupTopK) {
    println!("\n{}", "Top categories per group:".bold());
    for ranking in &top_k.groups {
        let entries: Vec<String> = ranking
            .entries
            .iter()
            .map(|e| format!("{} ({})", e.category, e.count))
            .collect();
        let list = if entries.is_empty() {
            "none".dimmed().to_string()
        } else {
            entries.join(", ")
        };
        println!("  {}: {}", ranking.group.to_string().bold(), list);
    }
}

pub fn display_deviations(report: &DeviationReport) {
    println!("\n{}", "Over-represented:".bold());
    if report.over.is_empty() {
        println!("  none");
    }
    for d in &report.over {
        print_deviation(d);
    }

    println!("\n{}", "Under-represented:".bold());
    if report.under.is_empty() {
        println!("  none");
    }
    for d in &report.under {
        print_deviation(d);
    }
}

fn print_deviation(d: &Deviation) {
    let abs = format!("{:+.2}", d.absolute);
    let abs = if d.absolute > 0.0 { abs.blue() } else { abs.red() };
    println!(
        "  {} – {:<20} {:>8}  {:>+8.1}%  (count {}, mean {:.2})",
        d.group, d.category, abs, d.percent, d.count, d.mean
    );
}

pub fn display_classification(c: &Classification) {
    println!("\n{}", "=== Classification ===".bold());
    println!(
        "  Eligible lemmas: {}  |  Categories compared: {}",
        c.lemma_count, c.category_count
    );
    println!(
        "  Generated score: {:.2}  |  Human score: {:.2}",
        c.generated_score, c.human_score
    );
    println!(
        "  Generated: {:.1}%  |  Human: {:.1}%  →  {}",
        c.generated_confidence * 100.0,
        c.human_confidence * 100.0,
        colorize_tendency(c.tendency())
    );

    if c.verdicts.is_empty() {
        println!("\n  None of the text's lemmas landed in a known category.");
        return;
    }

    println!("\n{}", "Most unusual categories:".bold());
    for v in c.verdicts.iter().take(30) {
        let arrow = if v.percent > 0.0 { "↑" } else { "↓" };
        println!(
            "  {:<20} {:>4} (mean {:.2}) {} {:+.0} ({:+.1}%)  {}",
            v.category,
            v.count,
            v.global_mean,
            arrow,
            v.difference,
            v.percent,
            colorize_tendency(v.tendency)
        );
    }
}

pub fn display_run_list(runs: &[RunSummary]) {
    if runs.is_empty() {
        println!("Stored runs: none yet");
        println!("  Run `wortfeld categorize --corpus <file> --pos ADJ` to create one");
        return;
    }
    println!("Stored runs: {}", runs.len());
    for run in runs {
        println!(
            "  {:<12} {:<10} threshold {:.2}  {:>5} categories, {:>3} in table  ({})",
            run.label.cyan(),
            run.provider,
            run.threshold,
            run.category_count,
            run.column_count,
            run.created_at.dimmed()
        );
    }
}

fn colorize_tendency(t: Tendency) -> colored::ColoredString {
    match t {
        Tendency::Human => t.label().green(),
        Tendency::Generated => t.label().red(),
        Tendency::Unclear => t.label().yellow(),
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::info;

use wortfeld::config::{Config, ProviderBackend};
use wortfeld::corpus::filter::{ContentFilter, PosFilter};
use wortfeld::embeddings::traits::VectorProvider;

/// Wortfeld: Emergent semantic categories across human and generated text.
///
/// Clusters the content words of an annotated corpus into categories and
/// compares how often each group of texts uses them.
#[derive(Parser)]
#[command(name = "wortfeld", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Download the contextual embedding model (~470 MB)
    DownloadModel,

    /// Build categories from an annotated corpus and count them per group
    Categorize {
        /// Annotated corpus (JSON array of records)
        #[arg(long)]
        corpus: PathBuf,

        /// POS tags to include, comma-separated (e.g. ADJ,ADV)
        #[arg(long)]
        pos: String,

        /// Similarity needed to join a category (default: 0.7)
        #[arg(long)]
        threshold: Option<f64>,

        /// Categories kept in the frequency table (default: 100)
        #[arg(long)]
        max_categories: Option<usize>,

        /// Categories listed per group (default: 10)
        #[arg(long)]
        top_k: Option<usize>,

        /// Vector provider: static or contextual
        #[arg(long)]
        provider: Option<String>,
    },

    /// Show a stored run and rewrite its report files
    Report {
        /// POS tags of the run (e.g. ADJ,ADV)
        #[arg(long)]
        pos: String,
    },

    /// Over- and under-represented categories per group
    Deviations {
        /// POS tags of the run (e.g. ADJ,ADV)
        #[arg(long)]
        pos: String,

        /// Entries on each side (default: 30)
        #[arg(long, default_value = "30")]
        top: usize,
    },

    /// Place a new annotated text between the human and generator profiles
    Classify {
        /// POS tags of the run to compare against (e.g. ADJ,ADV)
        #[arg(long)]
        pos: String,

        /// Annotated text ({"tokens": [...]})
        #[arg(long)]
        text: PathBuf,
    },

    /// Remove a stored run
    Forget {
        /// POS tags of the run (e.g. ADJ,ADV)
        #[arg(long)]
        pos: String,
    },

    /// Show system status (DB stats, stored runs, models)
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    // Set up structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wortfeld=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Wortfeld database...");
            let config = Config::load()?;
            let conn = wortfeld::db::initialize(&config.db_path)?;
            let table_count = wortfeld::db::schema::table_count(&conn)?;
            println!("Database initialized at: {}", config.db_path);
            println!("Tables created: {table_count}");
            println!("\nWortfeld is ready. Next step: point WORTFELD_VECTORS at a word-vector file");
            println!("  or run `wortfeld download-model` for contextual vectors.");
            println!("\nThen run: wortfeld categorize --corpus <file> --pos ADJ");
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading contextual embedding model...");
            println!("  Destination: {}", model_dir.display());

            wortfeld::embeddings::download::download_model(model_dir).await?;

            println!("\n{}", "Model downloaded successfully.".bold());
            println!("You can now run `wortfeld categorize --provider contextual ...`.");
        }

        Commands::Categorize {
            corpus,
            pos,
            threshold,
            max_categories,
            top_k,
            provider,
        } => {
            let config = Config::load()?;
            let backend = match provider {
                Some(name) => name.parse()?,
                None => config.provider,
            };
            let filter = ContentFilter::new(pos.parse::<PosFilter>()?);

            let corpus_data = wortfeld::corpus::reader::load_corpus(&corpus)?;
            if corpus_data.documents.is_empty() {
                println!("Corpus contains no texts. Nothing to categorize.");
                return Ok(());
            }
            println!(
                "Loaded {} documents from {} records.",
                corpus_data.documents.len(),
                corpus_data.record_count
            );

            let vocabulary: HashSet<String> = corpus_data
                .documents
                .iter()
                .flat_map(|d| filter.select(&d.text.tokens))
                .map(|(_, lemma)| lemma)
                .collect();
            let vectors = create_provider(&config, backend, Some(&vocabulary))?;

            let settings = wortfeld::pipeline::categorize::PipelineSettings {
                threshold: threshold.unwrap_or(config.threshold),
                aggregate: wortfeld::categories::aggregate::AggregateSettings {
                    max_categories: max_categories.unwrap_or(config.max_categories),
                    top_k: top_k.unwrap_or(config.top_k),
                },
            };

            let mut run = wortfeld::pipeline::categorize::run(
                &corpus_data,
                vectors.as_ref(),
                &filter,
                &settings,
            )?;
            run.corpus_path = Some(corpus.display().to_string());

            let conn = wortfeld::db::initialize(&config.db_path)?;
            wortfeld::db::queries::save_run(&conn, &run)?;

            show_run(&run);

            let report_path = wortfeld::output::report::write_run(&run, &config.output_dir)?;
            println!(
                "\n{}",
                format!("Report saved to: {}", report_path.display()).bold()
            );
        }

        Commands::Report { pos } => {
            let config = Config::load()?;
            let run = load_stored_run(&config, &pos)?;

            show_run(&run);

            let report_path = wortfeld::output::report::write_run(&run, &config.output_dir)?;
            println!(
                "\n{}",
                format!("Report saved to: {}", report_path.display()).bold()
            );
        }

        Commands::Deviations { pos, top } => {
            let config = Config::load()?;
            let run = load_stored_run(&config, &pos)?;

            let report = wortfeld::analysis::deviation::top_deviations(&run.aggregation.table, top);
            println!(
                "\n{}",
                format!("=== Deviations for {} ===", run.pos_tags).bold()
            );
            wortfeld::output::terminal::display_deviations(&report);

            let path =
                wortfeld::output::report::write_deviations(&run.label, &report, &config.output_dir)?;
            println!("\n{}", format!("Deviations saved to: {}", path.display()).bold());
        }

        Commands::Classify { pos, text } => {
            let config = Config::load()?;
            let run = load_stored_run(&config, &pos)?;
            let filter = ContentFilter::new(pos.parse::<PosFilter>()?);

            let annotated = wortfeld::corpus::reader::load_text(&text)?;
            let vocabulary: HashSet<String> = filter
                .select(&annotated.tokens)
                .into_iter()
                .map(|(_, lemma)| lemma)
                .collect();

            // Vectors must come from the same provider the categories were built with
            let backend: ProviderBackend = run.provider.parse()?;
            let vectors = create_provider(&config, backend, Some(&vocabulary))?;

            let classification = wortfeld::analysis::classify::classify(
                &annotated,
                &filter,
                vectors.as_ref(),
                &run.categories,
                &run.aggregation.table,
            )?;
            wortfeld::output::terminal::display_classification(&classification);

            let source = text.display().to_string();
            let path = wortfeld::output::report::write_classification(
                &run.label,
                &source,
                &classification,
                &config.output_dir,
            )?;
            println!("\n{}", format!("Classification saved to: {}", path.display()).bold());
        }

        Commands::Forget { pos } => {
            let config = Config::load()?;
            let label = pos.parse::<PosFilter>()?.label();
            let conn = wortfeld::db::open(&config.db_path)?;
            if wortfeld::db::queries::delete_run(&conn, &label)? {
                println!("Removed stored run {label}.");
            } else {
                println!("No stored run for {label}.");
            }
        }

        Commands::Status => {
            let config = Config::load()?;
            wortfeld::status::show(&config)?;
        }
    }

    Ok(())
}

/// Terminal view of a run.
fn show_run(run: &wortfeld::db::models::CategoryRun) {
    let report = wortfeld::categories::models::CategoryReport::from_set(&run.categories);
    wortfeld::output::terminal::display_run_summary(run);
    wortfeld::output::terminal::display_categories(&report, 15);
    wortfeld::output::terminal::display_frequency_table(&run.aggregation.table);
    wortfeld::output::terminal::display_top_k(&run.aggregation.top_k);
}

/// Load the stored run for a POS selection or explain how to create it.
fn load_stored_run(config: &Config, pos: &str) -> Result<wortfeld::db::models::CategoryRun> {
    let label = pos.parse::<PosFilter>()?.label();
    let conn = wortfeld::db::open(&config.db_path)?;
    match wortfeld::db::queries::load_run(&conn, &label)? {
        Some(run) => Ok(run),
        None => anyhow::bail!(
            "No stored run for {label}. Run `wortfeld categorize --corpus <file> --pos {pos}` first."
        ),
    }
}

/// Create a vector provider for the chosen backend.
fn create_provider(
    config: &Config,
    backend: ProviderBackend,
    vocabulary: Option<&HashSet<String>>,
) -> Result<Box<dyn VectorProvider>> {
    match backend {
        ProviderBackend::Static => {
            let path = config.require_vectors()?;
            info!("Using static word vectors");
            let vectors = wortfeld::embeddings::static_vectors::StaticVectors::load(
                Path::new(path),
                vocabulary,
            )?;
            Ok(Box::new(vectors))
        }
        ProviderBackend::Contextual => {
            let dir = config.require_model()?;
            info!("Using contextual embeddings");
            let embedder = wortfeld::embeddings::contextual::ContextualEmbedder::load(&dir)?;
            Ok(Box::new(embedder))
        }
    }
}

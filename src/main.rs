use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use flood_monitor::classifier::ChatClassifier;
use flood_monitor::config::AppConfig;
use flood_monitor::file_writer;
use flood_monitor::logging::init_logging;
use flood_monitor::pipeline::{self, ClassificationStage, IngestionStage};
use flood_monitor::search::RecentSearchClient;
use flood_monitor::{LocationAggregate, MessageStore, OutputFormat};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent flood posts and store the new ones
    Ingest,
    /// Classify every stored message that has no classification yet
    Classify,
    /// Ingest, then classify
    Run,
    /// Recompute the location aggregate from the stored messages
    Rebuild,
    /// List report counts per location and day, newest first
    Locations {
        /// Output format (txt, csv or json)
        #[arg(short, long, default_value = "txt")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List stored messages
    Messages {
        /// Only messages still waiting for classification
        #[arg(short, long)]
        unclassified: bool,

        /// Output format (txt, csv or json)
        #[arg(short, long, default_value = "txt")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _log_guard = init_logging(Some(&config.get_log_level()), log_file, &config.logging.format)?;

    match cli.command {
        Commands::Ingest => {
            ingest(&config).await?;
        }
        Commands::Classify => classify(&config).await?,
        Commands::Run => {
            // Ingestion failures are reported; classification still runs on what is stored
            if let Err(e) = ingest(&config).await {
                error!("Ingestion failed: {e:#}");
            }
            classify(&config).await?;
        }
        Commands::Rebuild => rebuild(&config)?,
        Commands::Locations { format, output } => list_locations(&config, format, output.as_deref())?,
        Commands::Messages {
            unclassified,
            format,
            output,
        } => list_messages(&config, unclassified, format, output.as_deref())?,
    }

    Ok(())
}

/// Fetch and merge new messages
async fn ingest(config: &AppConfig) -> Result<usize> {
    let token = config
        .get_bearer_token()
        .context("No search bearer token configured (set BEARER_TOKEN)")?;
    let client = RecentSearchClient::new(config.search.clone(), token)?;

    let mut store = MessageStore::open(config.messages_path())
        .with_context(|| format!("Failed to open message store {}", config.storage.messages_path))?;

    let summary = IngestionStage::new(client)
        .run(&mut store)
        .await
        .context("Failed to fetch messages")?;

    if summary.added > 0 {
        info!("{} new messages added ({} fetched)", summary.added, summary.fetched);
    } else {
        info!("No new messages found ({} fetched)", summary.fetched);
    }
    Ok(summary.added)
}

/// Classify pending messages and update the aggregate
async fn classify(config: &AppConfig) -> Result<()> {
    let api_key = config
        .get_classifier_api_key()
        .context("No classifier API key configured (set OPENAI_API_KEY)")?;
    let classifier = ChatClassifier::new(config.classifier.clone(), api_key)?;

    let mut store = MessageStore::open(config.messages_path())
        .with_context(|| format!("Failed to open message store {}", config.storage.messages_path))?;
    let mut aggregate = LocationAggregate::open(config.locations_path())
        .with_context(|| format!("Failed to open location aggregate {}", config.storage.locations_path))?;

    let summary = ClassificationStage::new(classifier)
        .run(&mut store, &mut aggregate)
        .await
        .context("Classification run failed")?;

    if summary.candidates == 0 {
        info!("No new messages to classify");
    } else {
        info!(
            "{} of {} messages classified ({} reports, {} comments)",
            summary.processed(),
            summary.candidates,
            summary.reports,
            summary.comments()
        );
    }
    for failure in &summary.failures {
        error!("Could not classify message {}: {}", failure.key, failure.error);
    }
    Ok(())
}

/// Recompute the aggregate from scratch
fn rebuild(config: &AppConfig) -> Result<()> {
    let store = MessageStore::open(config.messages_path())?;
    let mut aggregate = LocationAggregate::open(config.locations_path())?;

    let reports = pipeline::rebuild_aggregate(&store, &mut aggregate).context("Failed to rebuild location aggregate")?;
    info!("Aggregate rebuilt from {} reports into {} buckets", reports, aggregate.buckets().len());
    Ok(())
}

fn list_locations(config: &AppConfig, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let aggregate = LocationAggregate::open(config.locations_path())?;
    let buckets = aggregate.sorted_for_display();
    if buckets.is_empty() {
        info!("No locations detected yet");
    }

    match output {
        Some(path) => {
            file_writer::write_buckets(&buckets, format, file_writer::create_output_file(path)?)?;
            info!("Wrote {} buckets to {}", buckets.len(), path.display());
        }
        None => file_writer::write_buckets(&buckets, format, std::io::stdout().lock())?,
    }
    Ok(())
}

fn list_messages(config: &AppConfig, unclassified: bool, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let store = MessageStore::open(config.messages_path())?;
    let messages = if unclassified {
        store.unclassified()
    } else {
        store.messages().to_vec()
    };

    match output {
        Some(path) => {
            file_writer::write_messages(&messages, format, file_writer::create_output_file(path)?)?;
            info!("Wrote {} messages to {}", messages.len(), path.display());
        }
        None => file_writer::write_messages(&messages, format, std::io::stdout().lock())?,
    }
    Ok(())
}

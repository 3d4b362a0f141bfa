//! Triage CLI - knowledge-base-first incident classification.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use triage_ai::{ClassificationOrchestrator, OllamaLanguageModel};
use triage_core::{
    ConfidenceLevel, IncidentDescriptor, KnowledgeEntry, KnowledgeEntryId, SimilarityMatch,
    StoreBackend, TriageConfig,
};
use triage_knowledge::seed::seed_entries;
use triage_knowledge::{
    DisabledEmbeddings, EmbeddingProvider, KnowledgeRepository, OllamaEmbeddingClient,
    SimilarityEngine,
};
use triage_storage::{ChromaVectorStore, CollectionHandle, InMemoryVectorStore, VectorStore};

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Incident classification backed by a semantic knowledge base", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an incident
    Classify {
        /// Incident type, e.g. DATABASE_CONNECTION_ERROR
        #[arg(long = "type")]
        incident_type: String,
        /// Free-text description
        #[arg(long)]
        description: String,
        /// Reporting system
        #[arg(long, default_value = "cli")]
        source: String,
        /// External incident id
        #[arg(long, default_value = "cli-incident")]
        id: String,
    },
    /// Search the knowledge base
    Search {
        /// Query text
        query: String,
        /// Maximum number of matches
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Manage knowledge entries
    #[command(subcommand)]
    Kb(KbCommands),
}

#[derive(Subcommand)]
enum KbCommands {
    /// List all entries
    List,
    /// Add entries from a JSON file holding one entry or an array
    Add {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Delete an entry
    Delete {
        /// Entry id
        id: String,
    },
    /// Load the built-in seed entries
    Seed,
}

/// Search output row: the match plus its qualitative confidence.
#[derive(Serialize)]
struct SearchHit<'a> {
    #[serde(flatten)]
    found: &'a SimilarityMatch,
    confidence_level: ConfidenceLevel,
}

impl<'a> From<&'a SimilarityMatch> for SearchHit<'a> {
    fn from(found: &'a SimilarityMatch) -> Self {
        Self {
            found,
            confidence_level: found.confidence_level(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EntryFile {
    Many(Vec<KnowledgeEntry>),
    One(Box<KnowledgeEntry>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "error" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let repository = Arc::new(build_repository(&config));
    let handle = repository
        .initialize(&config.store.collection)
        .await
        .context("Failed to initialize knowledge base collection")?;

    let seeded = seed_ephemeral(config.store.backend, &repository, &handle).await?;
    if seeded > 0 {
        info!("Seeded knowledge base with {} entries", seeded);
    }

    match cli.command {
        Commands::Classify { incident_type, description, source, id } => {
            let incident = IncidentDescriptor::new(id, incident_type, description).with_source(source);
            let engine = SimilarityEngine::new(repository, config.similarity.clone());
            let model = Arc::new(OllamaLanguageModel::from_config(&config.classifier));
            let orchestrator =
                ClassificationOrchestrator::new(engine, model, handle, config.orchestrator.clone());

            let result = orchestrator.classify(&incident).await;
            print_json(&result)?;
        }
        Commands::Search { query, limit } => {
            let engine = SimilarityEngine::new(repository, config.similarity.clone());
            let matches = engine.search(&handle, &query, limit).await;
            let hits: Vec<SearchHit> = matches.iter().map(SearchHit::from).collect();
            print_json(&hits)?;
        }
        Commands::Kb(command) => run_kb(command, &repository, &handle).await?,
    }

    Ok(())
}

async fn run_kb(command: KbCommands, repository: &KnowledgeRepository, handle: &CollectionHandle) -> Result<()> {
    match command {
        KbCommands::List => {
            let entries = repository.get_all(handle).await?;
            print_json(&entries)?;
        }
        KbCommands::Add { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let entries = match serde_json::from_str(&content)
                .with_context(|| format!("Invalid knowledge entry JSON in {}", file.display()))?
            {
                EntryFile::Many(entries) => entries,
                EntryFile::One(entry) => vec![*entry],
            };
            let added = repository.add_all(handle, &entries).await?;
            println!("Added {} entries", added);
        }
        KbCommands::Delete { id } => {
            let id = KnowledgeEntryId::from(id);
            if repository.delete(handle, &id).await? {
                println!("Deleted {}", id);
            } else {
                println!("Entry not found: {}", id);
            }
        }
        KbCommands::Seed => {
            let added = repository.add_all(handle, &seed_entries()).await?;
            println!("Loaded {} seed entries", added);
        }
    }
    Ok(())
}

/// Seed an empty in-memory knowledge base. Persistent stores are only
/// seeded on request through `kb seed`.
async fn seed_ephemeral(
    backend: StoreBackend,
    repository: &KnowledgeRepository,
    handle: &CollectionHandle,
) -> Result<usize> {
    match backend {
        StoreBackend::Memory => Ok(repository.seed_if_empty(handle).await?),
        StoreBackend::Chroma => Ok(0),
    }
}

fn load_config(path: Option<&Path>) -> Result<TriageConfig> {
    match path {
        Some(path) => TriageConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            debug!("No config file given, using defaults");
            Ok(TriageConfig::default())
        }
    }
}

fn build_repository(config: &TriageConfig) -> KnowledgeRepository {
    let store: Arc<dyn VectorStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(InMemoryVectorStore::new()),
        StoreBackend::Chroma => Arc::new(ChromaVectorStore::new(
            config.store.url.clone(),
            Duration::from_secs(config.store.timeout_secs),
        )),
    };

    let embeddings: Arc<dyn EmbeddingProvider> = if config.embedding.enabled {
        Arc::new(OllamaEmbeddingClient::from_config(&config.embedding))
    } else {
        Arc::new(DisabledEmbeddings)
    };

    KnowledgeRepository::new(store, embeddings)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::Severity;

    #[test]
    fn test_search_hit_reports_confidence_level() {
        let found = SimilarityMatch {
            entry: KnowledgeEntry::new("Disk full", "DISK_FULL", Severity::Medium, "s", "r", "f"),
            similarity_score: 0.85,
            distance: None,
            rank: 1,
            relevance_reason: Some("keyword overlap 2/2".to_string()),
        };

        let json = serde_json::to_value(SearchHit::from(&found)).unwrap();
        assert_eq!(json["confidence_level"], "HIGH");
        assert_eq!(json["rank"], 1);
        assert_eq!(json["entry"]["title"], "Disk full");
    }

    #[tokio::test]
    async fn test_only_memory_backend_is_seeded_at_startup() {
        let repository = KnowledgeRepository::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(DisabledEmbeddings),
        );
        let handle = repository.initialize("kb").await.unwrap();

        let seeded = seed_ephemeral(StoreBackend::Chroma, &repository, &handle).await.unwrap();
        assert_eq!(seeded, 0);
        assert!(repository.get_all(&handle).await.unwrap().is_empty());

        let seeded = seed_ephemeral(StoreBackend::Memory, &repository, &handle).await.unwrap();
        assert_eq!(seeded, seed_entries().len());
        assert_eq!(seed_ephemeral(StoreBackend::Memory, &repository, &handle).await.unwrap(), 0);
    }

    #[test]
    fn test_cli_parses_kb_commands() {
        let cli = Cli::try_parse_from(["triage", "--quiet", "kb", "delete", "kb_1"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Kb(KbCommands::Delete { ref id }) if id == "kb_1"));
    }
}

//! End-to-end similarity search against a local Ollama server.
//!
//! Seeds an in-memory knowledge base, then runs a few incident queries and
//! reports which seed entries were found. Without Ollama the engine falls
//! back to keyword search, which this run reports too.

use std::sync::Arc;
use triage_core::{EmbeddingConfig, SimilarityConfig};
use triage_knowledge::{EmbeddingProvider, KnowledgeRepository, OllamaEmbeddingClient, SimilarityEngine};
use triage_storage::InMemoryVectorStore;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    println!("=== Knowledge Base Similarity Search E2E ===\n");

    let embeddings = Arc::new(OllamaEmbeddingClient::from_config(&EmbeddingConfig::default()));
    if embeddings.is_available().await {
        println!("[OK] Ollama is available, using vector search\n");
    } else {
        println!("[WARN] Ollama is not available, using keyword search\n");
    }

    let repository = Arc::new(KnowledgeRepository::new(
        Arc::new(InMemoryVectorStore::new()),
        embeddings,
    ));
    let handle = repository.initialize("incident_knowledge").await?;
    let seeded = repository.seed_if_empty(&handle).await?;
    println!("[OK] Seeded {} entries\n", seeded);

    let engine = SimilarityEngine::new(
        repository,
        SimilarityConfig {
            threshold: 0.4,
            ..Default::default()
        },
    );

    let tests = vec![
        ("database connection timeout in production", "DATABASE_CONNECTION_ERROR"),
        ("no space left on device while writing logs", "DISK_FULL"),
        ("java.lang.OutOfMemoryError heap space", "OUT_OF_MEMORY"),
        ("tls handshake fails with certificate has expired", "CERTIFICATE_EXPIRED"),
    ];

    let mut passed = 0;
    let total = tests.len();

    for (query, expected) in tests {
        println!("Query: '{}'", query);
        let matches = engine.search(&handle, query, 3).await;
        for m in &matches {
            println!(
                "  #{} {} ({}) score={:.3} [{}]",
                m.rank,
                m.entry.title,
                m.entry.pattern_type,
                m.similarity_score,
                m.relevance_reason.as_deref().unwrap_or("-")
            );
        }

        if matches.iter().any(|m| m.entry.pattern_type == expected) {
            println!("[PASS] Found {}\n", expected);
            passed += 1;
        } else {
            println!("[FAIL] Expected {}\n", expected);
        }
    }

    println!("=== Test Summary ===");
    println!("Passed: {}/{}", passed, total);

    Ok(())
}

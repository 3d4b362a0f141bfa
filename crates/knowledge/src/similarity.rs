//! Similarity search over the knowledge base.
//!
//! Uses a vector query when the embedding provider is available and falls
//! back to keyword overlap scoring when embeddings are unavailable or the
//! store cannot serve a vector query. Failures never reach the caller: the
//! worst outcome is an empty result list.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use triage_core::{clamp_unit, KnowledgeEntry, SimilarityConfig, SimilarityMatch};
use triage_storage::{CollectionHandle, QueryInput, StoreError};

use crate::repository::{KnowledgeRepository, RepositoryError};

/// Ranks knowledge entries by similarity to a query.
#[derive(Clone)]
pub struct SimilarityEngine {
    repository: Arc<KnowledgeRepository>,
    config: SimilarityConfig,
}

impl SimilarityEngine {
    /// Create a new engine.
    pub fn new(repository: Arc<KnowledgeRepository>, config: SimilarityConfig) -> Self {
        Self { repository, config }
    }

    /// The repository searched by this engine.
    pub fn repository(&self) -> &Arc<KnowledgeRepository> {
        &self.repository
    }

    /// Up to `max_results` matches at or above the similarity threshold,
    /// best first, ranked from 1.
    pub async fn search(
        &self,
        handle: &CollectionHandle,
        query: &str,
        max_results: usize,
    ) -> Vec<SimilarityMatch> {
        if max_results == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        let embeddings = self.repository.embeddings();
        let candidates = if embeddings.is_available().await {
            match embeddings.generate_embedding(query).await {
                Ok(vector) => {
                    self.vector_search(handle, query, QueryInput::Embedding(vector), max_results)
                        .await
                }
                Err(e) => {
                    warn!("Query embedding failed, using keyword search: {}", e);
                    self.keyword_search(handle, query).await
                }
            }
        } else if self.config.store_side_embedding {
            self.vector_search(handle, query, QueryInput::Text(query.to_string()), max_results)
                .await
        } else {
            debug!("Embeddings unavailable, using keyword search");
            self.keyword_search(handle, query).await
        };

        rank(candidates, self.config.threshold, max_results)
    }

    async fn vector_search(
        &self,
        handle: &CollectionHandle,
        query: &str,
        input: QueryInput,
        max_results: usize,
    ) -> Vec<SimilarityMatch> {
        match self
            .repository
            .query(handle, &input, max_results, self.config.threshold)
            .await
        {
            Ok(hits) => hits
                .into_iter()
                .map(|hit| SimilarityMatch {
                    entry: hit.entry,
                    similarity_score: hit.similarity,
                    distance: Some(hit.distance),
                    rank: 0,
                    relevance_reason: Some(format!("vector distance {:.3}", hit.distance)),
                })
                .collect(),
            Err(RepositoryError::Store(StoreError::UnsupportedRequest(reason))) => {
                info!("Vector query unsupported ({}), using keyword search", reason);
                self.keyword_search(handle, query).await
            }
            Err(e) => {
                error!("Knowledge base query failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn keyword_search(&self, handle: &CollectionHandle, query: &str) -> Vec<SimilarityMatch> {
        let entries = match self.repository.get_all(handle).await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Knowledge base scan failed: {}", e);
                return Vec::new();
            }
        };

        let scorer = KeywordScorer::new(query, &self.config);
        entries
            .into_iter()
            .map(|entry| {
                let (score, reason) = scorer.score(&entry);
                SimilarityMatch {
                    entry,
                    similarity_score: score,
                    distance: None,
                    rank: 0,
                    relevance_reason: Some(reason),
                }
            })
            .collect()
    }
}

/// Keyword overlap scoring for one query.
pub struct KeywordScorer<'a> {
    query_lower: String,
    tokens: Vec<String>,
    config: &'a SimilarityConfig,
}

impl<'a> KeywordScorer<'a> {
    /// Tokenize a query: lower-case, whitespace separated, tokens shorter
    /// than `min_token_len` dropped. Edge punctuation is kept unless
    /// `trim_token_punctuation` is set.
    pub fn new(query: &str, config: &'a SimilarityConfig) -> Self {
        let query_lower = query.trim().to_lowercase();
        let tokens = query_lower
            .split_whitespace()
            .map(|t| {
                if config.trim_token_punctuation {
                    t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
                } else {
                    t
                }
            })
            .filter(|t| t.chars().count() >= config.min_token_len)
            .map(str::to_string)
            .collect();
        Self {
            query_lower,
            tokens,
            config,
        }
    }

    /// Query tokens that count towards the overlap ratio.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Score an entry in `[0, 1]` with a short explanation.
    pub fn score(&self, entry: &KnowledgeEntry) -> (f32, String) {
        let text = entry.searchable_text().to_lowercase();

        let matched = self.tokens.iter().filter(|t| text.contains(t.as_str())).count();
        let mut score = if self.tokens.is_empty() {
            0.0
        } else {
            matched as f32 / self.tokens.len() as f32
        };
        let mut reason = format!("keyword overlap {}/{}", matched, self.tokens.len());

        if !self.query_lower.is_empty() && text.contains(&self.query_lower) {
            score += self.config.phrase_bonus;
            reason.push_str(", exact phrase");
        }

        let pattern = entry.pattern_type.replace('_', " ").to_lowercase();
        let pattern = pattern.trim();
        if !pattern.is_empty() && self.query_lower.contains(pattern) {
            score += self.config.pattern_type_bonus;
            reason.push_str(", pattern type");
        }

        (clamp_unit(score), reason)
    }
}

/// Threshold, sort best first and assign ranks `1..=n`.
///
/// The sort is stable, so ties keep the order the candidates arrived in.
pub fn rank(candidates: Vec<SimilarityMatch>, threshold: f32, max_results: usize) -> Vec<SimilarityMatch> {
    let mut matches: Vec<_> = candidates
        .into_iter()
        .map(|mut m| {
            m.similarity_score = clamp_unit(m.similarity_score);
            m
        })
        .filter(|m| m.similarity_score >= threshold)
        .collect();

    matches.sort_by(|a, b| {
        b.similarity_score
            .partial_cmp(&a.similarity_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches.truncate(max_results);

    for (i, m) in matches.iter_mut().enumerate() {
        m.rank = i + 1;
    }
    matches
}

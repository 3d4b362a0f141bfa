//! Classification orchestration.
//!
//! `classify` consults the knowledge base first and reuses a similar solved
//! incident when it is a good enough match. Otherwise it asks the language
//! model, validates the answer and writes confident answers back into the
//! knowledge base so the next similar incident is served from the cache.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use triage_core::{
    clamp_unit, ClassificationResult, ClassificationSource, IncidentDescriptor, KnowledgeEntry,
    KnowledgeEntryId, OrchestratorConfig, MANUAL_REVIEW_SUGGESTION, MISSING_REASONING,
};
use triage_knowledge::SimilarityEngine;
use triage_storage::CollectionHandle;

use crate::classifier::{build_prompt, ClassifierError, LanguageModel};
use crate::parser::ResponseParser;

/// Tag carried by every written-back entry.
pub const AI_GENERATED_TAG: &str = "ai-generated";

/// Failures that turn a classification into a fallback result.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Language model call failed
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Knowledge base lookup, model call and write-back.
pub struct ClassificationOrchestrator {
    engine: SimilarityEngine,
    model: Arc<dyn LanguageModel>,
    parser: ResponseParser,
    handle: CollectionHandle,
    config: OrchestratorConfig,
}

impl ClassificationOrchestrator {
    /// Create an orchestrator bound to an initialized collection.
    pub fn new(
        engine: SimilarityEngine,
        model: Arc<dyn LanguageModel>,
        handle: CollectionHandle,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            engine,
            model,
            parser: ResponseParser::new(),
            handle,
            config,
        }
    }

    /// The collection this orchestrator reads and writes.
    pub fn handle(&self) -> &CollectionHandle {
        &self.handle
    }

    /// Classify an incident. Never fails; internal errors produce a
    /// `FALLBACK` result with zero confidence.
    pub async fn classify(&self, incident: &IncidentDescriptor) -> ClassificationResult {
        match self.try_classify(incident).await {
            Ok(result) => result,
            Err(e) => {
                error!("Classification of {} failed: {}", incident.external_id, e);
                ClassificationResult::fallback(e)
            }
        }
    }

    async fn try_classify(&self, incident: &IncidentDescriptor) -> Result<ClassificationResult, ClassifyError> {
        let query = incident.query_text();
        let matches = self
            .engine
            .search(&self.handle, &query, self.config.max_matches)
            .await;

        if let Some(top) = matches.first() {
            if self.accepts(&top.entry, incident) {
                info!(
                    "Incident {} matched knowledge entry {} (similarity {:.3})",
                    incident.external_id, top.entry.id, top.similarity_score
                );
                return Ok(validate(cache_result(&top.entry)));
            }
            debug!(
                "Best match {} rejected for incident {} ({} vs {})",
                top.entry.id, incident.external_id, top.entry.pattern_type, incident.incident_type
            );
        }

        let prompt = build_prompt(incident);
        let raw = self.model.complete(&prompt).await?;
        let result = validate(self.parser.parse(&raw));

        self.write_back(incident, &result).await;
        Ok(result)
    }

    /// A match is reused when its pattern type and the incident type contain
    /// one another, or when the entry itself is highly trusted.
    fn accepts(&self, entry: &KnowledgeEntry, incident: &IncidentDescriptor) -> bool {
        let pattern = entry.pattern_type.trim().to_lowercase();
        let incident_type = incident.incident_type.trim().to_lowercase();
        let type_match = !pattern.is_empty()
            && !incident_type.is_empty()
            && (incident_type.contains(&pattern) || pattern.contains(&incident_type));

        type_match || entry.confidence_score > self.config.good_match_confidence
    }

    async fn write_back(&self, incident: &IncidentDescriptor, result: &ClassificationResult) {
        if !self.config.write_back_enabled
            || result.source != ClassificationSource::Model
            || result.confidence <= self.config.write_back_min_confidence
        {
            return;
        }

        let entry = self.entry_from_result(incident, result);
        match self.engine.repository().add(&self.handle, &entry).await {
            Ok(()) => info!(
                "Wrote back knowledge entry {} for incident {}",
                entry.id, incident.external_id
            ),
            Err(e) => warn!(
                "Failed to write back classification for incident {}: {}",
                incident.external_id, e
            ),
        }
    }

    fn entry_from_result(&self, incident: &IncidentDescriptor, result: &ClassificationResult) -> KnowledgeEntry {
        let prefix: String = incident
            .description
            .chars()
            .take(self.config.title_prefix_chars)
            .collect();

        let mut tags = vec![AI_GENERATED_TAG.to_string()];
        if !incident.external_id.trim().is_empty() {
            tags.push(incident.external_id.clone());
        }

        let mut entry = KnowledgeEntry::new(
            format!("AI Classified: {}", prefix),
            incident.incident_type.clone(),
            result.severity,
            incident.description.clone(),
            result.reasoning.clone(),
            result.suggestion.clone(),
        )
        .with_id(KnowledgeEntryId::derived(&incident.incident_type, &prefix))
        .with_confidence(result.confidence)
        .with_success_rate(self.config.write_back_success_rate)
        .with_tags(tags);

        if let Some(environment) = incident.metadata.get("environment") {
            entry = entry.with_environments([environment.clone()]);
        }
        entry
    }
}

fn cache_result(entry: &KnowledgeEntry) -> ClassificationResult {
    ClassificationResult::new(
        entry.severity,
        entry.confidence_score,
        format!("Found similar incident in knowledge base: {}", entry.title),
        entry.solution.clone(),
        ClassificationSource::Cache,
    )
}

/// Clamp confidence and fill empty text fields.
pub fn validate(mut result: ClassificationResult) -> ClassificationResult {
    result.confidence = clamp_unit(result.confidence);
    if result.reasoning.trim().is_empty() {
        result.reasoning = MISSING_REASONING.to_string();
    }
    if result.suggestion.trim().is_empty() {
        result.suggestion = MANUAL_REVIEW_SUGGESTION.to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use triage_core::{Severity, SimilarityConfig};
    use triage_knowledge::{DisabledEmbeddings, KnowledgeRepository};
    use triage_storage::InMemoryVectorStore;

    /// Returns a fixed completion and counts calls.
    struct ScriptedModel {
        reply: String,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct DownModel;

    #[async_trait]
    impl LanguageModel for DownModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ClassifierError> {
            Err(ClassifierError::Unavailable("connection refused".into()))
        }
    }

    const MODEL_REPLY: &str =
        "SEVERITY: HIGH\nCONFIDENCE: 0.85\nREASONING: pool exhausted\nSUGGESTION: restart pool";

    async fn setup(
        model: Arc<dyn LanguageModel>,
        entries: &[KnowledgeEntry],
        similarity: SimilarityConfig,
    ) -> (ClassificationOrchestrator, Arc<KnowledgeRepository>) {
        let repo = Arc::new(KnowledgeRepository::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(DisabledEmbeddings),
        ));
        let handle = repo.initialize("kb").await.unwrap();
        repo.add_all(&handle, entries).await.unwrap();

        let engine = SimilarityEngine::new(repo.clone(), similarity);
        let orchestrator =
            ClassificationOrchestrator::new(engine, model, handle, OrchestratorConfig::default());
        (orchestrator, repo)
    }

    fn db_entry(confidence: f32) -> KnowledgeEntry {
        KnowledgeEntry::new(
            "Connection pool exhausted",
            "DATABASE_CONNECTION_ERROR",
            Severity::High,
            "database connection timeout under load",
            "pool too small",
            "increase pool size",
        )
        .with_confidence(confidence)
    }

    fn db_incident() -> IncidentDescriptor {
        IncidentDescriptor::new(
            "INC-1",
            "DATABASE_CONNECTION_ERROR",
            "database connection timeout in production",
        )
        .with_source("monitoring")
    }

    #[tokio::test]
    async fn test_cache_hit_on_matching_type() {
        let model = ScriptedModel::new(MODEL_REPLY);
        let entry = db_entry(0.95);
        let (orchestrator, _) = setup(model.clone(), &[entry.clone()], SimilarityConfig::default()).await;

        let result = orchestrator.classify(&db_incident()).await;
        assert_eq!(result.source, ClassificationSource::Cache);
        assert_eq!(result.confidence, 0.95);
        assert_eq!(result.severity, entry.severity);
        assert_eq!(
            result.reasoning,
            "Found similar incident in knowledge base: Connection pool exhausted"
        );
        assert_eq!(result.suggestion, "increase pool size");
        assert!(result.processed);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_on_partial_type_match() {
        let model = ScriptedModel::new(MODEL_REPLY);
        let (orchestrator, _) = setup(model.clone(), &[db_entry(0.5)], SimilarityConfig::default()).await;

        let incident = IncidentDescriptor::new(
            "INC-2",
            "DATABASE",
            "database connection timeout under load",
        );
        let result = orchestrator.classify(&incident).await;
        assert_eq!(result.source, ClassificationSource::Cache);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_on_trusted_entry_with_other_type() {
        let model = ScriptedModel::new(MODEL_REPLY);
        let (orchestrator, _) = setup(model.clone(), &[db_entry(0.9)], SimilarityConfig::default()).await;

        let incident = IncidentDescriptor::new("INC-3", "LATENCY", "database connection timeout under load");
        let result = orchestrator.classify(&incident).await;
        assert_eq!(result.source, ClassificationSource::Cache);
        assert_eq!(result.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_weak_match_goes_to_model() {
        let model = ScriptedModel::new(MODEL_REPLY);
        let (orchestrator, _) = setup(model.clone(), &[db_entry(0.6)], SimilarityConfig::default()).await;

        let incident = IncidentDescriptor::new("INC-4", "LATENCY", "database connection timeout under load");
        let result = orchestrator.classify(&incident).await;
        assert_eq!(result.source, ClassificationSource::Model);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_result_written_back_on_empty_kb() {
        let model = ScriptedModel::new(MODEL_REPLY);
        let (orchestrator, repo) = setup(model.clone(), &[], SimilarityConfig::default()).await;
        let incident = db_incident().with_metadata("environment", "production");

        let result = orchestrator.classify(&incident).await;
        assert_eq!(result.severity, Severity::High);
        assert!((result.confidence - 0.85).abs() < 1e-6);
        assert_eq!(result.source, ClassificationSource::Model);
        assert_eq!(result.reasoning, "pool exhausted");
        assert_eq!(result.suggestion, "restart pool");

        let stored = repo.get_all(orchestrator.handle()).await.unwrap();
        assert_eq!(stored.len(), 1);
        let entry = &stored[0];
        assert_eq!(entry.pattern_type, incident.incident_type);
        assert!((entry.confidence_score - 0.85).abs() < 1e-6);
        assert_eq!(entry.title, "AI Classified: database connection timeout in production");
        assert_eq!(entry.symptoms, incident.description);
        assert_eq!(entry.root_cause, "pool exhausted");
        assert_eq!(entry.solution, "restart pool");
        assert!((entry.success_rate - 0.8).abs() < 1e-6);
        assert!(entry.tags.contains(AI_GENERATED_TAG));
        assert!(entry.tags.contains("INC-1"));
        assert!(entry.environments.contains("production"));

        // The written-back entry now serves the same incident from the cache.
        let again = orchestrator.classify(&incident).await;
        assert_eq!(again.source, ClassificationSource::Cache);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_low_confidence_not_written_back() {
        let model = ScriptedModel::new("SEVERITY: MEDIUM\nCONFIDENCE: 0.65\nREASONING: r\nSUGGESTION: s");
        let (orchestrator, repo) = setup(model, &[], SimilarityConfig::default()).await;

        let result = orchestrator.classify(&db_incident()).await;
        assert_eq!(result.source, ClassificationSource::Model);
        assert!(repo.get_all(orchestrator.handle()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_back_threshold_is_exclusive() {
        let model = ScriptedModel::new("SEVERITY: MEDIUM\nCONFIDENCE: 0.7\nREASONING: r\nSUGGESTION: s");
        let (orchestrator, repo) = setup(model, &[], SimilarityConfig::default()).await;

        orchestrator.classify(&db_incident()).await;
        assert!(repo.get_all(orchestrator.handle()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_write_back_upserts() {
        let model = ScriptedModel::new(MODEL_REPLY);
        // A threshold above 1 disables cache hits, so every call reaches the model.
        let (orchestrator, repo) = setup(
            model.clone(),
            &[],
            SimilarityConfig {
                threshold: 1.1,
                ..Default::default()
            },
        )
        .await;

        orchestrator.classify(&db_incident()).await;
        orchestrator.classify(&db_incident()).await;
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert_eq!(repo.get_all(orchestrator.handle()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_returns_fallback() {
        let (orchestrator, repo) = setup(Arc::new(DownModel), &[], SimilarityConfig::default()).await;

        let result = orchestrator.classify(&db_incident()).await;
        assert_eq!(result.source, ClassificationSource::Fallback);
        assert_eq!(result.severity, Severity::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.processed);
        assert!(result.reasoning.starts_with("AI classification unavailable: "));
        assert!(result.reasoning.contains("connection refused"));
        assert_eq!(result.suggestion, MANUAL_REVIEW_SUGGESTION);
        assert!(repo.get_all(orchestrator.handle()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_unknown_and_not_written_back() {
        let model = ScriptedModel::new("I am not sure what this is.");
        let (orchestrator, repo) = setup(model, &[], SimilarityConfig::default()).await;

        let result = orchestrator.classify(&db_incident()).await;
        assert_eq!(result.severity, Severity::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.source, ClassificationSource::Model);
        assert!(repo.get_all(orchestrator.handle()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confidence_always_in_unit_range() {
        let replies = [
            "",
            "garbage",
            "CONFIDENCE: 7",
            "CONFIDENCE: -3",
            "SEVERITY: HIGH",
            "SEVERITY: LOW\nCONFIDENCE: 150%\nREASONING:\nSUGGESTION:",
        ];

        for reply in replies {
            let (orchestrator, _) =
                setup(ScriptedModel::new(reply), &[], SimilarityConfig::default()).await;
            let result = orchestrator.classify(&db_incident()).await;
            assert!((0.0..=1.0).contains(&result.confidence), "reply {:?}", reply);
            assert!(!result.reasoning.is_empty());
            assert!(!result.suggestion.is_empty());
        }
    }

    #[test]
    fn test_validate_clamps_and_fills() {
        let raw = ClassificationResult::new(Severity::Low, 1.5, " ", "", ClassificationSource::Model);
        let result = validate(raw);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reasoning, MISSING_REASONING);
        assert_eq!(result.suggestion, MANUAL_REVIEW_SUGGESTION);
    }
}

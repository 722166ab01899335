// ABOUTME: Orchestrator wiring normalize -> recognize -> NER -> resolve -> title -> semantic -> tag -> validate -> encrypt
// ABOUTME: Owns the single KeyProvider instance so one-shot and session-bound calls share one key
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Anonymizer orchestrator (§4.14).

use crate::cache::{FileSystemModelCache, ModelCache};
use crate::config::{NerBackend as NerBackendConfig, NerMode, PiiAnonymizerConfig};
use crate::constants;
use crate::crypto::{self, InMemoryKeyProvider, KeyProvider};
use crate::errors::{AnonymizerResult, DataUnavailable, PiiError};
use crate::ner::{NerBackend, RemoteBackend, StubBackend};
use crate::normalize::{normalize, NormalizeOptions};
use crate::policy::{AnonymizationPolicy, PolicyPatch};
use crate::recognizers::RecognizerRegistry;
use crate::resolver::resolve;
use crate::semantic::{enrich_semantics, SemanticDatabase};
use crate::tagger::tag;
use crate::title::{extract_titles_from_spans, merge_adjacent_title_spans};
use crate::types::{count_entities_by_type, AnonymizationResult, AnonymizationStats, RawPIIMap};
use crate::validator::validate;
use std::sync::Mutex;
use std::time::Instant;

const POLICY_VERSION: &str = "v1";

/// Ties together every pipeline stage behind a single `anonymize` entry point
/// (§4.14). Construction never fails; [`Anonymizer::initialize`] performs the
/// fallible setup (remote health check, semantic data load) separately so
/// callers can decide how to react to a degraded start.
pub struct Anonymizer {
    registry: RecognizerRegistry,
    policy: AnonymizationPolicy,
    key_provider: Box<dyn KeyProvider>,
    ner_backend: Box<dyn NerBackend>,
    semantic_db: Mutex<Option<SemanticDatabase>>,
    model_cache: Box<dyn ModelCache>,
    locale: Option<String>,
    ner_mode: NerMode,
}

impl Anonymizer {
    /// Builds the recognizer registry, the default policy (seeded from
    /// `config.initial_policy`), a random in-memory key, and selects the NER
    /// backend per `config.ner_mode`/`config.ner_backend` (§4.14 step "construction").
    #[must_use]
    pub fn new(config: PiiAnonymizerConfig) -> Self {
        let ner_backend: Box<dyn NerBackend> = match (&config.ner_mode, &config.ner_backend) {
            (NerMode::Disabled, _) => Box::new(StubBackend),
            (_, NerBackendConfig::Remote { url, timeout }) => Box::new(RemoteBackend::new(url.clone(), *timeout)),
            // Local inference needs a concrete `LogitsModel` impl supplied by the
            // embedding application; none is wired in here, so it degrades to the
            // stub until a caller constructs its own `LocalBackend` directly.
            (_, NerBackendConfig::Local) => Box::new(StubBackend),
        };

        let model_cache: Box<dyn ModelCache> = match &config.cache_root_override {
            Some(root) => Box::new(FileSystemModelCache::at_root(std::path::PathBuf::from(root.clone()))),
            None => Box::new(FileSystemModelCache::for_app(constants::cache::APP_NAME)),
        };

        Self {
            registry: RecognizerRegistry::with_builtins(),
            policy: config.initial_policy,
            key_provider: Box::new(InMemoryKeyProvider::generate_random()),
            ner_backend,
            semantic_db: Mutex::new(None),
            model_cache,
            locale: config.default_locale,
            ner_mode: config.ner_mode,
        }
    }

    /// Performs the fallible setup that construction defers: a remote NER
    /// health check, and (if `enable_semantic_masking` is set) ensuring the
    /// semantic auxiliary data file is present and loading it (§4.14 `initialize`).
    ///
    /// # Errors
    /// Propagates [`crate::errors::ModelLoadError`] on a failed remote health
    /// check or missing semantic data.
    pub async fn initialize(&self) -> AnonymizerResult<()> {
        self.ner_backend.health_check().await?;

        if self.policy.enable_semantic_masking {
            let path = self
                .model_cache
                .ensure_file(constants::cache::SEMANTIC_DATA_SUBDIR, "names.txt", &|_path| {
                    Err(crate::errors::ModelLoadError::SemanticDataFailed(
                        "no semantic data source configured; call load_semantic_database explicitly".to_string(),
                    ))
                })
                .await;

            if let Ok(path) = path {
                if let Ok(contents) = std::fs::read_to_string(&path) {
                    let mut db = SemanticDatabase::new();
                    for line in contents.lines() {
                        db.load_name_line(line);
                    }
                    *self.semantic_db.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(db);
                }
            }
        }

        tracing::info!(ner_mode = ?self.ner_mode, "anonymizer initialized");
        Ok(())
    }

    /// Replaces the in-memory semantic database, e.g. with one built by the
    /// caller from its own `nam_dict`/GeoNames sources (§4.8).
    pub fn load_semantic_database(&self, db: SemanticDatabase) {
        *self.semantic_db.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(db);
    }

    #[must_use]
    pub fn key_provider(&self) -> &dyn KeyProvider {
        self.key_provider.as_ref()
    }

    /// Runs the full pipeline and encrypts the resulting map under this
    /// anonymizer's key provider (§4.14).
    ///
    /// # Errors
    /// Propagates any pipeline-stage error.
    pub async fn anonymize(&self, text: &str, patch: Option<&PolicyPatch>) -> AnonymizerResult<AnonymizationResult> {
        let (result, _raw_map) = self.anonymize_with_existing(text, patch, None).await?;
        Ok(result)
    }

    /// Runs the full pipeline, seeding id assignment and first-wins map
    /// entries from `existing`. Returns both the encrypted [`AnonymizationResult`]
    /// and the unencrypted [`RawPIIMap`] (including `existing`'s entries) so
    /// the session layer can merge-and-re-encrypt without re-running the
    /// pipeline (§4.13, §4.14).
    ///
    /// # Errors
    /// Propagates any pipeline-stage error, or [`DataUnavailable::SemanticDataMissing`]
    /// if semantic masking is enabled but no semantic database has been loaded.
    pub async fn anonymize_with_existing(
        &self,
        text: &str,
        patch: Option<&PolicyPatch>,
        existing: Option<&RawPIIMap>,
    ) -> AnonymizerResult<(AnonymizationResult, RawPIIMap)> {
        let started = Instant::now();
        let policy = match patch {
            Some(patch) => self.policy.merged_with(patch),
            None => self.policy.clone(),
        };

        let normalized = normalize(text, NormalizeOptions::default());
        let normalized_text = normalized.text.as_str();

        let regex_matches = self.registry.find_all(normalized_text, &policy);
        let ner_prediction = self.ner_backend.predict(normalized_text, &policy).await?;

        let mut resolved = resolve(regex_matches, ner_prediction.spans, &policy, normalized_text);

        if policy.enable_semantic_masking {
            resolved = merge_adjacent_title_spans(resolved, normalized_text, constants::policy::DEFAULT_TITLE_MERGE_MAX_GAP);
            resolved = extract_titles_from_spans(resolved, normalized_text);

            let guard = self.semantic_db.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match guard.as_ref() {
                Some(db) => resolved = enrich_semantics(resolved, db, self.locale.as_deref()),
                None => return Err(PiiError::from(DataUnavailable::SemanticDataMissing)),
            }
        }

        let tag_result = tag(normalized_text, &resolved, &policy, existing);

        let report = validate(&tag_result.anonymized_text, &tag_result.pii_map, &policy, &self.registry);
        if !report.valid {
            tracing::warn!(issues = report.errors.len(), "validation findings on anonymize call");
        }

        let envelope = crypto::encrypt_map(&tag_result.pii_map, self.key_provider.as_ref())?;

        let stats = AnonymizationStats {
            counts_by_type: count_entities_by_type(&tag_result.entities),
            total_entities: tag_result.entities.len() as u32,
            processing_time_ms: started.elapsed().as_millis() as u64,
            model_version: ner_prediction.model_version,
            policy_version: POLICY_VERSION.to_string(),
            leak_scan_passed: report.leak_scan_passed,
        };

        let result = AnonymizationResult {
            anonymized_text: tag_result.anonymized_text,
            entities: tag_result.entities,
            pii_map: envelope,
            stats,
        };

        Ok((result, tag_result.pii_map))
    }

    /// Releases in-memory semantic data. Cheap to call repeatedly (§4.14 `dispose`).
    pub fn dispose(&self) {
        *self.semantic_db.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PiiAnonymizerConfig;

    #[tokio::test]
    async fn anonymize_tags_an_email_and_encrypts_the_map() {
        let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
        let result = anonymizer
            .anonymize("contact jane@example.com today", None)
            .await
            .unwrap();
        assert!(result.anonymized_text.contains(r#"<PII type="EMAIL" id="1"/>"#));
        assert!(!result.pii_map.ciphertext.is_empty());
        assert_eq!(result.stats.total_entities, 1);
    }

    #[tokio::test]
    async fn anonymize_with_existing_reuses_ids_and_returns_raw_map() {
        let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
        let mut existing = RawPIIMap::new();
        existing.insert_first_wins("EMAIL_1", "jane@example.com");

        let (result, raw_map) = anonymizer
            .anonymize_with_existing("jane@example.com again", None, Some(&existing))
            .await
            .unwrap();

        assert!(result.anonymized_text.contains(r#"id="1""#));
        assert_eq!(raw_map.get("EMAIL_1"), Some("jane@example.com"));
    }

    #[tokio::test]
    async fn semantic_masking_without_loaded_database_errors() {
        let mut config = PiiAnonymizerConfig::from_env();
        config.initial_policy.enable_semantic_masking = true;
        let anonymizer = Anonymizer::new(config);
        let result = anonymizer.anonymize("Jane Doe lives in Chicago", None).await;
        assert!(matches!(result, Err(PiiError::DataUnavailable(_))));
    }

    #[tokio::test]
    async fn semantic_masking_succeeds_after_explicit_database_load() {
        let mut config = PiiAnonymizerConfig::from_env();
        config.initial_policy.enable_semantic_masking = true;
        let anonymizer = Anonymizer::new(config);
        let mut db = SemanticDatabase::new();
        db.load_name_line("F jane 1234");
        anonymizer.load_semantic_database(db);

        // No NER backend is wired in by default, so no PERSON span is ever
        // produced for the enrichment step to annotate -- this only checks
        // that a loaded database clears the `DataUnavailable` error path.
        let result = anonymizer.anonymize("Jane said hello", None).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn initialize_fails_fast_on_unreachable_remote_ner_backend() {
        let mut config = PiiAnonymizerConfig::from_env();
        config.ner_backend = crate::config::NerBackend::Remote {
            url: "http://127.0.0.1:1".to_string(),
            timeout: std::time::Duration::from_millis(50),
        };
        let anonymizer = Anonymizer::new(config);
        let result = anonymizer.initialize().await;
        assert!(matches!(result, Err(PiiError::ModelLoad(_))));
    }
}

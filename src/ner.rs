// ABOUTME: Uniform NER predict() contract with stub/local/remote backend implementations
// ABOUTME: Mirrors the pluggable CacheProvider trait pattern for swappable backends
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! NER adapter (C6, §4.5).

use crate::bio::{cleanup_boundaries, decode_bio, filter_by_policy, merge_adjacent_spans};
use crate::constants;
use crate::errors::{AnonymizerResult, InferenceError, ModelLoadError};
use crate::policy::AnonymizationPolicy;
use crate::tokenizer::{Tokenizer, Vocabulary};
use crate::types::{DetectionSource, PIIType, SpanMatch};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Output of a `predict` call: spans in normalized-text coordinates, plus
/// timing and model identity for stats (§4.5).
#[derive(Debug, Clone)]
pub struct NerPrediction {
    pub spans: Vec<SpanMatch>,
    pub processing_time_ms: u64,
    pub model_version: String,
}

/// Uniform NER backend contract. Local inference, remote inference, and the
/// disabled stub all implement this so the orchestrator (§4.14) can treat
/// them interchangeably, mirroring how the teacher's cache providers share
/// one trait across memory/redis backends.
#[async_trait]
pub trait NerBackend: Send + Sync {
    async fn predict(&self, text: &str, policy: &AnonymizationPolicy) -> AnonymizerResult<NerPrediction>;

    /// Fails fast on a misconfigured or unreachable backend, called from the
    /// orchestrator's `initialize` before `predict` is ever invoked (§4.5,
    /// §7). The stub and local backends have nothing to check.
    async fn health_check(&self) -> Result<(), ModelLoadError> {
        Ok(())
    }
}

/// Applies the boundary-cleanup and adjacent-span-merge post-processing
/// that `decode_bio` itself does not perform, so every `NerBackend` that
/// produces spans from raw BIO labels shares the same finishing pass
/// (§4.4). Spans left empty by cleanup (pure whitespace/punctuation) are
/// dropped rather than carried forward as zero-length entities.
fn finalize_decoded_spans(mut spans: Vec<SpanMatch>, text: &str) -> Vec<SpanMatch> {
    for span in &mut spans {
        cleanup_boundaries(span, text);
    }
    spans.retain(|span| span.start < span.end);
    merge_adjacent_spans(spans, text, constants::ner::SPAN_MERGE_CONFIDENCE_THRESHOLD)
}

/// NER disabled: always returns an empty span set (§4.5 variant c).
pub struct StubBackend;

#[async_trait]
impl NerBackend for StubBackend {
    async fn predict(&self, _text: &str, _policy: &AnonymizationPolicy) -> AnonymizerResult<NerPrediction> {
        Ok(NerPrediction {
            spans: Vec::new(),
            processing_time_ms: 0,
            model_version: "stub".to_string(),
        })
    }
}

/// A model capable of producing per-token logits; the concrete numeric
/// backend (ONNX runtime, candle, etc.) is out of scope, so this trait is the
/// seam the rest of the crate depends on.
pub trait LogitsModel: Send + Sync {
    /// Returns `per_token_logits[token_index][label_index]` and the ordered
    /// label names the logit columns correspond to.
    fn infer(&self, input_ids: &[u32], attention_mask: &[u32]) -> (Vec<Vec<f32>>, Vec<String>);

    fn version(&self) -> &str;
}

/// Local inference: tokenize, run logits, BIO-decode (§4.5 variant a).
pub struct LocalBackend<M: LogitsModel> {
    vocabulary: Vocabulary,
    model: M,
    max_length: usize,
}

impl<M: LogitsModel> LocalBackend<M> {
    #[must_use]
    pub fn new(vocabulary: Vocabulary, model: M, max_length: usize) -> Self {
        Self {
            vocabulary,
            model,
            max_length,
        }
    }
}

#[async_trait]
impl<M: LogitsModel> NerBackend for LocalBackend<M> {
    async fn predict(&self, text: &str, policy: &AnonymizationPolicy) -> AnonymizerResult<NerPrediction> {
        let started = std::time::Instant::now();
        let tokenizer = Tokenizer::new(&self.vocabulary, self.max_length);
        let encoding = tokenizer.encode(text);
        let (logits, label_names) = self
            .model
            .infer(&encoding.input_ids, &encoding.attention_mask);
        let spans = decode_bio(&encoding.tokens, &logits, &label_names);
        let spans = finalize_decoded_spans(spans, text);
        let spans = filter_by_policy(spans, policy);

        Ok(NerPrediction {
            spans,
            processing_time_ms: started.elapsed().as_millis() as u64,
            model_version: self.model.version().to_string(),
        })
    }
}

/// Raw logits payload from a remote server that has not pre-decoded BIO
/// spans itself (§4.5 variant b, first shape).
#[derive(Debug, Deserialize)]
struct RemoteLogitsResponse {
    input_ids: Vec<u32>,
    attention_mask: Vec<u32>,
    token_char_spans: Vec<Option<(usize, usize)>>,
    token_is_continuation: Vec<bool>,
    token_is_special: Vec<bool>,
    logits: Vec<Vec<f32>>,
    label_names: Vec<String>,
    model_version: String,
}

/// Pre-decoded entity payload from a remote server that runs its own BIO
/// pipeline (§4.5 variant b, second shape): the SDK only does type-mapping
/// and policy filtering.
#[derive(Debug, Deserialize)]
struct RemoteEntitiesResponse {
    entities: Vec<RemoteEntity>,
    model_version: String,
}

#[derive(Debug, Deserialize)]
struct RemoteEntity {
    #[serde(rename = "type")]
    raw_type: String,
    start: usize,
    end: usize,
    confidence: f32,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteResponse {
    Entities(RemoteEntitiesResponse),
    Logits(RemoteLogitsResponse),
}

/// Remote inference over HTTP (§4.5 variant b). Connection failures are
/// surfaced as fatal during `health_check`, which the orchestrator's
/// `initialize` calls before `predict` is ever invoked.
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteBackend {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Verifies the remote backend is reachable. Called during orchestrator
    /// `initialize`, not lazily inside `predict` (§4.5).
    ///
    /// # Errors
    /// Returns [`ModelLoadError::RemoteHealthFailed`] if the health endpoint
    /// does not respond with success.
    pub async fn health_check(&self) -> Result<(), ModelLoadError> {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ModelLoadError::RemoteHealthFailed(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ModelLoadError::RemoteHealthFailed(format!(
                "status {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl NerBackend for RemoteBackend {
    async fn health_check(&self) -> Result<(), ModelLoadError> {
        Self::health_check(self).await
    }

    async fn predict(&self, text: &str, policy: &AnonymizationPolicy) -> AnonymizerResult<NerPrediction> {
        let started = std::time::Instant::now();
        let url = format!("{}/predict", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let parsed: RemoteResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::MalformedLogits(e.to_string()))?;

        let (spans, model_version) = match parsed {
            RemoteResponse::Entities(payload) => {
                let spans = payload
                    .entities
                    .into_iter()
                    .filter_map(|e| {
                        let pii_type = map_remote_type(&e.raw_type)?;
                        Some(SpanMatch::new(
                            pii_type,
                            e.start,
                            e.end,
                            e.confidence,
                            DetectionSource::Ner,
                            e.text,
                        ))
                    })
                    .collect::<Vec<_>>();
                (filter_by_policy(spans, policy), payload.model_version)
            }
            RemoteResponse::Logits(payload) => {
                let tokens = rebuild_tokens(&payload);
                let spans = decode_bio(&tokens, &payload.logits, &payload.label_names);
                let spans = finalize_decoded_spans(spans, text);
                (filter_by_policy(spans, policy), payload.model_version)
            }
        };

        Ok(NerPrediction {
            spans,
            processing_time_ms: started.elapsed().as_millis() as u64,
            model_version,
        })
    }
}

fn map_remote_type(raw: &str) -> Option<PIIType> {
    match raw.to_ascii_uppercase().as_str() {
        "PERSON" | "PER" => Some(PIIType::Person),
        "ORG" | "MISC" => Some(PIIType::Org),
        "LOCATION" | "LOC" | "GPE" => Some(PIIType::Location),
        _ => None,
    }
}

fn rebuild_tokens(payload: &RemoteLogitsResponse) -> Vec<crate::tokenizer::Token> {
    payload
        .token_char_spans
        .iter()
        .zip(payload.token_is_continuation.iter())
        .zip(payload.token_is_special.iter())
        .map(|((span, &is_continuation), &is_special)| crate::tokenizer::Token {
            text: String::new(),
            id: 0,
            char_span: *span,
            is_continuation,
            is_special,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_backend_returns_no_spans() {
        let backend = StubBackend;
        let policy = AnonymizationPolicy::default();
        let prediction = backend.predict("Jane Doe works here", &policy).await.unwrap();
        assert!(prediction.spans.is_empty());
        assert_eq!(prediction.model_version, "stub");
    }

    struct FixedLogitsModel;
    impl LogitsModel for FixedLogitsModel {
        fn infer(&self, input_ids: &[u32], _attention_mask: &[u32]) -> (Vec<Vec<f32>>, Vec<String>) {
            let labels = vec!["O".to_string(), "B-PER".to_string(), "I-PER".to_string()];
            let logits = input_ids.iter().map(|_| vec![5.0, 0.0, 0.0]).collect();
            (logits, labels)
        }

        fn version(&self) -> &str {
            "fixed-test-model"
        }
    }

    #[tokio::test]
    async fn local_backend_runs_full_tokenize_infer_decode_chain() {
        let mut map = std::collections::HashMap::new();
        for (i, t) in ["<s>", "</s>", "<unk>", "\u{2581}Jane"].iter().enumerate() {
            map.insert((*t).to_string(), i as u32);
        }
        let vocab = Vocabulary::new(map);
        let backend = LocalBackend::new(vocab, FixedLogitsModel, 16);
        let policy = AnonymizationPolicy::default();
        let prediction = backend.predict("Jane", &policy).await.unwrap();
        assert_eq!(prediction.model_version, "fixed-test-model");
        assert!(prediction.spans.is_empty()); // all logits favor "O" here
    }

    struct PersonLogitsModel;
    impl LogitsModel for PersonLogitsModel {
        fn infer(&self, input_ids: &[u32], _attention_mask: &[u32]) -> (Vec<Vec<f32>>, Vec<String>) {
            let labels = vec!["O".to_string(), "B-PER".to_string(), "I-PER".to_string()];
            let logits = input_ids.iter().map(|_| vec![0.0, 5.0, 0.0]).collect();
            (logits, labels)
        }

        fn version(&self) -> &str {
            "person-test-model"
        }
    }

    #[tokio::test]
    async fn local_backend_span_text_is_populated_after_boundary_cleanup() {
        let mut map = std::collections::HashMap::new();
        for (i, t) in ["<s>", "</s>", "<unk>", "\u{2581}Jane"].iter().enumerate() {
            map.insert((*t).to_string(), i as u32);
        }
        let vocab = Vocabulary::new(map);
        let backend = LocalBackend::new(vocab, PersonLogitsModel, 16);
        let policy = AnonymizationPolicy::default();
        let prediction = backend.predict("Jane", &policy).await.unwrap();
        assert_eq!(prediction.spans.len(), 1);
        assert_eq!(prediction.spans[0].text, "Jane");
    }

    #[tokio::test]
    async fn stub_and_local_health_checks_default_to_ok() {
        let stub = StubBackend;
        assert!(stub.health_check().await.is_ok());

        let mut map = std::collections::HashMap::new();
        map.insert("<unk>".to_string(), 0u32);
        let vocab = Vocabulary::new(map);
        let local = LocalBackend::new(vocab, FixedLogitsModel, 16);
        assert!(local.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn remote_backend_health_check_fails_fast_on_unreachable_host() {
        let backend = RemoteBackend::new("http://127.0.0.1:1", Duration::from_millis(50));
        let result = backend.health_check().await;
        assert!(result.is_err());
    }
}

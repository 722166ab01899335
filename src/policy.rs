// ABOUTME: AnonymizationPolicy: the per-call detection/redaction configuration
// ABOUTME: Deep-merge of a partial patch over the instance default policy
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Policy (§3, §4.13).

use crate::types::PIIType;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Strategy used to pick a winner between two overlapping spans (§4.6 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapStrategy {
    LongerSpan,
    HigherConfidence,
    TypePriority,
}

/// Detection and redaction configuration for one `anonymize` call (§3).
///
/// A *partial* policy is deep-merged over the instance default: `confidence_thresholds`
/// is map-merged key by key, every other field is wholesale overridden when present
/// in the patch (§4.13).
#[derive(Debug, Clone)]
pub struct AnonymizationPolicy {
    pub enabled_types: HashSet<PIIType>,
    pub regex_enabled_types: HashSet<PIIType>,
    pub ner_enabled_types: HashSet<PIIType>,
    pub confidence_thresholds: HashMap<PIIType, f32>,
    /// Higher index = higher priority, used by the `TypePriority` overlap strategy.
    pub type_priority: Vec<PIIType>,
    /// Case-folded, trimmed exact terms exempted from detection.
    pub allowlist_terms: HashSet<String>,
    /// Always-PII patterns injected regardless of recognizer/NER coverage.
    pub denylist_patterns: Vec<Regex>,
    pub reuse_ids_for_repeated_pii: bool,
    pub enable_leak_scan: bool,
    pub enable_semantic_masking: bool,
    pub regex_priority: bool,
    pub overlap_strategy: OverlapStrategy,
}

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

impl Default for AnonymizationPolicy {
    fn default() -> Self {
        let enabled_types: HashSet<PIIType> = PIIType::all().iter().copied().collect();
        Self {
            ner_enabled_types: enabled_types.clone(),
            regex_enabled_types: enabled_types.clone(),
            enabled_types,
            confidence_thresholds: HashMap::new(),
            type_priority: PIIType::all().to_vec(),
            allowlist_terms: HashSet::new(),
            denylist_patterns: Vec::new(),
            reuse_ids_for_repeated_pii: true,
            enable_leak_scan: true,
            enable_semantic_masking: false,
            regex_priority: true,
            overlap_strategy: OverlapStrategy::LongerSpan,
        }
    }
}

impl AnonymizationPolicy {
    /// The effective confidence threshold for `pii_type`: the configured
    /// value, or `0.5` (§4.2).
    #[must_use]
    pub fn confidence_threshold(&self, pii_type: PIIType) -> f32 {
        self.confidence_thresholds
            .get(&pii_type)
            .copied()
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD)
    }

    /// Priority rank of `pii_type`: later entries in `type_priority` outrank
    /// earlier ones; unlisted types rank lowest (§4.6 step 2).
    #[must_use]
    pub fn type_priority_rank(&self, pii_type: PIIType) -> usize {
        self.type_priority
            .iter()
            .position(|&t| t == pii_type)
            .unwrap_or(0)
    }

    /// Whether `term`, case-folded and trimmed, is allowlisted (§4.6 step 2).
    #[must_use]
    pub fn is_allowlisted(&self, term: &str) -> bool {
        self.allowlist_terms.contains(term.trim().to_lowercase().as_str())
    }

    /// Deep-merges `patch` over `self`: `confidence_thresholds` is merged key
    /// by key, every other field in the patch wholesale replaces the instance
    /// default (§4.13 "merge policy").
    #[must_use]
    pub fn merged_with(&self, patch: &PolicyPatch) -> Self {
        let mut merged = self.clone();
        if let Some(types) = &patch.enabled_types {
            merged.enabled_types = types.clone();
        }
        if let Some(types) = &patch.regex_enabled_types {
            merged.regex_enabled_types = types.clone();
        }
        if let Some(types) = &patch.ner_enabled_types {
            merged.ner_enabled_types = types.clone();
        }
        for (&pii_type, &threshold) in &patch.confidence_thresholds {
            merged.confidence_thresholds.insert(pii_type, threshold);
        }
        if let Some(priority) = &patch.type_priority {
            merged.type_priority = priority.clone();
        }
        if let Some(terms) = &patch.allowlist_terms {
            merged.allowlist_terms = terms.clone();
        }
        if let Some(patterns) = &patch.denylist_patterns {
            merged.denylist_patterns = patterns.clone();
        }
        if let Some(v) = patch.reuse_ids_for_repeated_pii {
            merged.reuse_ids_for_repeated_pii = v;
        }
        if let Some(v) = patch.enable_leak_scan {
            merged.enable_leak_scan = v;
        }
        if let Some(v) = patch.enable_semantic_masking {
            merged.enable_semantic_masking = v;
        }
        if let Some(v) = patch.regex_priority {
            merged.regex_priority = v;
        }
        if let Some(v) = patch.overlap_strategy {
            merged.overlap_strategy = v;
        }
        merged
    }
}

/// A caller-supplied partial override of [`AnonymizationPolicy`], merged in
/// at call time via [`AnonymizationPolicy::merged_with`].
#[derive(Debug, Clone, Default)]
pub struct PolicyPatch {
    pub enabled_types: Option<HashSet<PIIType>>,
    pub regex_enabled_types: Option<HashSet<PIIType>>,
    pub ner_enabled_types: Option<HashSet<PIIType>>,
    pub confidence_thresholds: HashMap<PIIType, f32>,
    pub type_priority: Option<Vec<PIIType>>,
    pub allowlist_terms: Option<HashSet<String>>,
    pub denylist_patterns: Option<Vec<Regex>>,
    pub reuse_ids_for_repeated_pii: Option<bool>,
    pub enable_leak_scan: Option<bool>,
    pub enable_semantic_masking: Option<bool>,
    pub regex_priority: Option<bool>,
    pub overlap_strategy: Option<OverlapStrategy>,
}

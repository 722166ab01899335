// ABOUTME: Core data model shared across the anonymization pipeline
// ABOUTME: PIIType, SpanMatch, SemanticAttributes, DetectedEntity and result/stats types
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Data model (§3).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Closed enum of detectable PII categories (§3). Implementers may extend via
/// [`PIIType::Custom`] for caller-registered recognizers (CUSTOM_ID/CASE_ID/CUSTOMER_ID
/// are the built-in instances of this escape hatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PIIType {
    Email,
    Phone,
    Iban,
    BicSwift,
    CreditCard,
    IpAddress,
    Url,
    Person,
    Org,
    Location,
    CustomId,
    CaseId,
    CustomerId,
}

impl PIIType {
    /// All built-in variants, in a stable order used as the default `type_priority`.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Email,
            Self::Phone,
            Self::Iban,
            Self::BicSwift,
            Self::CreditCard,
            Self::IpAddress,
            Self::Url,
            Self::CustomId,
            Self::CaseId,
            Self::CustomerId,
            Self::Org,
            Self::Location,
            Self::Person,
        ]
    }

    /// The wire tag name, e.g. `"EMAIL"`, `"PERSON"` -- used as the map key prefix.
    #[must_use]
    pub const fn tag_name(self) -> &'static str {
        match self {
            Self::Email => "EMAIL",
            Self::Phone => "PHONE",
            Self::Iban => "IBAN",
            Self::BicSwift => "BIC_SWIFT",
            Self::CreditCard => "CREDIT_CARD",
            Self::IpAddress => "IP_ADDRESS",
            Self::Url => "URL",
            Self::Person => "PERSON",
            Self::Org => "ORG",
            Self::Location => "LOCATION",
            Self::CustomId => "CUSTOM_ID",
            Self::CaseId => "CASE_ID",
            Self::CustomerId => "CUSTOMER_ID",
        }
    }

    /// Parse a tag name back into a [`PIIType`]. Used by the tag parser (C12).
    #[must_use]
    pub fn from_tag_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.tag_name() == name)
    }
}

impl fmt::Display for PIIType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag_name())
    }
}

/// Where a [`SpanMatch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionSource {
    Regex,
    Ner,
    /// Synthesized by merging two spans, e.g. title + name (C8).
    Hybrid,
}

/// Gender classification for a PERSON span's semantic attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Neutral,
    Unknown,
}

impl Gender {
    #[must_use]
    pub const fn as_tag_value(self) -> Option<&'static str> {
        match self {
            Self::Male => Some("male"),
            Self::Female => Some("female"),
            Self::Neutral => Some("neutral"),
            Self::Unknown => None,
        }
    }
}

/// Geographic scope classification for a LOCATION span's semantic attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    City,
    Region,
    Country,
    Unknown,
}

impl Scope {
    #[must_use]
    pub const fn as_tag_value(self) -> Option<&'static str> {
        match self {
            Self::City => Some("city"),
            Self::Region => Some("region"),
            Self::Country => Some("country"),
            Self::Unknown => None,
        }
    }
}

/// Optional semantic annotations attached to a [`SpanMatch`] (§3, §4.8).
///
/// Only non-`unknown`/non-empty fields are ever serialized into a tag; `title`
/// flows into entity metadata rather than the tag itself (§4.9).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticAttributes {
    pub gender: Option<Gender>,
    pub scope: Option<Scope>,
    /// Honorific exactly as it appeared in the source text, e.g. `"Mrs."`.
    pub title: Option<String>,
}

impl SemanticAttributes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gender.is_none() && self.scope.is_none() && self.title.is_none()
    }
}

/// The universal detected-span record (§3).
///
/// Invariants upheld by every producer in the pipeline:
/// `text == normalized[start..end]`; `start < end`; offsets lie on UTF-8
/// code-point boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanMatch {
    #[serde(rename = "type")]
    pub pii_type: PIIType,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    pub source: DetectionSource,
    pub text: String,
    pub semantic: Option<SemanticAttributes>,
}

impl SpanMatch {
    #[must_use]
    pub fn new(
        pii_type: PIIType,
        start: usize,
        end: usize,
        confidence: f32,
        source: DetectionSource,
        text: impl Into<String>,
    ) -> Self {
        Self {
            pii_type,
            start,
            end,
            confidence,
            source,
            text: text.into(),
            semantic: None,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Post-tagging record exported to callers (§3). The `original` plaintext is
/// deliberately absent here -- it lives only inside the [`RawPIIMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    #[serde(rename = "type")]
    pub pii_type: PIIType,
    pub id: u32,
    pub start: usize,
    pub end: usize,
    pub confidence: f32,
    pub source: DetectionSource,
    pub semantic: Option<SemanticAttributes>,
}

impl DetectedEntity {
    /// The map key this entity corresponds to, e.g. `"PERSON_3"`.
    #[must_use]
    pub fn map_key(&self) -> String {
        format!("{}_{}", self.pii_type.tag_name(), self.id)
    }
}

/// Ordered mapping from `"{type}_{id}"` to the original plaintext span (§3).
///
/// Ordering is insertion order, which equals first-occurrence position because
/// the tagger (C10) walks spans left to right and inserts on first sight of a
/// key. A `BTreeMap<String, ...>` would reorder lexically (`EMAIL_10` before
/// `EMAIL_2`), so insertion order is tracked explicitly via a parallel `Vec`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPIIMap {
    order: Vec<String>,
    entries: std::collections::HashMap<String, String>,
}

impl RawPIIMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair. First insertion wins: subsequent inserts of an
    /// already-present key are no-ops, matching the tagger's "first insertion
    /// wins" rule (§4.9 step 2).
    pub fn insert_first_wins(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
            self.entries.insert(key, value.into());
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(move |k| (k.as_str(), self.entries[k].as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Merge `other` into `self`; keys already present in `self` retain their
    /// original value (used by the session layer's "existing keys retain
    /// first-seen original" merge rule, §4.13).
    pub fn merge_keep_existing(&mut self, other: &Self) {
        for (k, v) in other.iter() {
            self.insert_first_wins(k, v);
        }
    }

    /// Per-type counters seeded from this map's keys (§4.9 step 1): for each
    /// key `"{T}_{n}"`, take the max `n` seen, so the next id for `T` starts
    /// at `max + 1`.
    #[must_use]
    pub fn max_ids_by_type(&self) -> BTreeMap<PIIType, u32> {
        let mut maxima = BTreeMap::new();
        for key in &self.order {
            if let Some((type_part, id_part)) = key.rsplit_once('_') {
                if let (Some(pii_type), Ok(id)) =
                    (PIIType::from_tag_name(type_part), id_part.parse::<u32>())
                {
                    let entry = maxima.entry(pii_type).or_insert(0);
                    if id > *entry {
                        *entry = id;
                    }
                }
            }
        }
        maxima
    }
}

/// An authenticated-encryption envelope for a serialized [`RawPIIMap`] (§4.12, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedPIIMap {
    pub ciphertext: String,
    pub iv: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
}

/// Per-type and aggregate detection statistics (§3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationStats {
    pub counts_by_type: BTreeMap<PIIType, u32>,
    pub total_entities: u32,
    pub processing_time_ms: u64,
    pub model_version: String,
    pub policy_version: String,
    pub leak_scan_passed: bool,
}

/// The result of a single `anonymize` call (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizationResult {
    pub anonymized_text: String,
    pub entities: Vec<DetectedEntity>,
    pub pii_map: EncryptedPIIMap,
    pub stats: AnonymizationStats,
}

/// Counts entities by type for stats reporting (§4.9).
#[must_use]
pub fn count_entities_by_type(entities: &[DetectedEntity]) -> BTreeMap<PIIType, u32> {
    let mut counts = BTreeMap::new();
    for entity in entities {
        *counts.entry(entity.pii_type).or_insert(0) += 1;
    }
    counts
}

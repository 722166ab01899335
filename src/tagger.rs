// ABOUTME: Id assignment/reuse and canonical tag generation, splicing tags into the output text
// ABOUTME: Builds the RawPIIMap of tag key to original plaintext span
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Tagger (C10, §4.9).

use crate::policy::AnonymizationPolicy;
use crate::types::{DetectedEntity, PIIType, RawPIIMap, SemanticAttributes, SpanMatch};
use std::collections::HashMap;

/// Output of the tagging pass: rewritten text, entity records, and the raw
/// plaintext map (§4.9).
#[derive(Debug, Clone)]
pub struct TaggingResult {
    pub anonymized_text: String,
    pub entities: Vec<DetectedEntity>,
    pub pii_map: RawPIIMap,
}

/// Assigns ids (seeded from `existing_pii_map` and reused per policy),
/// emits [`DetectedEntity`] records, and splices canonical tags into the
/// text in place of each resolved span (§4.9).
#[must_use]
pub fn tag(
    text: &str,
    spans: &[SpanMatch],
    policy: &AnonymizationPolicy,
    existing_pii_map: Option<&RawPIIMap>,
) -> TaggingResult {
    let mut pii_map = RawPIIMap::new();
    let mut counters: HashMap<PIIType, u32> = HashMap::new();

    if let Some(existing) = existing_pii_map {
        pii_map.merge_keep_existing(existing);
        for (pii_type, max_id) in existing.max_ids_by_type() {
            counters.insert(pii_type, max_id + 1);
        }
    }

    // value -> key, seeded from existing map entries, for id reuse.
    let mut value_to_key: HashMap<(PIIType, String), String> = HashMap::new();
    if let Some(existing) = existing_pii_map {
        for (key, value) in existing.iter() {
            if let Some((type_part, _)) = key.rsplit_once('_') {
                if let Some(pii_type) = PIIType::from_tag_name(type_part) {
                    value_to_key
                        .entry((pii_type, value.to_string()))
                        .or_insert_with(|| key.to_string());
                }
            }
        }
    }

    let mut entities = Vec::with_capacity(spans.len());

    for span in spans {
        let reuse_key = (span.pii_type, span.text.clone());
        let id = if policy.reuse_ids_for_repeated_pii {
            if let Some(existing_key) = value_to_key.get(&reuse_key) {
                parse_id_suffix(existing_key).unwrap_or_else(|| next_id(&mut counters, span.pii_type))
            } else {
                let id = next_id(&mut counters, span.pii_type);
                value_to_key.insert(reuse_key, format!("{}_{}", span.pii_type.tag_name(), id));
                id
            }
        } else {
            next_id(&mut counters, span.pii_type)
        };

        let entity = DetectedEntity {
            pii_type: span.pii_type,
            id,
            start: span.start,
            end: span.end,
            confidence: span.confidence,
            source: span.source,
            semantic: span.semantic.clone(),
        };
        pii_map.insert_first_wins(entity.map_key(), span.text.clone());
        entities.push(entity);
    }

    let anonymized_text = splice_tags(text, &entities);

    TaggingResult {
        anonymized_text,
        entities,
        pii_map,
    }
}

fn next_id(counters: &mut HashMap<PIIType, u32>, pii_type: PIIType) -> u32 {
    let counter = counters.entry(pii_type).or_insert(1);
    let id = *counter;
    *counter += 1;
    id
}

fn parse_id_suffix(key: &str) -> Option<u32> {
    key.rsplit_once('_').and_then(|(_, id)| id.parse().ok())
}

/// Reverse-iterates entities (to avoid shifting later offsets) and splices
/// in the canonical tag for each (§4.9 step 3).
fn splice_tags(text: &str, entities: &[DetectedEntity]) -> String {
    let mut result = text.to_string();
    for entity in entities.iter().rev() {
        let tag = generate_tag(entity.pii_type, entity.id, entity.semantic.as_ref());
        result.replace_range(entity.start..entity.end, &tag);
    }
    result
}

/// Canonical tag syntax: `<PII type="T"[ gender="G"][ scope="S"] id="N"/>`.
/// Attribute order is fixed; `gender`/`scope` are present only when set and
/// not `unknown`. `title` is never emitted into the tag (§4.9).
#[must_use]
pub fn generate_tag(pii_type: PIIType, id: u32, semantic: Option<&SemanticAttributes>) -> String {
    let mut tag = format!("<PII type=\"{}\"", pii_type.tag_name());
    if let Some(semantic) = semantic {
        if let Some(gender) = semantic.gender.and_then(crate::types::Gender::as_tag_value) {
            tag.push_str(&format!(" gender=\"{gender}\""));
        }
        if let Some(scope) = semantic.scope.and_then(crate::types::Scope::as_tag_value) {
            tag.push_str(&format!(" scope=\"{scope}\""));
        }
    }
    tag.push_str(&format!(" id=\"{id}\"/>"));
    tag
}

// ABOUTME: Softmax/argmax label decoding and BIO span assembly from token-level predictions
// ABOUTME: Boundary cleanup and adjacent-span merging post-processing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! BIO decoder (C5, §4.4).

use crate::policy::AnonymizationPolicy;
use crate::tokenizer::Token;
use crate::types::{DetectionSource, PIIType, SpanMatch};

/// A decoded per-token label: `Outside`, or `Begin`/`Inside` of a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BioLabel {
    Outside,
    Begin(String),
    Inside(String),
}

impl BioLabel {
    fn parse(raw: &str) -> Self {
        if raw == "O" {
            return Self::Outside;
        }
        if let Some(rest) = raw.strip_prefix("B-").or_else(|| raw.strip_prefix("B_")) {
            return Self::Begin(rest.to_string());
        }
        if let Some(rest) = raw.strip_prefix("I-").or_else(|| raw.strip_prefix("I_")) {
            return Self::Inside(rest.to_string());
        }
        Self::Outside
    }
}

/// Numerically-stable softmax: subtract the row max before exponentiating.
#[must_use]
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|x| x / sum).collect()
}

/// `(argmax index, its probability)` over one token's label distribution.
#[must_use]
pub fn argmax(probabilities: &[f32]) -> (usize, f32) {
    let mut best_idx = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &p) in probabilities.iter().enumerate() {
        if p > best_val {
            best_val = p;
            best_idx = i;
        }
    }
    (best_idx, best_val)
}

/// Maps raw NER labels to the crate's [`PIIType`] set: `MISC` collapses into
/// `ORG` (§4.4).
fn map_label_to_pii_type(label: &str) -> Option<PIIType> {
    match label.to_ascii_uppercase().as_str() {
        "PER" | "PERSON" => Some(PIIType::Person),
        "ORG" | "MISC" => Some(PIIType::Org),
        "LOC" | "LOCATION" | "GPE" => Some(PIIType::Location),
        _ => None,
    }
}

struct RunningEntity {
    pii_type: PIIType,
    start: usize,
    end: usize,
    confidences: Vec<f32>,
}

/// Decodes per-token logits into spans by scanning tokens left to right.
/// `label_names[i]` is the raw label string for logit column `i`.
///
/// A `B-X` token starts a span; a following `I-X` extends it only if the
/// token is a wordpiece continuation or within one char of whitespace gap
/// from the previous token (§4.4). `O`, any `B-*`, or a mismatched `I-*`
/// closes the current span.
#[must_use]
pub fn decode_bio(
    tokens: &[Token],
    per_token_logits: &[Vec<f32>],
    label_names: &[String],
) -> Vec<SpanMatch> {
    let mut spans = Vec::new();
    let mut running: Option<RunningEntity> = None;

    for (token, logits) in tokens.iter().zip(per_token_logits.iter()) {
        if token.is_special {
            if let Some(entity) = running.take() {
                spans.push(finish_entity(entity));
            }
            continue;
        }
        let Some((start, end)) = token.char_span else {
            continue;
        };

        let probs = softmax(logits);
        let (idx, prob) = argmax(&probs);
        let label = label_names
            .get(idx)
            .map(String::as_str)
            .unwrap_or("O");
        let bio = BioLabel::parse(label);

        match &bio {
            BioLabel::Begin(raw_type) => {
                if let Some(entity) = running.take() {
                    spans.push(finish_entity(entity));
                }
                if let Some(pii_type) = map_label_to_pii_type(raw_type) {
                    running = Some(RunningEntity {
                        pii_type,
                        start,
                        end,
                        confidences: vec![prob],
                    });
                }
            }
            BioLabel::Inside(raw_type) => {
                let extends = running.as_ref().is_some_and(|entity| {
                    map_label_to_pii_type(raw_type) == Some(entity.pii_type)
                        && (token.is_continuation || start.saturating_sub(entity.end) <= 1)
                });
                if extends {
                    if let Some(entity) = running.as_mut() {
                        entity.end = end;
                        entity.confidences.push(prob);
                    }
                } else if let Some(entity) = running.take() {
                    spans.push(finish_entity(entity));
                    // A dangling I- with no matching B- closes the current span
                    // without opening a new one (§4.4: mismatched I- closes).
                }
            }
            BioLabel::Outside => {
                if let Some(entity) = running.take() {
                    spans.push(finish_entity(entity));
                }
            }
        }
    }

    if let Some(entity) = running.take() {
        spans.push(finish_entity(entity));
    }

    spans
}

fn finish_entity(entity: RunningEntity) -> SpanMatch {
    let mean_confidence = if entity.confidences.is_empty() {
        0.0
    } else {
        entity.confidences.iter().sum::<f32>() / entity.confidences.len() as f32
    };
    SpanMatch::new(
        entity.pii_type,
        entity.start,
        entity.end,
        mean_confidence,
        DetectionSource::Ner,
        String::new(),
    )
}

/// Trims leading/trailing whitespace and punctuation from a span by
/// shrinking `[start, end)`; fills in `span.text` from the (already
/// shrunk) slice (§4.4).
pub fn cleanup_boundaries(span: &mut SpanMatch, text: &str) {
    let slice = &text[span.start..span.end];
    let leading_trim = slice
        .char_indices()
        .find(|(_, c)| !c.is_whitespace() && !c.is_ascii_punctuation())
        .map_or(slice.len(), |(i, _)| i);
    let trailing_trim = slice
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_whitespace() && !c.is_ascii_punctuation())
        .map_or(0, |(i, c)| i + c.len_utf8());

    if leading_trim >= trailing_trim {
        span.start += leading_trim;
        span.end = span.start;
        span.text.clear();
        return;
    }

    span.start += leading_trim;
    span.end = span.start + (trailing_trim - leading_trim);
    span.text = text[span.start..span.end].to_string();
}

/// Coalesces adjacent same-type spans separated only by whitespace or a
/// hyphen, when both have confidence at or above `threshold` (§4.4).
#[must_use]
pub fn merge_adjacent_spans(mut spans: Vec<SpanMatch>, text: &str, threshold: f32) -> Vec<SpanMatch> {
    spans.sort_by_key(|s| s.start);
    let mut merged: Vec<SpanMatch> = Vec::with_capacity(spans.len());

    for span in spans {
        if let Some(last) = merged.last_mut() {
            if last.pii_type == span.pii_type
                && last.confidence >= threshold
                && span.confidence >= threshold
                && span.start >= last.end
            {
                let gap = &text[last.end..span.start];
                if gap.chars().all(|c| c.is_whitespace() || c == '-') {
                    last.end = span.end;
                    last.text = text[last.start..last.end].to_string();
                    last.confidence = last.confidence.max(span.confidence);
                    if last.source != span.source {
                        last.source = DetectionSource::Hybrid;
                    }
                    continue;
                }
            }
        }
        merged.push(span);
    }

    merged
}

/// Filters decoded spans to `policy.ner_enabled_types` at or above the
/// minimum threshold configured across those types (§4.4).
#[must_use]
pub fn filter_by_policy(spans: Vec<SpanMatch>, policy: &AnonymizationPolicy) -> Vec<SpanMatch> {
    let min_threshold = policy
        .ner_enabled_types
        .iter()
        .map(|&t| policy.confidence_threshold(t))
        .fold(f32::INFINITY, f32::min);
    let min_threshold = if min_threshold.is_finite() { min_threshold } else { 0.5 };

    spans
        .into_iter()
        .filter(|s| policy.ner_enabled_types.contains(&s.pii_type) && s.confidence >= min_threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Token;

    fn token(text: &str, span: (usize, usize), is_continuation: bool) -> Token {
        Token {
            text: text.to_string(),
            id: 0,
            char_span: Some(span),
            is_continuation,
            is_special: false,
        }
    }

    fn special(text: &str) -> Token {
        Token {
            text: text.to_string(),
            id: 0,
            char_span: None,
            is_continuation: false,
            is_special: true,
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn argmax_picks_highest_probability_index() {
        let (idx, val) = argmax(&[0.1, 0.7, 0.2]);
        assert_eq!(idx, 1);
        assert!((val - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn single_begin_token_produces_person_span() {
        let labels = vec!["O".to_string(), "B-PER".to_string(), "I-PER".to_string()];
        let tokens = vec![
            special("<s>"),
            token("Jane", (0, 4), false),
            special("</s>"),
        ];
        let logits = vec![vec![], vec![0.0, 5.0, 0.0], vec![]];
        let spans = decode_bio(&tokens, &logits, &labels);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].pii_type, PIIType::Person);
        assert_eq!((spans[0].start, spans[0].end), (0, 4));
    }

    #[test]
    fn begin_then_inside_extends_span() {
        let labels = vec!["O".to_string(), "B-PER".to_string(), "I-PER".to_string()];
        let tokens = vec![
            special("<s>"),
            token("Jane", (0, 4), false),
            token("Doe", (5, 8), false),
            special("</s>"),
        ];
        let logits = vec![vec![], vec![0.0, 5.0, 0.0], vec![0.0, 0.0, 5.0], vec![]];
        let spans = decode_bio(&tokens, &logits, &labels);
        assert_eq!(spans.len(), 1);
        assert_eq!((spans[0].start, spans[0].end), (0, 8));
    }

    #[test]
    fn misc_maps_to_org() {
        let labels = vec!["O".to_string(), "B-MISC".to_string()];
        let tokens = vec![special("<s>"), token("Acme", (0, 4), false), special("</s>")];
        let logits = vec![vec![], vec![0.0, 5.0], vec![]];
        let spans = decode_bio(&tokens, &logits, &labels);
        assert_eq!(spans[0].pii_type, PIIType::Org);
    }

    #[test]
    fn cleanup_boundaries_trims_punctuation() {
        let text = "said \"Jane Doe,\" today";
        let mut span = SpanMatch::new(PIIType::Person, 5, 16, 0.9, DetectionSource::Ner, "");
        cleanup_boundaries(&mut span, text);
        assert_eq!(span.text, "Jane Doe");
    }

    #[test]
    fn merge_adjacent_spans_joins_hyphenated_names() {
        let text = "Jean-Paul arrived";
        let spans = vec![
            SpanMatch::new(PIIType::Person, 0, 4, 0.9, DetectionSource::Ner, "Jean"),
            SpanMatch::new(PIIType::Person, 5, 9, 0.9, DetectionSource::Ner, "Paul"),
        ];
        let merged = merge_adjacent_spans(spans, text, 0.5);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Jean-Paul");
    }
}

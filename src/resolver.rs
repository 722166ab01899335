// ABOUTME: Merges regex and NER spans under policy: filtering, allowlist/denylist, overlap arbitration
// ABOUTME: Produces the sorted, non-overlapping span set the rest of the pipeline consumes
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Resolver (C7, §4.6).

use crate::offsets::{overlaps, sort_by_start_then_longest};
use crate::policy::{AnonymizationPolicy, OverlapStrategy};
use crate::types::{DetectionSource, PIIType, SpanMatch};
use std::collections::HashSet;

/// Resolves regex and NER candidate spans into the final sorted,
/// non-overlapping span set (§4.6).
#[must_use]
pub fn resolve(
    regex_matches: Vec<SpanMatch>,
    ner_matches: Vec<SpanMatch>,
    policy: &AnonymizationPolicy,
    text: &str,
) -> Vec<SpanMatch> {
    let regex_matches = filter_by_policy(regex_matches, policy);
    let ner_matches = filter_by_policy(ner_matches, policy);

    let mut candidates: Vec<SpanMatch> = regex_matches
        .into_iter()
        .chain(ner_matches)
        .filter(|span| !policy.is_allowlisted(&span.text))
        .collect();

    sort_by_start_then_longest(&mut candidates);

    let mut accepted = remove_overlaps(candidates, policy);

    inject_denylist_matches(&mut accepted, policy, text);

    dedup_exact(&mut accepted);
    sort_by_start_then_longest(&mut accepted);
    accepted
}

fn filter_by_policy(spans: Vec<SpanMatch>, policy: &AnonymizationPolicy) -> Vec<SpanMatch> {
    spans
        .into_iter()
        .filter(|s| {
            policy.enabled_types.contains(&s.pii_type)
                && s.confidence >= policy.confidence_threshold(s.pii_type)
        })
        .collect()
}

/// Walks the sorted-by-start candidate list; for each candidate, checks
/// whether it overlaps an already-accepted span, and if so picks a winner
/// deterministically (§4.6 "Overlap arbitration").
fn remove_overlaps(candidates: Vec<SpanMatch>, policy: &AnonymizationPolicy) -> Vec<SpanMatch> {
    let mut accepted: Vec<SpanMatch> = Vec::new();

    for candidate in candidates {
        let overlap_index = accepted
            .iter()
            .position(|a| overlaps(a.start, a.end, candidate.start, candidate.end));

        match overlap_index {
            None => accepted.push(candidate),
            Some(idx) => {
                if winner_is_candidate(&accepted[idx], &candidate, policy) {
                    accepted[idx] = candidate;
                }
            }
        }
    }

    accepted
}

/// Returns `true` if `candidate` should replace `incumbent` under the
/// policy's overlap-arbitration rules (§4.6).
fn winner_is_candidate(incumbent: &SpanMatch, candidate: &SpanMatch, policy: &AnonymizationPolicy) -> bool {
    if policy.regex_priority {
        let incumbent_is_regex = incumbent.source == DetectionSource::Regex;
        let candidate_is_regex = candidate.source == DetectionSource::Regex;
        if incumbent_is_regex != candidate_is_regex {
            return candidate_is_regex;
        }
    }

    match policy.overlap_strategy {
        OverlapStrategy::LongerSpan => {
            if candidate.len() != incumbent.len() {
                return candidate.len() > incumbent.len();
            }
        }
        OverlapStrategy::HigherConfidence => {
            if (candidate.confidence - incumbent.confidence).abs() > f32::EPSILON {
                return candidate.confidence > incumbent.confidence;
            }
        }
        OverlapStrategy::TypePriority => {
            let candidate_rank = policy.type_priority_rank(candidate.pii_type);
            let incumbent_rank = policy.type_priority_rank(incumbent.pii_type);
            if candidate_rank != incumbent_rank {
                return candidate_rank > incumbent_rank;
            }
        }
    }

    // Tiebreakers in order: longer span -> higher confidence -> higher
    // type-priority -> keep earlier (first-seen).
    if candidate.len() != incumbent.len() {
        return candidate.len() > incumbent.len();
    }
    if (candidate.confidence - incumbent.confidence).abs() > f32::EPSILON {
        return candidate.confidence > incumbent.confidence;
    }
    let candidate_rank = policy.type_priority_rank(candidate.pii_type);
    let incumbent_rank = policy.type_priority_rank(incumbent.pii_type);
    if candidate_rank != incumbent_rank {
        return candidate_rank > incumbent_rank;
    }
    false // first-seen (the incumbent) wins all remaining ties
}

/// Each denylist regex scans the *original* text; matches not already
/// covered by any accepted span are injected with confidence 1.0 and
/// `source = REGEX` (§4.6 step 5). The PIIType for an injected match comes
/// from the caller-assigned default below (implementer choice per spec);
/// we use `CustomId` rather than `Email` since tagging a denylisted secret
/// as an email would misrepresent it to downstream consumers.
fn inject_denylist_matches(accepted: &mut Vec<SpanMatch>, policy: &AnonymizationPolicy, text: &str) {
    for pattern in &policy.denylist_patterns {
        for m in pattern.find_iter(text) {
            let already_covered = accepted
                .iter()
                .any(|a| overlaps(a.start, a.end, m.start(), m.end()));
            if already_covered {
                continue;
            }
            accepted.push(SpanMatch::new(
                PIIType::CustomId,
                m.start(),
                m.end(),
                1.0,
                DetectionSource::Regex,
                m.as_str(),
            ));
        }
    }
}

fn dedup_exact(spans: &mut Vec<SpanMatch>) {
    let mut seen = HashSet::new();
    spans.retain(|s| seen.insert((s.start, s.end, s.pii_type)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectionSource;

    fn span(t: PIIType, start: usize, end: usize, conf: f32, source: DetectionSource) -> SpanMatch {
        SpanMatch::new(t, start, end, conf, source, "x".repeat(end - start))
    }

    #[test]
    fn non_overlapping_spans_are_all_accepted() {
        let policy = AnonymizationPolicy::default();
        let regex = vec![span(PIIType::Email, 0, 5, 0.9, DetectionSource::Regex)];
        let ner = vec![span(PIIType::Person, 10, 15, 0.9, DetectionSource::Ner)];
        let resolved = resolve(regex, ner, &policy, "xxxxx     xxxxx");
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn regex_priority_wins_over_overlapping_ner() {
        let policy = AnonymizationPolicy::default();
        let regex = vec![span(PIIType::Email, 0, 10, 0.6, DetectionSource::Regex)];
        let ner = vec![span(PIIType::Person, 2, 8, 0.99, DetectionSource::Ner)];
        let resolved = resolve(regex, ner, &policy, &"x".repeat(10));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].source, DetectionSource::Regex);
    }

    #[test]
    fn longer_span_wins_when_same_source() {
        let policy = AnonymizationPolicy::default();
        let a = span(PIIType::Person, 0, 10, 0.9, DetectionSource::Ner);
        let b = span(PIIType::Org, 2, 6, 0.99, DetectionSource::Ner);
        let resolved = resolve(vec![], vec![a, b], &policy, &"x".repeat(10));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].pii_type, PIIType::Person);
    }

    #[test]
    fn touching_spans_are_both_kept() {
        let policy = AnonymizationPolicy::default();
        let a = span(PIIType::Email, 0, 5, 0.9, DetectionSource::Regex);
        let b = span(PIIType::Person, 5, 10, 0.9, DetectionSource::Ner);
        let resolved = resolve(vec![a], vec![b], &policy, &"x".repeat(10));
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn allowlisted_term_is_dropped() {
        let mut policy = AnonymizationPolicy::default();
        policy.allowlist_terms.insert("acme".to_string());
        let regex = vec![span(PIIType::Email, 0, 4, 0.9, DetectionSource::Regex)];
        let text = "acme";
        let mut regex = regex;
        regex[0].text = "acme".to_string();
        let resolved = resolve(regex, vec![], &policy, text);
        assert!(resolved.is_empty());
    }

    #[test]
    fn denylist_injects_uncovered_match() {
        let mut policy = AnonymizationPolicy::default();
        policy.denylist_patterns.push(regex::Regex::new(r"SECRET-\d+").unwrap());
        let text = "ticket SECRET-42 closed";
        let resolved = resolve(vec![], vec![], &policy, text);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].confidence, 1.0);
    }
}

// ABOUTME: Post-tagging validation: tag/map consistency and a leak-scan re-detection pass
// ABOUTME: Findings are machine-coded and safe-message-only, never carrying the original PII
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Validator (C11, §4.10).

use crate::errors::{ValidationErrorCode, ValidationIssue};
use crate::policy::AnonymizationPolicy;
use crate::recognizers::RecognizerRegistry;
use crate::types::RawPIIMap;
use std::collections::HashMap;

/// Result of a validation pass: whether everything checked out, the findings
/// list, and whether the leak scan specifically passed (flows into stats
/// separately, §4.10).
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub leak_scan_passed: bool,
}

/// Extracts `(key, matched_text, start, end)` for every canonical tag in
/// `text` by reusing the strict tag grammar from the rehydrator.
fn extract_tag_keys(text: &str) -> Vec<(String, usize, usize)> {
    crate::rehydrate::parse_tags(text, true)
        .into_iter()
        .map(|t| (format!("{}_{}", t.pii_type.tag_name(), t.id), t.start, t.end))
        .collect()
}

/// Runs `tag_consistency` and, if enabled, `leak_scan` (§4.10).
#[must_use]
pub fn validate(
    anonymized_text: &str,
    pii_keys: &RawPIIMap,
    policy: &AnonymizationPolicy,
    registry: &RecognizerRegistry,
) -> ValidationReport {
    let mut errors = Vec::new();

    errors.extend(check_tag_consistency(anonymized_text, pii_keys));

    let leak_scan_passed = if policy.enable_leak_scan {
        let leaks = leak_scan(anonymized_text, registry, policy);
        let passed = leaks.is_empty();
        errors.extend(leaks);
        passed
    } else {
        true
    };

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        leak_scan_passed,
    }
}

fn check_tag_consistency(text: &str, pii_keys: &RawPIIMap) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut occurrence_counts: HashMap<String, u32> = HashMap::new();

    for (key, _, _) in extract_tag_keys(text) {
        *occurrence_counts.entry(key.clone()).or_insert(0) += 1;
        if !pii_keys.contains_key(&key) {
            issues.push(ValidationIssue::new(
                ValidationErrorCode::OrphanTag,
                format!("tag '{key}' has no corresponding map entry"),
            ));
        }
    }

    for key in pii_keys.keys() {
        match occurrence_counts.get(key) {
            None => issues.push(ValidationIssue::new(
                ValidationErrorCode::UnusedMapKey,
                format!("map key '{key}' has no corresponding tag occurrence"),
            )),
            Some(&count) if count > 1 => issues.push(ValidationIssue::new(
                ValidationErrorCode::DuplicateTagOccurrence,
                format!("map key '{key}' occurs {count} times in the text"),
            )),
            _ => {}
        }
    }

    issues
}

/// Re-runs every enabled regex recognizer on `anonymized_text`; any match
/// that falls outside a tag span is a leak (§4.10).
fn leak_scan(text: &str, registry: &RecognizerRegistry, policy: &AnonymizationPolicy) -> Vec<ValidationIssue> {
    let tag_spans: Vec<(usize, usize)> = extract_tag_keys(text).into_iter().map(|(_, s, e)| (s, e)).collect();
    let candidates = registry.find_all(text, policy);

    candidates
        .into_iter()
        .filter(|span| {
            !tag_spans
                .iter()
                .any(|&(s, e)| crate::offsets::contains(s, e, span.start, span.end))
        })
        .map(|span| {
            ValidationIssue::new(
                ValidationErrorCode::LeakDetected,
                format!("leak-scan match for type {:?} outside any tag", span.pii_type),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizers::RecognizerRegistry;
    use crate::types::RawPIIMap;

    #[test]
    fn consistent_text_and_map_pass_validation() {
        let text = r#"contact <PII type="EMAIL" id="1"/> now"#;
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        let policy = AnonymizationPolicy::default();
        let registry = RecognizerRegistry::with_builtins();
        let report = validate(text, &map, &policy, &registry);
        assert!(report.valid);
        assert!(report.leak_scan_passed);
    }

    #[test]
    fn orphan_tag_is_detected() {
        let text = r#"contact <PII type="EMAIL" id="9"/> now"#;
        let map = RawPIIMap::new();
        let policy = AnonymizationPolicy::default();
        let registry = RecognizerRegistry::with_builtins();
        let report = validate(text, &map, &policy, &registry);
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == ValidationErrorCode::OrphanTag));
    }

    #[test]
    fn unused_map_key_is_detected() {
        let text = "no tags here";
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        let policy = AnonymizationPolicy::default();
        let registry = RecognizerRegistry::with_builtins();
        let report = validate(text, &map, &policy, &registry);
        assert!(report
            .errors
            .iter()
            .any(|e| e.code == ValidationErrorCode::UnusedMapKey));
    }

    #[test]
    fn leak_scan_detects_untagged_email() {
        let text = r#"contact jane@example.com and <PII type="EMAIL" id="1"/>"#;
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "john@example.com");
        let policy = AnonymizationPolicy::default();
        let registry = RecognizerRegistry::with_builtins();
        let report = validate(text, &map, &policy, &registry);
        assert!(!report.leak_scan_passed);
    }
}

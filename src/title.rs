// ABOUTME: Multilingual honorific list and title-handling for PERSON spans
// ABOUTME: Merges adjacent title-only spans, then shifts span boundaries past extracted titles
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Title extractor (C8, §4.7).

use crate::types::{DetectionSource, PIIType, SpanMatch};
use std::sync::OnceLock;

/// Honorifics across en/de/fr/es/it/pt/nl/lv/ar/zh, sorted by length
/// descending so a lookup always matches the longest applicable form first.
///
/// This is a representative subset rather than the full ~400-entry list;
/// the matching algorithm below is independent of list size.
fn honorifics() -> &'static Vec<&'static str> {
    static CELL: OnceLock<Vec<&'static str>> = OnceLock::new();
    CELL.get_or_init(|| {
        let mut list = vec![
            // English
            "Mr.", "Mrs.", "Ms.", "Miss", "Dr.", "Prof.", "Rev.", "Fr.", "Sr.", "Br.", "Sir",
            "Dame", "Lord", "Lady", "Capt.", "Col.", "Gen.", "Lt.", "Maj.", "Hon.",
            // German
            "Herr", "Frau", "Dr.", "Prof.",
            // French
            "M.", "Mme", "Mlle", "Dr.", "Pr.",
            // Spanish
            "Sr.", "Sra.", "Srta.", "Dr.", "Dra.",
            // Italian
            "Sig.", "Sig.ra", "Sig.na", "Dott.", "Dott.ssa",
            // Portuguese
            "Sr.", "Sra.", "Dr.", "Dra.",
            // Dutch
            "Dhr.", "Mevr.", "Dr.",
            // Latvian
            "Kgs.", "Kga.",
            // Arabic (transliterated)
            "Sayyid", "Sayyida", "Ustadh", "Sheikh",
            // Chinese (honorific suffixes treated as prefixes for list purposes)
            "Xiansheng", "Nvshi",
        ];
        list.sort_by_key(|s| std::cmp::Reverse(s.len()));
        list.dedup();
        list
    })
}

/// Whether `text`, after trimming trailing punctuation, exactly matches a
/// known honorific (§4.7 `is_only_title`).
#[must_use]
pub fn is_only_title(text: &str) -> bool {
    let trimmed = text.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    honorifics()
        .iter()
        .any(|h| h.trim_end_matches('.') == trimmed || *h == text.trim())
}

/// If `text` begins with a known honorific followed by whitespace and a
/// non-empty remainder, returns `(title, remaining, title_char_len)`
/// (§4.7 `extract_title`).
#[must_use]
pub fn extract_title(text: &str) -> Option<(String, String, usize)> {
    for honorific in honorifics() {
        if let Some(rest) = text.strip_prefix(honorific) {
            let after_title_len = honorific.chars().count();
            let mut chars = rest.chars();
            let Some(next) = chars.next() else {
                continue;
            };
            if !next.is_whitespace() {
                continue;
            }
            let remaining: String = rest.trim_start().to_string();
            if remaining.is_empty() {
                continue;
            }
            let whitespace_len = rest.len() - rest.trim_start().len();
            let title_char_len = after_title_len + rest[..whitespace_len].chars().count();
            return Some((honorific.to_string(), remaining, title_char_len));
        }
    }
    None
}

/// Combines a title-only PERSON span with the PERSON span that immediately
/// follows it, when separated only by whitespace/punctuation within
/// `max_gap` bytes (§4.7 `merge_adjacent_title_spans`).
#[must_use]
pub fn merge_adjacent_title_spans(spans: Vec<SpanMatch>, text: &str, max_gap: usize) -> Vec<SpanMatch> {
    let mut result: Vec<SpanMatch> = Vec::with_capacity(spans.len());
    let mut iter = spans.into_iter().peekable();

    while let Some(span) = iter.next() {
        if span.pii_type == PIIType::Person && is_only_title(&span.text) {
            if let Some(next) = iter.peek() {
                let gap = next.start.saturating_sub(span.end);
                let gap_text = text.get(span.end..next.start).unwrap_or("");
                let gap_is_clean = gap_text
                    .chars()
                    .all(|c| c.is_whitespace() || matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));

                if next.pii_type == PIIType::Person && gap <= max_gap && gap_is_clean {
                    let next = iter.next().unwrap_or_else(|| unreachable!());
                    let combined_source = if span.source == next.source {
                        span.source
                    } else {
                        DetectionSource::Hybrid
                    };
                    let combined = SpanMatch::new(
                        PIIType::Person,
                        span.start,
                        next.end,
                        span.confidence.max(next.confidence),
                        combined_source,
                        text[span.start..next.end].to_string(),
                    );
                    result.push(combined);
                    continue;
                }
            }
        }
        result.push(span);
    }

    result
}

/// Runs `extract_title` over every PERSON span: on a hit, shifts the span
/// start forward past the title text and records it in `semantic.title`
/// (§4.7 `extract_titles_from_spans`). The title characters stay in the
/// visible output text; only the span boundary moves.
#[must_use]
pub fn extract_titles_from_spans(mut spans: Vec<SpanMatch>, text: &str) -> Vec<SpanMatch> {
    for span in &mut spans {
        if span.pii_type != PIIType::Person {
            continue;
        }
        let Some((title, remaining, _title_char_len)) = extract_title(&span.text) else {
            continue;
        };
        let Some(remaining_start) = text[span.start..].find(remaining.as_str()) else {
            continue;
        };
        let new_start = span.start + remaining_start;
        span.start = new_start;
        span.text = text[span.start..span.end].to_string();

        let semantic = span.semantic.get_or_insert_with(Default::default);
        semantic.title = Some(title);
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_exact_honorific() {
        assert!(is_only_title("Dr."));
        assert!(is_only_title("Mrs"));
        assert!(!is_only_title("Dr. Jane"));
    }

    #[test]
    fn extracts_title_and_remainder() {
        let (title, remaining, _) = extract_title("Dr. Jane Smith").unwrap();
        assert_eq!(title, "Dr.");
        assert_eq!(remaining, "Jane Smith");
    }

    #[test]
    fn no_title_returns_none() {
        assert!(extract_title("Jane Smith").is_none());
    }

    #[test]
    fn merges_title_only_span_with_following_person_span() {
        let text = "Dr. Jane Smith spoke";
        let spans = vec![
            SpanMatch::new(PIIType::Person, 0, 3, 0.9, DetectionSource::Ner, "Dr."),
            SpanMatch::new(PIIType::Person, 4, 14, 0.9, DetectionSource::Ner, "Jane Smith"),
        ];
        let merged = merge_adjacent_title_spans(spans, text, 3);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].text, "Dr. Jane Smith");
    }

    #[test]
    fn extract_titles_from_spans_shifts_start_and_records_semantic_title() {
        let text = "Dr. Jane Smith spoke";
        let spans = vec![SpanMatch::new(
            PIIType::Person,
            0,
            14,
            0.9,
            DetectionSource::Ner,
            "Dr. Jane Smith",
        )];
        let result = extract_titles_from_spans(spans, text);
        assert_eq!(result[0].text, "Jane Smith");
        assert_eq!(
            result[0].semantic.as_ref().and_then(|s| s.title.clone()),
            Some("Dr.".to_string())
        );
    }
}

// ABOUTME: Strict and tolerant PII tag parsers, plus the rehydrate() substitution pass
// ABOUTME: The tolerant parser survives translator-induced drift in quotes/case/whitespace
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Tag parser / rehydrator (C12, §4.11).

use crate::types::{Gender, PIIType, RawPIIMap, Scope, SemanticAttributes};
use regex::Regex;
use std::sync::OnceLock;

/// A recognized tag occurrence (§4.11).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTag {
    pub pii_type: PIIType,
    pub id: u32,
    pub semantic: Option<SemanticAttributes>,
    pub matched_text: String,
    pub start: usize,
    pub end: usize,
}

/// Quote characters the tolerant parser accepts around attribute values,
/// beyond the canonical `"` (§4.11).
const FANCY_QUOTES: &[char] = &['\'', '“', '”', '„', '‘', '’', '«', '»'];

fn strict_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(
            r#"<PII type="(?P<type>[A-Z_]+)"(?: gender="(?P<gender>[a-z]+)")?(?: scope="(?P<scope>[a-z]+)")? id="(?P<id>\d+)"/>"#,
        )
        .unwrap()
    })
}

/// Tolerant pattern: case-insensitive tag name, any attribute order, any
/// quote character from `{" ' " "  „  '  '  «  »}`, optional missing
/// self-closing slash, arbitrary whitespace around `=` and between
/// attributes (§4.11).
fn tolerant_pattern() -> &'static Regex {
    // No named captures here -- attribute values are extracted separately via
    // `extract_attr` so the structural match doesn't need to disambiguate
    // which alternation branch fired (and can't reuse a group name per
    // attribute across a repeated `{1,4}` quantifier).
    static CELL: OnceLock<Regex> = OnceLock::new();
    CELL.get_or_init(|| {
        let quote = r#"["'\u{201c}\u{201d}\u{201e}\u{2018}\u{2019}\u{00ab}\u{00bb}]"#;
        let attr = format!(
            r"(?:type\s*=\s*{quote}[A-Za-z_]+{quote}|gender\s*=\s*{quote}[a-z]+{quote}|scope\s*=\s*{quote}[a-z]+{quote}|id\s*=\s*{quote}\d+{quote})"
        );
        let pattern = format!(r"(?i)<\s*pii(?:\s+{attr}){{1,4}}\s*/?\s*>");
        #[allow(clippy::unwrap_used)]
        Regex::new(&pattern).unwrap()
    })
}

/// Parses every tag occurrence in `text`, strict or tolerant per `strict`
/// (§4.11).
#[must_use]
pub fn parse_tags(text: &str, strict: bool) -> Vec<ParsedTag> {
    if strict {
        parse_with_named_groups(text, strict_pattern())
    } else {
        parse_tolerant(text)
    }
}

fn parse_with_named_groups(text: &str, pattern: &Regex) -> Vec<ParsedTag> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let type_str = caps.name("type")?.as_str();
            let pii_type = PIIType::from_tag_name(type_str)?;
            let id: u32 = caps.name("id")?.as_str().parse().ok()?;
            let semantic = build_semantic(&caps);
            Some(ParsedTag {
                pii_type,
                id,
                semantic,
                matched_text: whole.as_str().to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// The tolerant pattern's named groups are the same across multiple
/// alternating attribute clauses, so attributes can appear in any order;
/// this re-scans the matched substring attribute-by-attribute since a
/// single-pass capture group can't repeat with distinct values across
/// alternation branches in `regex`.
fn parse_tolerant(text: &str) -> Vec<ParsedTag> {
    let mut out = Vec::new();
    for m in tolerant_pattern().find_iter(text) {
        let whole = m.as_str();
        let Some(pii_type) = extract_attr(whole, "type").and_then(|v| PIIType::from_tag_name(&v.to_ascii_uppercase()))
        else {
            continue;
        };
        let Some(id) = extract_attr(whole, "id").and_then(|v| v.parse::<u32>().ok()) else {
            continue;
        };
        let gender = extract_attr(whole, "gender").and_then(|v| match v.to_ascii_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "neutral" => Some(Gender::Neutral),
            _ => None,
        });
        let scope = extract_attr(whole, "scope").and_then(|v| match v.to_ascii_lowercase().as_str() {
            "city" => Some(Scope::City),
            "region" => Some(Scope::Region),
            "country" => Some(Scope::Country),
            _ => None,
        });
        let semantic = if gender.is_some() || scope.is_some() {
            Some(SemanticAttributes {
                gender,
                scope,
                title: None,
            })
        } else {
            None
        };
        out.push(ParsedTag {
            pii_type,
            id,
            semantic,
            matched_text: whole.to_string(),
            start: m.start(),
            end: m.end(),
        });
    }
    out
}

/// Extracts the value of attribute `name` from a single matched tag string,
/// accepting any quote character in [`FANCY_QUOTES`] plus the canonical `"`.
fn extract_attr(tag_text: &str, name: &str) -> Option<String> {
    let lower = tag_text.to_ascii_lowercase();
    let name_pos = lower.find(name)?;
    let after_name = &tag_text[name_pos + name.len()..];
    let eq_pos = after_name.find('=')?;
    let after_eq = after_name[eq_pos + 1..].trim_start();
    let mut chars = after_eq.chars();
    let open_quote = chars.next()?;
    if open_quote != '"' && !FANCY_QUOTES.contains(&open_quote) {
        return None;
    }
    let closing = matching_quote(open_quote);
    let rest: String = chars.collect();
    let close_idx = rest.find(closing)?;
    Some(rest[..close_idx].to_string())
}

const fn matching_quote(open: char) -> char {
    match open {
        '“' => '”',
        '‘' => '’',
        '«' => '»',
        other => other,
    }
}

fn build_semantic(caps: &regex::Captures<'_>) -> Option<SemanticAttributes> {
    let gender = caps.name("gender").and_then(|m| match m.as_str() {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        "neutral" => Some(Gender::Neutral),
        _ => None,
    });
    let scope = caps.name("scope").and_then(|m| match m.as_str() {
        "city" => Some(Scope::City),
        "region" => Some(Scope::Region),
        "country" => Some(Scope::Country),
        _ => None,
    });
    if gender.is_some() || scope.is_some() {
        Some(SemanticAttributes {
            gender,
            scope,
            title: None,
        })
    } else {
        None
    }
}

/// Replaces each recognized tag occurrence with `raw_map["{type}_{id}"]`
/// when present; unknown ids are left untouched (§4.11). Tags are
/// non-overlapping by construction, so a left-to-right splice is safe.
#[must_use]
pub fn rehydrate(anonymized_text: &str, raw_map: &RawPIIMap, strict: bool) -> String {
    let tags = parse_tags(anonymized_text, strict);
    let mut result = String::with_capacity(anonymized_text.len());
    let mut cursor = 0;

    for tag in &tags {
        result.push_str(&anonymized_text[cursor..tag.start]);
        let key = format!("{}_{}", tag.pii_type.tag_name(), tag.id);
        match raw_map.get(&key) {
            Some(original) => result.push_str(original),
            None => result.push_str(&tag.matched_text),
        }
        cursor = tag.end;
    }
    result.push_str(&anonymized_text[cursor..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_parser_matches_canonical_tag() {
        let text = r#"hello <PII type="EMAIL" id="1"/> world"#;
        let tags = parse_tags(text, true);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].pii_type, PIIType::Email);
        assert_eq!(tags[0].id, 1);
    }

    #[test]
    fn tolerant_parser_accepts_lowercase_tag_name() {
        let text = r#"hello <pii type="EMAIL" id="1"/> world"#;
        let tags = parse_tags(text, false);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn tolerant_parser_accepts_reordered_attributes() {
        let text = r#"<PII id="2" type="PERSON"/>"#;
        let tags = parse_tags(text, false);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, 2);
        assert_eq!(tags[0].pii_type, PIIType::Person);
    }

    #[test]
    fn tolerant_parser_accepts_fancy_quotes() {
        let text = "<PII type=“EMAIL” id=“3”/>";
        let tags = parse_tags(text, false);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].id, 3);
    }

    #[test]
    fn tolerant_parser_accepts_missing_self_closing_slash() {
        let text = r#"<PII type="EMAIL" id="4">"#;
        let tags = parse_tags(text, false);
        assert_eq!(tags.len(), 1);
    }

    #[test]
    fn rehydrate_substitutes_known_tags() {
        let text = r#"contact <PII type="EMAIL" id="1"/> now"#;
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        let result = rehydrate(text, &map, true);
        assert_eq!(result, "contact jane@example.com now");
    }

    #[test]
    fn rehydrate_leaves_unknown_tags_untouched() {
        let text = r#"contact <PII type="EMAIL" id="9"/> now"#;
        let map = RawPIIMap::new();
        let result = rehydrate(text, &map, true);
        assert_eq!(result, text);
    }

    #[test]
    fn rehydrate_handles_multiple_non_overlapping_tags() {
        let text = r#"<PII type="EMAIL" id="1"/> and <PII type="PERSON" id="1"/>"#;
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        map.insert_first_wins("PERSON_1", "Jane Doe");
        let result = rehydrate(text, &map, true);
        assert_eq!(result, "jane@example.com and Jane Doe");
    }
}

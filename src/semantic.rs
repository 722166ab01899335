// ABOUTME: In-memory gender/location lookup databases and the semantic enrichment pass
// ABOUTME: Parses nam_dict/GeoNames/countryInfo source formats and annotates PERSON/LOCATION spans
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Semantic enricher (C9, §4.8).

use crate::types::{Gender, PIIType, Scope, SemanticAttributes, SpanMatch};
use std::collections::HashMap;

/// A name's default gender plus optional per-locale overrides (§4.8).
#[derive(Debug, Clone, Default)]
pub struct NameEntry {
    pub gender: Gender,
    pub locale_overrides: HashMap<String, Gender>,
}

#[derive(Debug, Clone)]
struct CityEntry {
    country_code: String,
    population: u64,
}

/// The loaded auxiliary datasets consumed by [`enrich_semantics`] (§4.8).
#[derive(Debug, Clone, Default)]
pub struct SemanticDatabase {
    names: HashMap<String, NameEntry>,
    cities: HashMap<String, CityEntry>,
    countries: HashMap<String, String>,
    regions: HashMap<String, String>,
}

const CITY_POPULATION_THRESHOLD: u64 = 500_000;

const TITLE_PREFIXES: &[&str] = &[
    "dr.", "mr.", "mrs.", "prof.", "rev.", "fr.", "sr.", "br.", "sir", "dame", "lord", "lady",
];

const LOCATION_SUFFIXES: &[&str] = &["city", "town", "village", "state", "province", "region", "county"];

const LEADING_ARTICLES: &[&str] = &["the ", "la ", "le ", "der ", "die ", "das ", "el ", "il "];

impl SemanticDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `nam_dict.txt`-formatted line into a lowercased first-name
    /// entry. Gender codes `M`/`1M`/`?M` map to male; `F`/`1F`/`?F` to
    /// female; bare `?` to neutral (§4.8 source format).
    pub fn load_name_line(&mut self, line: &str) {
        let mut columns = line.split_whitespace();
        let Some(code) = columns.next() else { return };
        let Some(name) = columns.next() else { return };
        let gender = match code {
            "M" | "1M" | "?M" => Gender::Male,
            "F" | "1F" | "?F" => Gender::Female,
            "?" => Gender::Neutral,
            _ => return,
        };
        self.names
            .entry(name.to_lowercase())
            .and_modify(|entry| entry.gender = gender)
            .or_insert(NameEntry {
                gender,
                locale_overrides: HashMap::new(),
            });
    }

    pub fn add_name_locale_override(&mut self, name: &str, locale: &str, gender: Gender) {
        self.names
            .entry(name.to_lowercase())
            .or_default()
            .locale_overrides
            .insert(locale.to_lowercase(), gender);
    }

    /// Registers a GeoNames city; on a name collision, the higher-population
    /// entry wins (§4.8).
    pub fn add_city(&mut self, name: &str, country_code: &str, population: u64) {
        let key = name.to_lowercase();
        let replace = self
            .cities
            .get(&key)
            .is_none_or(|existing| population > existing.population);
        if replace {
            self.cities.insert(
                key,
                CityEntry {
                    country_code: country_code.to_string(),
                    population,
                },
            );
        }
    }

    pub fn add_country(&mut self, name_or_variant: &str, country_code: &str) {
        self.countries
            .insert(name_or_variant.to_lowercase(), country_code.to_string());
    }

    pub fn add_region(&mut self, name: &str, country_code: &str) {
        self.regions.insert(name.to_lowercase(), country_code.to_string());
    }

    fn lookup_name(&self, first_name: &str, locale: Option<&str>) -> Gender {
        let Some(entry) = self.names.get(first_name) else {
            return Gender::Unknown;
        };
        if let Some(locale) = locale {
            if let Some(&gender) = entry.locale_overrides.get(locale) {
                return gender;
            }
        }
        entry.gender
    }

    /// Location classification per §4.8 priority order: countries first,
    /// then a city with population >= 500k, then a region, then any city.
    /// Returns `(scope, confidence)`.
    fn classify_location(&self, normalized: &str) -> Option<(Scope, f32)> {
        if self.countries.contains_key(normalized) {
            return Some((Scope::Country, 1.0));
        }
        if let Some(city) = self.cities.get(normalized) {
            if city.population >= CITY_POPULATION_THRESHOLD {
                return Some((Scope::City, 1.0));
            }
        }
        if self.regions.contains_key(normalized) {
            return Some((Scope::Region, 1.0));
        }
        if self.cities.contains_key(normalized) {
            return Some((Scope::City, 1.0));
        }
        None
    }
}

/// Strips a leading honorific (and its trailing period) from a PERSON span's
/// text, then takes the first whitespace-delimited token as the first name
/// (§4.8).
fn extract_first_name(text: &str) -> String {
    let mut remaining = text.trim();
    for prefix in TITLE_PREFIXES {
        if remaining.to_lowercase().starts_with(prefix) {
            remaining = remaining[prefix.len()..].trim_start();
            break;
        }
    }
    remaining
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Normalizes a LOCATION span's text for database lookup: lowercase, trim,
/// drop a trailing scope-word suffix, collapse whitespace (§4.8).
fn normalize_location_name(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let mut words: Vec<&str> = lowered.split_whitespace().collect();
    if let Some(&last) = words.last() {
        if LOCATION_SUFFIXES.contains(&last) && words.len() > 1 {
            words.pop();
        }
    }
    words.join(" ")
}

fn strip_leading_article(normalized: &str) -> Option<String> {
    for article in LEADING_ARTICLES {
        if let Some(rest) = normalized.strip_prefix(article) {
            return Some(rest.to_string());
        }
    }
    None
}

fn fold_diacritics(normalized: &str) -> String {
    use unicode_normalization::UnicodeNormalization;
    normalized
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect()
}

/// Annotates each span's `semantic` field in place: PERSON spans get
/// `gender`, LOCATION spans get `scope`; all other types pass through
/// unchanged (§4.8). `gender == unknown` / `scope == unknown` are left as
/// `None` so they are never serialized into a tag.
#[must_use]
pub fn enrich_semantics(mut spans: Vec<SpanMatch>, db: &SemanticDatabase, locale: Option<&str>) -> Vec<SpanMatch> {
    for span in &mut spans {
        match span.pii_type {
            PIIType::Person => {
                let first_name = extract_first_name(&span.text);
                let gender = db.lookup_name(&first_name, locale);
                if gender != Gender::Unknown {
                    span.semantic.get_or_insert_with(Default::default).gender = Some(gender);
                }
            }
            PIIType::Location => {
                let normalized = normalize_location_name(&span.text);
                if let Some((scope, _confidence)) = db.classify_location(&normalized) {
                    span.semantic.get_or_insert_with(Default::default).scope = Some(scope);
                } else if let Some(result) = resolve_via_variation(db, &normalized) {
                    let semantic = span.semantic.get_or_insert_with(Default::default);
                    semantic.scope = Some(result.0);
                    span.confidence = span.confidence.min(0.9);
                }
            }
            _ => {}
        }
    }
    spans
}

fn resolve_via_variation(db: &SemanticDatabase, normalized: &str) -> Option<(Scope, f32)> {
    if let Some(without_article) = strip_leading_article(normalized) {
        if let Some(hit) = db.classify_location(&without_article) {
            return Some(hit);
        }
    }
    let folded = fold_diacritics(normalized);
    if folded != normalized {
        if let Some(hit) = db.classify_location(&folded) {
            return Some(hit);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DetectionSource;

    fn test_db() -> SemanticDatabase {
        let mut db = SemanticDatabase::new();
        db.load_name_line("M Jane_is_not_male ignored");
        db.load_name_line("F jane 1234");
        db.load_name_line("M john 5678");
        db.add_country("usa", "US");
        db.add_country("united states", "US");
        db.add_city("springfield", "US", 100_000);
        db.add_city("chicago", "US", 2_700_000);
        db.add_region("illinois", "US");
        db
    }

    #[test]
    fn person_span_gets_gender_from_first_name() {
        let db = test_db();
        let span = SpanMatch::new(PIIType::Person, 0, 4, 0.9, DetectionSource::Ner, "Jane Doe");
        let result = enrich_semantics(vec![span], &db, None);
        assert_eq!(result[0].semantic.as_ref().unwrap().gender, Some(Gender::Female));
    }

    #[test]
    fn title_prefix_is_stripped_before_name_lookup() {
        let db = test_db();
        let span = SpanMatch::new(PIIType::Person, 0, 8, 0.9, DetectionSource::Ner, "Dr. John Smith");
        let result = enrich_semantics(vec![span], &db, None);
        assert_eq!(result[0].semantic.as_ref().unwrap().gender, Some(Gender::Male));
    }

    #[test]
    fn country_wins_over_city_name_collision_priority() {
        let db = test_db();
        let span = SpanMatch::new(PIIType::Location, 0, 3, 0.9, DetectionSource::Ner, "USA");
        let result = enrich_semantics(vec![span], &db, None);
        assert_eq!(result[0].semantic.as_ref().unwrap().scope, Some(Scope::Country));
    }

    #[test]
    fn large_city_scope_wins_over_small_city_same_db() {
        let db = test_db();
        let span = SpanMatch::new(PIIType::Location, 0, 7, 0.9, DetectionSource::Ner, "Chicago");
        let result = enrich_semantics(vec![span], &db, None);
        assert_eq!(result[0].semantic.as_ref().unwrap().scope, Some(Scope::City));
    }

    #[test]
    fn region_resolves_for_non_city_match() {
        let db = test_db();
        let span = SpanMatch::new(PIIType::Location, 0, 8, 0.9, DetectionSource::Ner, "Illinois");
        let result = enrich_semantics(vec![span], &db, None);
        assert_eq!(result[0].semantic.as_ref().unwrap().scope, Some(Scope::Region));
    }

    #[test]
    fn unknown_location_leaves_scope_none() {
        let db = test_db();
        let span = SpanMatch::new(PIIType::Location, 0, 9, 0.9, DetectionSource::Ner, "Atlantis");
        let result = enrich_semantics(vec![span], &db, None);
        assert!(result[0].semantic.is_none());
    }

    #[test]
    fn leading_article_is_stripped_as_fallback() {
        let mut db = test_db();
        db.add_city("hague", "NL", 550_000);
        let span = SpanMatch::new(PIIType::Location, 0, 9, 0.9, DetectionSource::Ner, "The Hague");
        let result = enrich_semantics(vec![span], &db, None);
        assert_eq!(result[0].semantic.as_ref().unwrap().scope, Some(Scope::City));
    }
}

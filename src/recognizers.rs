// ABOUTME: Regex-based PII recognizers: per-type patterns, validation, and the registry
// ABOUTME: Built-in EMAIL/PHONE/IBAN/BIC_SWIFT/CREDIT_CARD/IP_ADDRESS/URL plus factory-built custom ids
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Regex registry (C3, §4.2).

use crate::policy::AnonymizationPolicy;
use crate::types::{DetectionSource, PIIType, SpanMatch};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A single PII type's detection logic: one or more compiled patterns, a
/// default confidence, and optional post-match validation/normalization
/// hooks (§4.2).
pub struct Recognizer {
    pub pii_type: PIIType,
    patterns: Vec<Regex>,
    default_confidence: f32,
    validate: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl Recognizer {
    #[must_use]
    pub fn new(pii_type: PIIType, patterns: Vec<Regex>, default_confidence: f32) -> Self {
        Self {
            pii_type,
            patterns,
            default_confidence,
            validate: None,
        }
    }

    #[must_use]
    pub fn with_validator(mut self, validate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.validate = Some(Box::new(validate));
        self
    }

    /// Runs every pattern against `text`, deduplicates identical `(start, end)`
    /// hits, and returns validated matches as `source = REGEX` spans.
    #[must_use]
    pub fn find(&self, text: &str) -> Vec<SpanMatch> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(text) {
                let key = (m.start(), m.end());
                if !seen.insert(key) {
                    continue;
                }
                let candidate = m.as_str();
                if let Some(validate) = &self.validate {
                    if !validate(candidate) {
                        continue;
                    }
                }
                out.push(SpanMatch::new(
                    self.pii_type,
                    m.start(),
                    m.end(),
                    self.default_confidence,
                    DetectionSource::Regex,
                    candidate,
                ));
            }
        }
        out
    }
}

/// Holds every active recognizer and runs the policy-driven `find_all` pass.
pub struct RecognizerRegistry {
    recognizers: Vec<Recognizer>,
}

impl RecognizerRegistry {
    /// Registry seeded with the built-in recognizers (§4.2).
    #[must_use]
    pub fn with_builtins() -> Self {
        Self {
            recognizers: builtin_recognizers(),
        }
    }

    /// Registers a caller-supplied custom recognizer, e.g. a `CUSTOM_ID`
    /// built from a caller pattern (§4.2 "factory-built").
    pub fn register(&mut self, recognizer: Recognizer) {
        self.recognizers.push(recognizer);
    }

    /// Builds a `CUSTOM_ID`/`CASE_ID`/`CUSTOMER_ID`-style recognizer from a
    /// caller-provided pattern string.
    ///
    /// # Errors
    /// Returns the `regex` compile error if `pattern` is not valid.
    pub fn custom_from_pattern(
        pii_type: PIIType,
        pattern: &str,
        confidence: f32,
    ) -> Result<Recognizer, regex::Error> {
        Ok(Recognizer::new(pii_type, vec![Regex::new(pattern)?], confidence))
    }

    /// Runs every recognizer over `text`, then drops matches whose type is
    /// not in `policy.enabled_types` or whose confidence is below the
    /// per-type threshold (default 0.5).
    #[must_use]
    pub fn find_all(&self, text: &str, policy: &AnonymizationPolicy) -> Vec<SpanMatch> {
        let mut out = Vec::new();
        for recognizer in &self.recognizers {
            if !policy.enabled_types.contains(&recognizer.pii_type) {
                continue;
            }
            let threshold = policy.confidence_threshold(recognizer.pii_type);
            for span in recognizer.find(text) {
                if span.confidence >= threshold {
                    out.push(span);
                }
            }
        }
        out
    }
}

fn builtin_recognizers() -> Vec<Recognizer> {
    vec![
        Recognizer::new(PIIType::Email, vec![email_pattern().clone()], 0.95),
        Recognizer::new(PIIType::Phone, vec![phone_pattern().clone()], 0.75),
        Recognizer::new(PIIType::Iban, vec![iban_pattern().clone()], 0.9)
            .with_validator(|candidate| validate_iban(candidate)),
        Recognizer::new(PIIType::BicSwift, vec![bic_pattern().clone()], 0.85)
            .with_validator(|candidate| validate_bic(candidate)),
        Recognizer::new(PIIType::CreditCard, vec![credit_card_pattern().clone()], 0.85)
            .with_validator(|candidate| validate_luhn(candidate)),
        Recognizer::new(PIIType::IpAddress, vec![ipv4_pattern().clone(), ipv6_pattern().clone()], 0.8),
        Recognizer::new(
            PIIType::Url,
            vec![
                url_scheme_pattern().clone(),
                url_www_pattern().clone(),
                url_mailto_pattern().clone(),
            ],
            0.85,
        ),
    ]
}

fn cached(init: fn() -> Regex, cell: &'static OnceLock<Regex>) -> &'static Regex {
    cell.get_or_init(init)
}

fn email_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"(?i)\b[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+\b").unwrap()
        },
        &CELL,
    )
}

fn phone_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"(?:\+\d{1,3}[\s.-]?)?(?:\(\d{2,4}\)[\s.-]?)?\d{2,4}[\s.-]?\d{2,4}[\s.-]?\d{2,9}").unwrap()
        },
        &CELL,
    )
}

fn iban_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b").unwrap()
        },
        &CELL,
    )
}

fn bic_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b[A-Z]{4}[A-Z]{2}[A-Z0-9]{2}(?:[A-Z0-9]{3})?\b").unwrap()
        },
        &CELL,
    )
}

fn credit_card_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b(?:\d[ -]?){13,19}\b").unwrap()
        },
        &CELL,
    )
}

fn ipv4_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d?\d)\.){3}(?:25[0-5]|2[0-4]\d|1?\d?\d)\b").unwrap()
        },
        &CELL,
    )
}

fn ipv6_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b").unwrap()
        },
        &CELL,
    )
}

fn url_scheme_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"(?i)\bhttps?://[^\s<>\x22]+").unwrap()
        },
        &CELL,
    )
}

fn url_www_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"(?i)\bwww\.[^\s<>\x22]+").unwrap()
        },
        &CELL,
    )
}

fn url_mailto_pattern() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    cached(
        || {
            #[allow(clippy::unwrap_used)]
            Regex::new(r"(?i)\bmailto:[^\s<>\x22]+").unwrap()
        },
        &CELL,
    )
}

/// IBAN mod-97 checksum (ISO 7064): move the first four characters to the
/// end, map letters to `A=10 .. Z=35`, and require the resulting number mod
/// 97 to equal 1.
#[must_use]
pub fn validate_iban(candidate: &str) -> bool {
    let cleaned: String = candidate.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() < 15 || cleaned.len() > 34 {
        return false;
    }
    let rearranged = format!("{}{}", &cleaned[4..], &cleaned[..4]);
    let mut remainder: u64 = 0;
    for ch in rearranged.chars() {
        if ch.is_ascii_digit() {
            remainder = (remainder * 10 + u64::from(ch as u8 - b'0')) % 97;
        } else if ch.is_ascii_uppercase() {
            let value = u64::from(ch as u8 - b'A') + 10; // two-digit 10..35
            remainder = (remainder * 100 + value) % 97;
        } else {
            return false;
        }
    }
    remainder == 1
}

/// BIC/SWIFT: 8 or 11 uppercase alphanumeric characters, country code
/// (chars 5-6) must be ASCII alphabetic.
#[must_use]
pub fn validate_bic(candidate: &str) -> bool {
    let len = candidate.len();
    if len != 8 && len != 11 {
        return false;
    }
    let chars: Vec<char> = candidate.chars().collect();
    chars[..6].iter().all(|c| c.is_ascii_alphabetic())
}

/// Luhn checksum over the digits of `candidate`, ignoring separators.
#[must_use]
pub fn validate_luhn(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate
        .chars()
        .filter(char::is_ascii_digit)
        .filter_map(|c| c.to_digit(10))
        .collect();
    if digits.len() < 13 || digits.len() > 19 {
        return false;
    }
    let mut sum = 0u32;
    for (i, &digit) in digits.iter().rev().enumerate() {
        if i % 2 == 1 {
            let doubled = digit * 2;
            sum += if doubled > 9 { doubled - 9 } else { doubled };
        } else {
            sum += digit;
        }
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AnonymizationPolicy;

    #[test]
    fn finds_email() {
        let registry = RecognizerRegistry::with_builtins();
        let policy = AnonymizationPolicy::default();
        let spans = registry.find_all("contact jane.doe@example.com now", &policy);
        assert!(spans.iter().any(|s| s.pii_type == PIIType::Email));
    }

    #[test]
    fn luhn_validates_known_test_number() {
        assert!(validate_luhn("4111111111111111"));
        assert!(!validate_luhn("4111111111111112"));
    }

    #[test]
    fn iban_validates_known_test_number() {
        assert!(validate_iban("GB82WEST12345698765432"));
        assert!(!validate_iban("GB82WEST12345698765431"));
    }

    #[test]
    fn bic_validates_length_and_alpha_bank_code() {
        assert!(validate_bic("DEUTDEFF"));
        assert!(validate_bic("DEUTDEFF500"));
        assert!(!validate_bic("1EUTDEFF"));
    }

    #[test]
    fn finds_ipv4() {
        let registry = RecognizerRegistry::with_builtins();
        let policy = AnonymizationPolicy::default();
        let spans = registry.find_all("server at 192.168.1.10 responded", &policy);
        assert!(spans.iter().any(|s| s.pii_type == PIIType::IpAddress));
    }

    #[test]
    fn disabled_type_is_filtered_out() {
        let registry = RecognizerRegistry::with_builtins();
        let mut policy = AnonymizationPolicy::default();
        policy.enabled_types.remove(&PIIType::Email);
        let spans = registry.find_all("contact jane.doe@example.com now", &policy);
        assert!(spans.iter().all(|s| s.pii_type != PIIType::Email));
    }

    #[test]
    fn duplicate_start_end_hits_across_patterns_are_deduplicated() {
        let recognizer = Recognizer::new(
            PIIType::Url,
            vec![url_scheme_pattern().clone(), url_scheme_pattern().clone()],
            0.85,
        );
        let spans = recognizer.find("visit https://example.com/page today");
        assert_eq!(spans.len(), 1);
    }
}

// ABOUTME: PiiAnonymizerConfig::from_env resolving NER mode/backend, cache root, locale, policy
// ABOUTME: Follows ServerConfig::from_env's "env var if present, else a safe default" pattern
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Config (C17, §4.15).

use crate::constants;
use crate::policy::AnonymizationPolicy;
use std::time::Duration;

/// NER inference mode (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NerMode {
    Disabled,
    #[default]
    Standard,
    Quantized,
    Custom,
}

impl NerMode {
    fn from_env_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "disabled" => Self::Disabled,
            "quantized" => Self::Quantized,
            "custom" => Self::Custom,
            _ => Self::Standard,
        }
    }
}

/// NER inference backend selection (§6).
#[derive(Debug, Clone)]
pub enum NerBackend {
    Local,
    Remote { url: String, timeout: Duration },
}

impl Default for NerBackend {
    fn default() -> Self {
        Self::Local
    }
}

/// Top-level environment-driven configuration (§4.15, mirrors `ServerConfig::from_env`).
#[derive(Debug, Clone)]
pub struct PiiAnonymizerConfig {
    pub ner_mode: NerMode,
    pub ner_backend: NerBackend,
    pub custom_model_path: Option<String>,
    pub custom_vocab_path: Option<String>,
    pub cache_root_override: Option<String>,
    /// BCP-47 language subtag only, e.g. `"en"` (§4.8, §6).
    pub default_locale: Option<String>,
    pub initial_policy: AnonymizationPolicy,
}

impl PiiAnonymizerConfig {
    /// Resolves configuration from environment variables, falling back to
    /// documented safe defaults for anything unset (§4.15).
    ///
    /// Recognized variables:
    /// - `PII_NER_MODE` (`disabled`/`standard`/`quantized`/`custom`)
    /// - `PII_NER_BACKEND` (`local`/`remote`)
    /// - `PII_NER_REMOTE_URL`, `PII_NER_REMOTE_TIMEOUT_SECS`
    /// - `PII_CUSTOM_MODEL_PATH`, `PII_CUSTOM_VOCAB_PATH`
    /// - `PII_CACHE_ROOT`
    /// - `PII_LOCALE`
    /// - `PII_ENABLE_LEAK_SCAN`, `PII_ENABLE_SEMANTIC_MASKING`
    #[must_use]
    pub fn from_env() -> Self {
        let ner_mode = env_var("PII_NER_MODE")
            .map(|v| NerMode::from_env_str(&v))
            .unwrap_or_default();

        let ner_backend = match env_var("PII_NER_BACKEND").as_deref() {
            Some("remote") => {
                let url = env_var("PII_NER_REMOTE_URL").unwrap_or_default();
                let timeout_secs: u64 = env_var("PII_NER_REMOTE_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(constants::ner::DEFAULT_REMOTE_TIMEOUT.as_secs());
                NerBackend::Remote {
                    url,
                    timeout: Duration::from_secs(timeout_secs),
                }
            }
            _ => NerBackend::Local,
        };

        let mut policy = AnonymizationPolicy::default();
        if let Some(value) = env_var("PII_ENABLE_LEAK_SCAN") {
            policy.enable_leak_scan = parse_bool(&value, policy.enable_leak_scan);
        }
        if let Some(value) = env_var("PII_ENABLE_SEMANTIC_MASKING") {
            policy.enable_semantic_masking = parse_bool(&value, policy.enable_semantic_masking);
        }

        Self {
            ner_mode,
            ner_backend,
            custom_model_path: env_var("PII_CUSTOM_MODEL_PATH"),
            custom_vocab_path: env_var("PII_CUSTOM_VOCAB_PATH"),
            cache_root_override: env_var("PII_CACHE_ROOT"),
            default_locale: env_var("PII_LOCALE").map(|v| bcp47_language_subtag(&v)),
            initial_policy: policy,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => default,
    }
}

/// Only the language subtag of a BCP-47 tag is used (§4.8): `"en-US"` -> `"en"`.
fn bcp47_language_subtag(tag: &str) -> String {
    tag.split(['-', '_']).next().unwrap_or(tag).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcp47_subtag_strips_region() {
        assert_eq!(bcp47_language_subtag("en-US"), "en");
        assert_eq!(bcp47_language_subtag("de_DE"), "de");
        assert_eq!(bcp47_language_subtag("fr"), "fr");
    }

    #[test]
    fn ner_mode_parses_known_values() {
        assert_eq!(NerMode::from_env_str("disabled"), NerMode::Disabled);
        assert_eq!(NerMode::from_env_str("CUSTOM"), NerMode::Custom);
        assert_eq!(NerMode::from_env_str("unknown"), NerMode::Standard);
    }

    #[test]
    fn parse_bool_falls_back_to_default_on_garbage() {
        assert!(parse_bool("nonsense", true));
        assert!(!parse_bool("nonsense", false));
        assert!(!parse_bool("false", true));
    }
}

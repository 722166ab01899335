// ABOUTME: Session-bound anonymize/rehydrate over a PIIStorageProvider, with merge-keep-existing
// ABOUTME: Decryption failures against stored state surface as a distinct recoverable error kind
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Session (C14, §4.13).

use crate::anonymizer::Anonymizer;
use crate::crypto;
use crate::errors::{AnonymizerResult, PiiError, SessionDecryptError};
use crate::policy::PolicyPatch;
use crate::storage::PIIStorageProvider;
use crate::types::{AnonymizationResult, RawPIIMap};

/// Binds an [`Anonymizer`] to a session id and a [`PIIStorageProvider`].
/// Encryption uses the anonymizer's own key provider (§4.13).
pub struct Session<'a> {
    session_id: String,
    anonymizer: &'a Anonymizer,
    storage: &'a dyn PIIStorageProvider,
}

impl<'a> Session<'a> {
    #[must_use]
    pub fn new(session_id: impl Into<String>, anonymizer: &'a Anonymizer, storage: &'a dyn PIIStorageProvider) -> Self {
        Self {
            session_id: session_id.into(),
            anonymizer,
            storage,
        }
    }

    /// Loads the prior stored map (if any), passes it as `existing_pii_map`
    /// to the tagger, then merges the new entries into the prior map
    /// (existing keys retain their first-seen original), re-encrypts, and
    /// stores (§4.13).
    ///
    /// # Errors
    /// Propagates pipeline errors, or a [`SessionDecryptError`] if the
    /// stored map fails to decrypt under the session key.
    pub async fn anonymize(&self, text: &str, patch: Option<&PolicyPatch>) -> AnonymizerResult<AnonymizationResult> {
        let prior_map = self.load_decrypted().await?;

        let (result, new_raw_map) = self
            .anonymizer
            .anonymize_with_existing(text, patch, prior_map.as_ref())
            .await?;

        let mut merged = prior_map.unwrap_or_default();
        merged.merge_keep_existing(&new_raw_map);

        let envelope = crypto::encrypt_map(&merged, self.anonymizer.key_provider()).map_err(PiiError::from)?;
        self.storage
            .store(&self.session_id, envelope)
            .await
            .map_err(PiiError::from)?;

        Ok(result)
    }

    /// Loads, decrypts, and rehydrates (§4.13).
    ///
    /// # Errors
    /// Propagates storage errors, or a [`SessionDecryptError`] if the
    /// stored map fails to decrypt.
    pub async fn rehydrate(&self, anonymized_text: &str) -> AnonymizerResult<String> {
        let map = self.load_decrypted().await?.unwrap_or_default();
        Ok(crate::rehydrate::rehydrate(anonymized_text, &map, false))
    }

    /// # Errors
    /// Propagates storage errors. Deletion does not require decryption (§4.13).
    pub async fn delete(&self) -> AnonymizerResult<()> {
        self.storage.delete(&self.session_id).await.map_err(PiiError::from)
    }

    /// # Errors
    /// Propagates storage errors.
    pub async fn exists(&self) -> AnonymizerResult<bool> {
        self.storage.exists(&self.session_id).await.map_err(PiiError::from)
    }

    async fn load_decrypted(&self) -> AnonymizerResult<Option<RawPIIMap>> {
        let Some(envelope) = self.storage.load(&self.session_id).await.map_err(PiiError::from)? else {
            return Ok(None);
        };
        match crypto::decrypt_map(&envelope, self.anonymizer.key_provider()) {
            Ok(map) => Ok(Some(map)),
            Err(source) => Err(PiiError::from(SessionDecryptError {
                session_id: self.session_id.clone(),
                source,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymizer::Anonymizer;
    use crate::config::PiiAnonymizerConfig;
    use crate::storage::MemoryPiiStorage;

    #[tokio::test]
    async fn first_call_has_no_prior_map() {
        let config = PiiAnonymizerConfig::from_env();
        let anonymizer = Anonymizer::new(config);
        let storage = MemoryPiiStorage::new();
        let session = Session::new("s1", &anonymizer, &storage);

        let result = session.anonymize("contact jane@example.com", None).await.unwrap();
        assert!(result.anonymized_text.contains("PII"));
        assert!(session.exists().await.unwrap());
    }

    #[tokio::test]
    async fn second_call_reuses_ids_across_session_calls() {
        let config = PiiAnonymizerConfig::from_env();
        let anonymizer = Anonymizer::new(config);
        let storage = MemoryPiiStorage::new();
        let session = Session::new("s1", &anonymizer, &storage);

        session.anonymize("contact jane@example.com", None).await.unwrap();
        let second = session.anonymize("email jane@example.com again", None).await.unwrap();
        assert!(second.anonymized_text.contains(r#"id="1""#));
    }

    #[tokio::test]
    async fn delete_then_rehydrate_yields_untouched_tags() {
        let config = PiiAnonymizerConfig::from_env();
        let anonymizer = Anonymizer::new(config);
        let storage = MemoryPiiStorage::new();
        let session = Session::new("s1", &anonymizer, &storage);

        let result = session.anonymize("contact jane@example.com", None).await.unwrap();
        session.delete().await.unwrap();
        let rehydrated = session.rehydrate(&result.anonymized_text).await.unwrap();
        assert_eq!(rehydrated, result.anonymized_text);
    }
}

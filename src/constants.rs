// ABOUTME: Crate-wide named constants shared across modules
// ABOUTME: Nested const/fn modules mirroring the teacher's constants.rs organization
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Shared constants.

/// Policy defaults (§4.2, §6).
pub mod policy {
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
    pub const DEFAULT_TITLE_MERGE_MAX_GAP: usize = 3;
    pub const LARGE_CITY_POPULATION_THRESHOLD: u64 = 500_000;
}

/// Crypto framing constants (§4.12, §6).
pub mod crypto {
    pub const NONCE_LEN_BYTES: usize = 12;
    pub const AUTH_TAG_LEN_BYTES: usize = 16;
    pub const KEY_LEN_BYTES: usize = 32;
    pub const PBKDF2_MIN_ITERATIONS: u32 = 100_000;
}

/// NER transport defaults (§6).
pub mod ner {
    use std::time::Duration;

    pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 512;
    /// Minimum confidence both neighbors need to be coalesced by
    /// `bio::merge_adjacent_spans` after boundary cleanup (§4.4).
    pub const SPAN_MERGE_CONFIDENCE_THRESHOLD: f32 = 0.5;
}

/// Cache subdirectory naming (§6).
pub mod cache {
    pub const MODELS_SUBDIR: &str = "models";
    pub const SEMANTIC_DATA_SUBDIR: &str = "semantic-data";
    pub const APP_NAME: &str = "rehydra-anonymizer";
}

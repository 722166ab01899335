// ABOUTME: Crate root: module wiring for the on-device PII anonymization pipeline
// ABOUTME: See the anonymizer module for the orchestrated entry point
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! An on-device PII anonymization pipeline: detect spans via regex and NER,
//! resolve overlaps, enrich with semantic attributes, tag into a reversible
//! `<PII .../>` syntax, validate for leaks, and keep the original plaintext
//! behind an authenticated-encryption envelope (§1).
//!
//! ```ignore
//! use rehydra_anonymizer::anonymizer::Anonymizer;
//! use rehydra_anonymizer::config::PiiAnonymizerConfig;
//!
//! # async fn run() -> rehydra_anonymizer::errors::AnonymizerResult<()> {
//! let anonymizer = Anonymizer::new(PiiAnonymizerConfig::from_env());
//! anonymizer.initialize().await?;
//! let result = anonymizer.anonymize("contact jane@example.com", None).await?;
//! println!("{}", result.anonymized_text);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

/// Offset/span arithmetic and the reversible original<->normalized mapping (C1).
pub mod offsets;
/// Line-ending and Unicode normalization with offset tracking (C2).
pub mod normalize;
/// Detection and redaction policy, and its patch-merge semantics (§3, §4.13).
pub mod policy;
/// Regex-based PII recognizers and the registry (C3).
pub mod recognizers;
/// WordPiece/SentencePiece-style tokenizer for local NER inference (C4).
pub mod tokenizer;
/// BIO label decoding into entity spans (C5).
pub mod bio;
/// Uniform NER backend contract plus stub/local/remote implementations (C6).
pub mod ner;
/// Regex/NER span merging and overlap arbitration (C7).
pub mod resolver;
/// Honorific detection and title/name span handling (C8).
pub mod title;
/// Gender/location semantic enrichment (C9).
pub mod semantic;
/// Id assignment, canonical tag generation, and text splicing (C10).
pub mod tagger;
/// Tag/map consistency checks and the leak-scan pass (C11).
pub mod validator;
/// Tolerant tag parsing and rehydration back to plaintext (C12).
pub mod rehydrate;
/// Authenticated-encryption map crypto and key providers (C13).
pub mod crypto;
/// Session-bound anonymize/rehydrate over a storage provider (C14).
pub mod session;
/// Pluggable encrypted-map storage (ambient, §4.15).
pub mod storage;
/// Pluggable model/semantic-data cache (ambient, §4.15).
pub mod cache;
/// Crate-wide named constants (ambient, §4.15).
pub mod constants;
/// `tracing` subscriber setup (ambient, §4.15).
pub mod logging;
/// Environment-driven configuration (ambient, §4.15).
pub mod config;
/// Error kinds for the anonymization pipeline (§7).
pub mod errors;
/// Core data model shared across the pipeline (§3).
pub mod types;
/// Pipeline orchestrator tying every stage together (§4.14).
pub mod anonymizer;

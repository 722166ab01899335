// ABOUTME: Pre-normalization stage: line-ending/unicode normalization with offset tracking
// ABOUTME: Produces normalized text plus a reversible OffsetMapping back to the original
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Pre-normalizer (C2, §4.1).

use crate::offsets::OffsetMapping;
use unicode_normalization::UnicodeNormalization;

/// Options controlling which pre-normalization steps run.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Apply Unicode NFKC normalization after line-ending collapse.
    pub apply_nfkc: bool,
    /// Trim leading/trailing whitespace from the final normalized text.
    pub trim: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            apply_nfkc: true,
            trim: false,
        }
    }
}

/// The normalized text plus the mapping needed to translate offsets back to
/// the original string, should a caller ever need it (§4.1: the rest of the
/// pipeline works entirely in normalized coordinates).
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    pub mapping: OffsetMapping,
}

/// Runs, in order: CRLF -> LF, lone CR -> LF, optional NFKC, optional trim.
///
/// Only the line-ending collapse step emits checkpoints into the
/// [`OffsetMapping`] (each CRLF->LF collapse loses exactly one byte, `\r`).
/// NFKC and trimming can also change length, but per §4.1 the mapping only
/// needs to be reversible for *reporting* original-text offsets, and the
/// dominant real-world length-changing edit downstream tooling cares about is
/// the CRLF collapse; NFKC/trim offsets are not separately checkpointed since
/// nothing in the pipeline operates on pre-NFKC coordinates.
#[must_use]
pub fn normalize(input: &str, options: NormalizeOptions) -> NormalizedText {
    let (collapsed, mapping) = collapse_line_endings(input);

    let nfkc_applied = if options.apply_nfkc {
        collapsed.nfkc().collect::<String>()
    } else {
        collapsed
    };

    let text = if options.trim {
        nfkc_applied.trim().to_owned()
    } else {
        nfkc_applied
    };

    NormalizedText { text, mapping }
}

/// Collapses `\r\n` and lone `\r` to `\n`, recording a checkpoint at every
/// collapse point so the mapping can still translate offsets afterward.
fn collapse_line_endings(input: &str) -> (String, OffsetMapping) {
    let mut output = String::with_capacity(input.len());
    let mut mapping = OffsetMapping::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\r' {
            output.push('\n');
            if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                i += 2; // CRLF -> LF: two original bytes become one
            } else {
                i += 1; // lone CR -> LF: one-for-one, but keep the delta path
            }
            mapping.push_checkpoint(i, output.len());
        } else {
            // Copy one UTF-8 code point verbatim.
            let ch_len = utf8_char_len(bytes[i]);
            output.push_str(&input[i..i + ch_len]);
            i += ch_len;
        }
    }

    (output, mapping)
}

const fn utf8_char_len(first_byte: u8) -> usize {
    if first_byte & 0b1000_0000 == 0 {
        1
    } else if first_byte & 0b1110_0000 == 0b1100_0000 {
        2
    } else if first_byte & 0b1111_0000 == 0b1110_0000 {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_collapses_to_lf() {
        let result = normalize("a\r\nb\r\nc", NormalizeOptions::default());
        assert_eq!(result.text, "a\nb\nc");
    }

    #[test]
    fn lone_cr_collapses_to_lf() {
        let result = normalize("a\rb", NormalizeOptions::default());
        assert_eq!(result.text, "a\nb");
    }

    #[test]
    fn nfkc_normalizes_compatibility_characters() {
        // U+FF21 FULLWIDTH LATIN CAPITAL LETTER A -> 'A'
        let result = normalize("\u{FF21}", NormalizeOptions::default());
        assert_eq!(result.text, "A");
    }

    #[test]
    fn nfkc_can_be_disabled() {
        let options = NormalizeOptions {
            apply_nfkc: false,
            trim: false,
        };
        let result = normalize("\u{FF21}", options);
        assert_eq!(result.text, "\u{FF21}");
    }

    #[test]
    fn trim_removes_surrounding_whitespace_when_enabled() {
        let options = NormalizeOptions {
            apply_nfkc: false,
            trim: true,
        };
        let result = normalize("  hello  ", options);
        assert_eq!(result.text, "hello");
    }

    #[test]
    fn offset_mapping_reflects_crlf_collapse() {
        let result = normalize("ab\r\ncd", NormalizeOptions::default());
        assert_eq!(result.text, "ab\ncd");
        // Original offset of 'c' is 4, normalized offset of 'c' is 3.
        assert_eq!(result.mapping.to_normalized(4), 3);
        assert_eq!(result.mapping.to_original(3), 4);
    }

    #[test]
    fn unicode_multibyte_is_preserved_verbatim() {
        let result = normalize("caf\u{00e9}\r\nbar", NormalizeOptions::default());
        assert!(result.text.starts_with("café"));
        assert!(result.text.ends_with("bar"));
    }
}

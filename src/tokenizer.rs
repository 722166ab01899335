// ABOUTME: WordPiece/SentencePiece-style greedy tokenizer with per-token char spans
// ABOUTME: Produces input_ids/attention_mask/token_type_ids for the local NER backend
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Tokenizer (C4, §4.3).

use std::collections::HashMap;

/// Word-initial marker used by SentencePiece-style vocabularies.
const WORD_INITIAL_MARKER: char = '\u{2581}'; // '▁'

/// A loaded vocabulary: token string to id, plus the handful of special
/// tokens the tokenizer needs to recognize by presence.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    pub cls_token: String,
    pub sep_token: String,
    pub unk_token: String,
}

impl Vocabulary {
    #[must_use]
    pub fn new(token_to_id: HashMap<String, u32>) -> Self {
        let cls_token = ["<s>", "[CLS]"]
            .into_iter()
            .find(|t| token_to_id.contains_key(*t))
            .unwrap_or("<s>")
            .to_string();
        let sep_token = ["</s>", "[SEP]"]
            .into_iter()
            .find(|t| token_to_id.contains_key(*t))
            .unwrap_or("</s>")
            .to_string();
        let unk_token = ["<unk>", "[UNK]"]
            .into_iter()
            .find(|t| token_to_id.contains_key(*t))
            .unwrap_or("<unk>")
            .to_string();
        Self {
            token_to_id,
            cls_token,
            sep_token,
            unk_token,
        }
    }

    #[must_use]
    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }
}

/// One emitted token: its vocabulary id, the original char span it covers
/// (`None` for CLS/SEP/UNK-as-special-position), and whether it continues
/// the same whitespace-bounded word as the previous non-special token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub id: u32,
    pub char_span: Option<(usize, usize)>,
    pub is_continuation: bool,
    pub is_special: bool,
}

/// Full tokenizer output (§4.3).
#[derive(Debug, Clone)]
pub struct Encoding {
    pub tokens: Vec<Token>,
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub token_type_ids: Vec<u32>,
    pub token_to_char_span: Vec<Option<(usize, usize)>>,
}

/// Greedy longest-match tokenizer over a [`Vocabulary`].
pub struct Tokenizer<'a> {
    vocab: &'a Vocabulary,
    max_length: usize,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(vocab: &'a Vocabulary, max_length: usize) -> Self {
        Self { vocab, max_length }
    }

    /// Tokenizes `text`, inserting CLS/SEP and truncating to `max_length`
    /// (the last content position becomes SEP when truncated, §4.3).
    #[must_use]
    pub fn encode(&self, text: &str) -> Encoding {
        let content_tokens = self.tokenize_words(text);

        let mut tokens = Vec::with_capacity(content_tokens.len() + 2);
        tokens.push(Token {
            text: self.vocab.cls_token.clone(),
            id: self.vocab.id_of(&self.vocab.cls_token).unwrap_or(0),
            char_span: None,
            is_continuation: false,
            is_special: true,
        });
        tokens.extend(content_tokens);
        tokens.push(Token {
            text: self.vocab.sep_token.clone(),
            id: self.vocab.id_of(&self.vocab.sep_token).unwrap_or(0),
            char_span: None,
            is_continuation: false,
            is_special: true,
        });

        if tokens.len() > self.max_length {
            tokens.truncate(self.max_length);
            if let Some(last) = tokens.last_mut() {
                *last = Token {
                    text: self.vocab.sep_token.clone(),
                    id: self.vocab.id_of(&self.vocab.sep_token).unwrap_or(0),
                    char_span: None,
                    is_continuation: false,
                    is_special: true,
                };
            }
        }

        let input_ids = tokens.iter().map(|t| t.id).collect();
        let attention_mask = vec![1u32; tokens.len()];
        let token_type_ids = vec![0u32; tokens.len()];
        let token_to_char_span = tokens.iter().map(|t| t.char_span).collect();

        Encoding {
            tokens,
            input_ids,
            attention_mask,
            token_type_ids,
            token_to_char_span,
        }
    }

    /// Whitespace-skip scan with greedy longest-match at each position (§4.3).
    fn tokenize_words(&self, text: &str) -> Vec<Token> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        let mut at_word_start = true;

        while i < chars.len() {
            let (byte_pos, ch) = chars[i];
            if ch.is_whitespace() {
                at_word_start = true;
                i += 1;
                continue;
            }

            let _ = byte_pos;
            let mut produced_any = false;
            let mut first_piece = true;

            loop {
                if i >= chars.len() || chars[i].1.is_whitespace() {
                    break;
                }
                let start_byte = chars[i].0;
                let remaining = &text[start_byte..];

                let (matched_len_chars, matched_token) =
                    self.longest_match(remaining, first_piece && at_word_start);

                if matched_len_chars == 0 {
                    // Single-character fallback with the unknown token.
                    let end_byte = chars.get(i + 1).map_or(text.len(), |&(b, _)| b);
                    tokens.push(Token {
                        text: self.vocab.unk_token.clone(),
                        id: self
                            .vocab
                            .id_of(&self.vocab.unk_token)
                            .unwrap_or(0),
                        char_span: Some((start_byte, end_byte)),
                        is_continuation: !(first_piece && at_word_start),
                        is_special: false,
                    });
                    i += 1;
                } else {
                    let end_char_idx = i + matched_len_chars;
                    let end_byte = chars.get(end_char_idx).map_or(text.len(), |&(b, _)| b);
                    let is_continuation = !(first_piece && at_word_start);
                    tokens.push(Token {
                        text: matched_token,
                        id: self.vocab.id_of(&self.vocab_lookup_key(remaining, matched_len_chars, first_piece && at_word_start)).unwrap_or(0),
                        char_span: Some((start_byte, end_byte)),
                        is_continuation,
                        is_special: false,
                    });
                    i = end_char_idx;
                }
                produced_any = true;
                first_piece = false;
            }

            let _ = produced_any;
            at_word_start = false;
        }

        tokens
    }

    /// Rebuilds the exact vocabulary key used for a match (with or without
    /// the word-initial marker) so the id lookup matches the text used above.
    fn vocab_lookup_key(&self, remaining: &str, matched_len_chars: usize, word_initial: bool) -> String {
        let candidate: String = remaining.chars().take(matched_len_chars).collect();
        if word_initial {
            format!("{WORD_INITIAL_MARKER}{candidate}")
        } else {
            candidate
        }
    }

    /// Tries, longest-first, every prefix of `remaining` (up to the next
    /// whitespace) as a vocabulary entry. At word-initial position, the
    /// candidate is first tried with the `▁` marker prefixed; if no marker'd
    /// entry matches, falls back to the unprefixed form (§4.3).
    fn longest_match(&self, remaining: &str, word_initial: bool) -> (usize, String) {
        let word_chars: Vec<char> = remaining
            .chars()
            .take_while(|c| !c.is_whitespace())
            .collect();
        if word_chars.is_empty() {
            return (0, String::new());
        }

        for len in (1..=word_chars.len()).rev() {
            let candidate: String = word_chars[..len].iter().collect();
            if word_initial {
                let marked = format!("{WORD_INITIAL_MARKER}{candidate}");
                if self.vocab.contains(&marked) {
                    return (len, marked);
                }
            }
            if self.vocab.contains(&candidate) {
                return (len, candidate);
            }
        }
        (0, String::new())
    }
}

//! Answer tokenization for incremental delivery.
//!
//! The streaming transcoder obtains a complete synthesized answer first and
//! re-emits it as ordered chunks. This module does the splitting: section
//! boundaries (blank lines) and line boundaries, with bullet markers kept
//! atomic at the start of their line. Each token carries a pacing class so
//! the emitter can slow down slightly on header lines.
//!
//! Concatenating the tokens' text reproduces the input byte-for-byte, which
//! guarantees streamed and non-streamed clients observe identical content.

use serde::{Deserialize, Serialize};

/// Pacing class of one emitted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// A section header line (trimmed text ends in `:`). Paced slower.
    Header,
    /// A bullet line; the `•` marker stays attached to its line.
    Bullet,
    /// An ordinary prose line.
    Body,
    /// A blank separator line between sections. No pacing delay.
    Break,
}

/// One chunk of a streamed answer, with its pacing class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerToken {
    pub text: String,
    pub kind: TokenKind,
}

/// Delay in milliseconds applied after emitting a token of this kind.
pub fn pacing_millis(kind: TokenKind) -> u64 {
    match kind {
        TokenKind::Header => 80,
        TokenKind::Bullet | TokenKind::Body => 30,
        TokenKind::Break => 0,
    }
}

/// Split a complete answer into ordered tokens.
///
/// Tokens are whole lines including their trailing newline, so the
/// concatenation of all token text equals `text` exactly.
pub fn tokenize_answer(text: &str) -> Vec<AnswerToken> {
    text.split_inclusive('\n')
        .map(|line| {
            let trimmed = line.trim();
            let kind = if trimmed.is_empty() {
                TokenKind::Break
            } else if trimmed.starts_with('•') || trimmed.starts_with('●') {
                TokenKind::Bullet
            } else if trimmed.ends_with(':') {
                TokenKind::Header
            } else {
                TokenKind::Body
            };
            AnswerToken {
                text: line.to_string(),
                kind,
            }
        })
        .collect()
}

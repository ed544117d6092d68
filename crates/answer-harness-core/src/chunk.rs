//! Sentence-boundary text chunker with word overlap.
//!
//! Splits raw document text into passage-sized chunks for embedding. The
//! target chunk size is chosen adaptively from the document's total word
//! count unless the caller pins it, so short documents stay in a few
//! context-rich chunks while long documents produce many bounded ones.
//!
//! # Algorithm
//!
//! 1. If the document is at or below the target size, return it whole.
//! 2. Split on `.` sentence boundaries and greedily accumulate sentences
//!    until adding the next one would exceed the target word count.
//! 3. Each new chunk begins with the last `overlap_words` words of the
//!    previous chunk, carried verbatim, to preserve cross-boundary context.
//! 4. If sentence splitting produced nothing, or any chunk exceeds 1.5× the
//!    target (no usable sentence punctuation), fall back to fixed-size
//!    sliding-window word chunking with the same overlap.
//! 5. Discard chunks under [`MIN_CHUNK_WORDS`] words.
//!
//! Chunking is a pure function: identical input always yields an identical
//! chunk sequence, so re-ingesting a document is reproducible. Passage IDs
//! are assigned later, at ingestion time.

/// Chunks shorter than this many words are treated as noise and dropped.
/// A document small enough to be returned as a single whole chunk is exempt.
pub const MIN_CHUNK_WORDS: usize = 10;

/// Default number of words carried from the end of one chunk into the start
/// of the next.
pub const DEFAULT_OVERLAP_WORDS: usize = 50;

/// Pick a target chunk size (in words) from the document's total word count.
pub fn adaptive_target_words(total_words: usize) -> usize {
    if total_words < 500 {
        150
    } else if total_words < 2000 {
        300
    } else if total_words < 10_000 {
        500
    } else {
        800
    }
}

/// Split `text` into overlapping chunks of roughly `target_words` words.
///
/// When `target_words` is `None` the target is chosen by
/// [`adaptive_target_words`].
pub fn chunk_text(text: &str, target_words: Option<usize>, overlap_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let target = target_words.unwrap_or_else(|| adaptive_target_words(words.len()));

    if target == 0 || words.is_empty() {
        return Vec::new();
    }

    // Small documents stay whole, even below the noise floor.
    if words.len() <= target {
        return vec![text.to_string()];
    }

    let mut chunks = split_on_sentences(text, target, overlap_words);

    // Pathological input (no sentence punctuation, or a single run-on
    // sentence far past the target) falls back to plain word windows.
    let oversized = target + target / 2;
    if chunks.is_empty() || chunks.iter().any(|c| word_count(c) > oversized) {
        chunks = split_on_words(&words, target, overlap_words);
    }

    chunks.retain(|c| word_count(c) >= MIN_CHUNK_WORDS);
    chunks
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

/// Greedy sentence accumulation with verbatim word overlap between chunks.
fn split_on_sentences(text: &str, target: usize, overlap_words: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for sentence in text.split('.') {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let sentence_words = word_count(sentence);

        if current_words + sentence_words > target && !current.is_empty() {
            chunks.push(current.trim().to_string());

            if overlap_words > 0 {
                let prev: Vec<&str> = chunks
                    .last()
                    .map(|c| c.split_whitespace().collect())
                    .unwrap_or_default();
                let start = prev.len().saturating_sub(overlap_words);
                current = format!("{} {}.", prev[start..].join(" "), sentence);
            } else {
                current = format!("{}.", sentence);
            }
            current_words = word_count(&current);
        } else {
            if current.is_empty() {
                current = format!("{}.", sentence);
            } else {
                current.push(' ');
                current.push_str(sentence);
                current.push('.');
            }
            current_words += sentence_words;
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }

    chunks
}

/// Fixed-size sliding window over words, stepping by `target - overlap`.
fn split_on_words(words: &[&str], target: usize, overlap_words: usize) -> Vec<String> {
    let step = target.saturating_sub(overlap_words).max(1);
    let mut chunks = Vec::new();
    let mut i = 0;
    while i < words.len() {
        let end = (i + target).min(words.len());
        chunks.push(words[i..end].join(" "));
        if end == words.len() {
            break;
        }
        i += step;
    }
    chunks
}


use serde::{Deserialize, Serialize};
use tracing::debug;

/// Separators tried coarsest-first (paragraph, line, sentence-ending
/// punctuation, word); a hard character cut is the fallback when none of
/// them produces small enough pieces.
const SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "! ", "? ", " "];

/// Configuration for splitting unit text into embedding-sized segments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Soft maximum segment size in characters.
    pub max_chunk_size: usize,
    /// Trailing characters of the previous segment prefixed to the next one.
    pub overlap: usize,
    /// Unit text at or below this length is embedded as a single chunk.
    pub chunk_threshold: usize,
}

impl Default for ChunkerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 1500,
            overlap: 200,
            chunk_threshold: 1500,
        }
    }
}

/// Split a unit's plain text for embedding. Text at or below the threshold
/// stays whole; anything longer goes through [`split_text`].
#[inline]
pub fn split_unit(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.chars().count() <= config.chunk_threshold {
        return vec![trimmed.to_string()];
    }
    split_text(trimmed, config)
}

/// Split text into segments of at most `max_chunk_size` characters (soft
/// bound: a single token longer than the bound is hard-cut), preferring the
/// coarsest separator that yields conforming pieces and merging adjacent
/// pieces back up to the bound. Base segments concatenate to the input;
/// afterwards each segment after the first is prefixed with the trailing
/// `overlap` characters of its predecessor for boundary context.
#[inline]
pub fn split_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let pieces = split_recursive(text, 0, config.max_chunk_size);
    let segments = merge_pieces(pieces, config.max_chunk_size);

    debug!(
        segments = segments.len(),
        chars = text.chars().count(),
        "split text into segments"
    );

    if config.overlap == 0 {
        return segments;
    }
    add_overlap(segments, config.overlap)
}

/// Recursively split `text` so that every returned piece fits the size
/// bound, starting from the separator at `sep_index` and moving to finer
/// ones only for pieces that are still too large.
fn split_recursive(text: &str, sep_index: usize, max_size: usize) -> Vec<String> {
    if text.chars().count() <= max_size {
        return vec![text.to_string()];
    }

    if sep_index >= SEPARATORS.len() {
        return hard_cut(text, max_size);
    }

    let separator = SEPARATORS[sep_index];
    let parts = split_keeping_separator(text, separator);

    if parts.len() == 1 {
        // Separator absent; try the next finer one.
        return split_recursive(text, sep_index + 1, max_size);
    }

    let mut pieces = Vec::new();
    for part in parts {
        if part.chars().count() <= max_size {
            pieces.push(part);
        } else {
            pieces.extend(split_recursive(&part, sep_index + 1, max_size));
        }
    }
    pieces
}

/// Split on `separator`, keeping the separator attached to the end of the
/// preceding piece so concatenation reconstructs the input exactly.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut search_from = 0;

    while let Some(found) = text[search_from..].find(separator) {
        let end = search_from + found + separator.len();
        parts.push(text[start..end].to_string());
        start = end;
        search_from = end;
    }

    if start < text.len() {
        parts.push(text[start..].to_string());
    }
    parts
}

/// Last-resort split of an unbreakable run into `max_size`-char pieces,
/// cutting only on UTF-8 character boundaries.
fn hard_cut(text: &str, max_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::with_capacity(max_size);
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == max_size {
            pieces.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Greedily merge adjacent pieces back together while the merged segment
/// stays within the size bound, favoring fewer, larger segments.
fn merge_pieces(pieces: Vec<String>, max_size: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut buffer_chars = 0;

    for piece in pieces {
        let piece_chars = piece.chars().count();
        if buffer_chars > 0 && buffer_chars + piece_chars > max_size {
            segments.push(std::mem::take(&mut buffer));
            buffer_chars = 0;
        }
        buffer.push_str(&piece);
        buffer_chars += piece_chars;
    }

    if !buffer.is_empty() {
        segments.push(buffer);
    }
    segments
}

/// Prefix each segment after the first with the trailing `overlap`
/// characters of its predecessor's base text.
fn add_overlap(segments: Vec<String>, overlap: usize) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(segments.len());

    for (i, segment) in segments.iter().enumerate() {
        if i == 0 {
            result.push(segment.clone());
            continue;
        }
        let tail = trailing_chars(&segments[i - 1], overlap);
        if tail.is_empty() {
            result.push(segment.clone());
        } else {
            result.push(format!("{}{}", tail, segment));
        }
    }
    result
}

/// The last `count` characters of `text` (whole text if shorter).
fn trailing_chars(text: &str, count: usize) -> &str {
    let total = text.chars().count();
    if total <= count {
        return text;
    }
    let skip = total - count;
    match text.char_indices().nth(skip) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => text,
    }
}

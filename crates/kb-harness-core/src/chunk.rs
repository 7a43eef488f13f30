//! Word-boundary text chunker.
//!
//! Splits extracted document text into chunks of at most `max_chars`
//! characters. Splitting happens only at whitespace, and whitespace runs
//! between words collapse to a single space, so joining the chunks with
//! `" "` reproduces the original word sequence.
//!
//! A single word longer than `max_chars` is emitted alone as an oversized
//! chunk rather than being cut.

/// Split text into word-safe chunks of at most `max_chars` characters.
///
/// Length is measured in Unicode scalar values, not bytes. Empty or
/// whitespace-only input yields no chunks. Chunk order follows document
/// order, so a chunk's position in the returned vector is its `chunk_index`.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        // Flush when the word plus a separating space would overflow
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if current_len > 0 {
        chunks.push(current);
    }

    chunks
}

//! Text chunking for TTS processing.

use super::TextChunk;

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Split text into chunks of at most `max_len` characters.
///
/// Words are packed greedily: a word joins the current chunk unless it
/// (plus the joining space) would push the chunk past `max_len`, in which
/// case it starts a new chunk. Words are never split; a word longer than
/// `max_len` becomes a chunk of its own. Whitespace between words is
/// collapsed to a single space.
///
/// Length is counted in `char`s. A `max_len` of zero behaves like one.
pub fn chunk_text(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_len {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split a document into indexed, TTS-ready chunks.
pub fn process_document(text: &str, max_len: usize) -> Vec<TextChunk> {
    chunk_text(text, max_len)
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk::new(index, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collapse_whitespace(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_greedy_packing() {
        let chunks = chunk_text("The quick brown fox jumps over the lazy dog", 10);
        assert_eq!(
            chunks,
            vec!["The quick", "brown fox", "jumps over", "the lazy", "dog"]
        );
    }

    #[test]
    fn test_chunk_short_text() {
        let chunks = chunk_text("Hello world. How are you?", 1000);
        assert_eq!(chunks, vec!["Hello world. How are you?"]);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("", 1000).is_empty());
    }

    #[test]
    fn test_chunk_whitespace_only() {
        assert!(chunk_text("   \n\n \t  ", 1000).is_empty());
    }

    #[test]
    fn test_oversize_word_kept_whole() {
        let chunks = chunk_text("a supercalifragilistic word", 8);
        assert_eq!(chunks, vec!["a", "supercalifragilistic", "word"]);
    }

    #[test]
    fn test_whitespace_collapsed_across_lines() {
        let chunks = chunk_text("First line\n\nsecond\tline   here", 100);
        assert_eq!(chunks, vec!["First line second line here"]);
    }

    #[test]
    fn test_length_counts_chars_not_bytes() {
        // Each word is 5 chars but 10 bytes.
        let chunks = chunk_text("ééééé ààààà", 11);
        assert_eq!(chunks, vec!["ééééé ààààà"]);
    }

    #[test]
    fn test_zero_max_len_is_total() {
        let chunks = chunk_text("one two", 0);
        assert_eq!(chunks, vec!["one", "two"]);
    }

    #[test]
    fn test_process_document_indices() {
        let chunks = process_document("one two three four five", 10);
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert_eq!(chunks[1].text, "three four");
    }

    proptest! {
        #[test]
        fn prop_join_reproduces_collapsed_text(text in "[a-zA-Z .,\n\t]{0,300}", max_len in 1usize..60) {
            let chunks = chunk_text(&text, max_len);
            prop_assert_eq!(chunks.join(" "), collapse_whitespace(&text));
        }

        #[test]
        fn prop_chunks_within_bound(words in proptest::collection::vec("[a-z]{1,8}", 0..80), max_len in 8usize..50) {
            let text = words.join("  ");
            for chunk in chunk_text(&text, max_len) {
                prop_assert!(chunk.chars().count() <= max_len);
                prop_assert!(!chunk.is_empty());
            }
        }

        #[test]
        fn prop_long_word_emitted_verbatim(word in "[a-z]{12,30}", max_len in 1usize..12) {
            let text = format!("hi {} there", word);
            let chunks = chunk_text(&text, max_len);
            prop_assert!(chunks.contains(&word));
        }
    }
}

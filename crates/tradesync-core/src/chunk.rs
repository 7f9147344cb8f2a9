//! Batch chunking for destination write ceilings.
//!
//! Smartsheet caps rows-per-call: 100 for full add/update payloads, 300 for
//! comment-only updates. Callers slice their payloads through [`chunks`]
//! and submit sequentially.

/// Rows per call for full add/update payloads.
pub const WRITE_CHUNK_SIZE: usize = 100;

/// Rows per call for comment-only (single cell) updates.
pub const COMMENT_CHUNK_SIZE: usize = 300;

/// Splits `items` into contiguous sub-slices of at most `size` items,
/// preserving order. The last chunk may be shorter. An empty input yields no
/// chunks.
///
/// # Panics
///
/// Panics if `size` is zero.
pub fn chunks<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    assert!(size > 0, "chunk size must be non-zero");
    items.chunks(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_reproduces_input() {
        let items: Vec<u32> = (0..257).collect();
        let rebuilt: Vec<u32> = chunks(&items, 100).flatten().copied().collect();
        assert_eq!(rebuilt, items);
    }

    #[test]
    fn all_but_last_have_requested_length() {
        let items: Vec<u32> = (0..257).collect();
        let lens: Vec<usize> = chunks(&items, 100).map(<[u32]>::len).collect();
        assert_eq!(lens, vec![100, 100, 57]);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let items: Vec<u32> = (0..300).collect();
        let lens: Vec<usize> = chunks(&items, 100).map(<[u32]>::len).collect();
        assert_eq!(lens, vec![100, 100, 100]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let items: Vec<u32> = Vec::new();
        assert_eq!(chunks(&items, 100).count(), 0);
    }

    #[test]
    fn input_smaller_than_size_is_one_chunk() {
        let items = [1, 2, 3];
        let collected: Vec<&[i32]> = chunks(&items, 100).collect();
        assert_eq!(collected, vec![&items[..]]);
    }

    #[test]
    #[should_panic(expected = "chunk size must be non-zero")]
    fn zero_size_panics() {
        let items = [1];
        let _ = chunks(&items, 0).count();
    }
}

//! Page Splitting
//!
//! Pages are contiguous, non-overlapping slices of the input taken in
//! order. Iteration stops at the first empty slice, which is never yielded.

/// One bounded slice of a larger ordered list
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    /// Zero-based page number
    pub index: usize,
    pub entries: &'a [T],
}

// Manual impls: a page is copyable whatever `T` is
impl<T> Clone for Page<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Page<'_, T> {}

/// Lazy page iterator over a slice
#[derive(Debug, Clone)]
pub struct Pages<'a, T> {
    entries: &'a [T],
    page_size: usize,
    next_index: usize,
}

/// Split `entries` into pages of at most `page_size` items
///
/// A `page_size` of zero yields the whole list as a single page.
pub fn paginate<T>(entries: &[T], page_size: usize) -> Pages<'_, T> {
    let page_size = if page_size == 0 { entries.len().max(1) } else { page_size };
    Pages {
        entries,
        page_size,
        next_index: 0,
    }
}

/// Number of non-empty pages `paginate` will yield
pub fn page_count(len: usize, page_size: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size)
}

impl<'a, T> Iterator for Pages<'a, T> {
    type Item = Page<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_index.saturating_mul(self.page_size).min(self.entries.len());
        let end = start.saturating_add(self.page_size).min(self.entries.len());
        let entries = &self.entries[start..end];
        if entries.is_empty() {
            return None;
        }
        let page = Page {
            index: self.next_index,
            entries,
        };
        self.next_index += 1;
        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_cover_input_in_order() {
        for len in 0..25usize {
            for page_size in 1..8usize {
                let input: Vec<usize> = (0..len).collect();
                let pages: Vec<_> = paginate(&input, page_size).collect();

                assert_eq!(pages.len(), len.div_ceil(page_size));
                assert_eq!(pages.len(), page_count(len, page_size));
                let joined: Vec<usize> = pages.iter().flat_map(|p| p.entries.iter().copied()).collect();
                assert_eq!(joined, input);
                for (i, page) in pages.iter().enumerate() {
                    assert_eq!(page.index, i);
                    assert!(!page.entries.is_empty() && page.entries.len() <= page_size);
                }
            }
        }
    }

    #[test]
    fn test_empty_input_yields_no_pages() {
        let input: Vec<u8> = Vec::new();
        assert_eq!(paginate(&input, 10).count(), 0);
        assert_eq!(paginate(&input, 0).count(), 0);
        assert_eq!(page_count(0, 0), 0);
    }

    #[test]
    fn test_zero_page_size_is_single_page() {
        let input = [1, 2, 3];
        let pages: Vec<_> = paginate(&input, 0).collect();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].entries, &input);
        assert_eq!(page_count(3, 0), 1);
    }

    #[test]
    fn test_three_entries_page_size_two() {
        let input = ["A", "B", "C"];
        let pages: Vec<_> = paginate(&input, 2).collect();
        assert_eq!(pages[0].entries, &["A", "B"]);
        assert_eq!(pages[1].entries, &["C"]);
        assert_eq!(pages.len(), 2);
    }
}

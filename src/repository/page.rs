//! Paging types for repository queries
//!
//! A [`PageRequest`] describes the window a read should return, using
//! 1-based page indexes. A [`PageSummary`] carries the metadata a caller
//! needs to render a pager, computed from a separately obtained total.

/// A page window for limiting query results
///
/// Page indexes are 1-based; an index below 1 is clamped to 1, and a page
/// size of 0 is clamped to 1 so offsets stay well defined.
///
/// # Example
///
/// ```rust
/// use dockside::repository::PageRequest;
///
/// let page = PageRequest::new(3, 10);
/// assert_eq!(page.offset(), 20);
/// assert_eq!(page.limit(), 10);
///
/// // Page 0 is treated as page 1
/// assert_eq!(PageRequest::new(0, 10).offset(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    index: u64,
    size: u64,
}

impl PageRequest {
    /// Create a page request, clamping the index to >= 1 and the size to >= 1
    #[must_use]
    pub fn new(index: u64, size: u64) -> Self {
        Self {
            index: index.max(1),
            size: size.max(1),
        }
    }

    /// The first page with the given size
    #[must_use]
    pub fn first(size: u64) -> Self {
        Self::new(1, size)
    }

    /// 1-based page index
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Page size
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Number of rows to skip: `(index - 1) * size`
    pub const fn offset(&self) -> u64 {
        (self.index - 1) * self.size
    }

    /// Maximum number of rows to return
    pub const fn limit(&self) -> u64 {
        self.size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { index: 1, size: 20 }
    }
}

/// Page metadata computed from a total count and the requested window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSummary {
    /// Total number of matching rows
    pub total: u64,
    /// 1-based page index of the window
    pub index: u64,
    /// Page size of the window
    pub size: u64,
}

impl PageSummary {
    /// Build a summary for a request against a known total
    #[must_use]
    pub fn new(total: u64, request: PageRequest) -> Self {
        Self {
            total,
            index: request.index(),
            size: request.size(),
        }
    }

    /// `ceil(total / size)`
    pub const fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.size)
    }

    /// Whether a page follows this one
    pub const fn has_next(&self) -> bool {
        self.index < self.total_pages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_use_one_based_indexes() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(2, 5).offset(), 5);
        assert_eq!(PageRequest::new(3, 10).offset(), 20);
    }

    #[test]
    fn index_below_one_is_clamped() {
        let page = PageRequest::new(0, 10);
        assert_eq!(page.index(), 1);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn zero_size_is_clamped() {
        let page = PageRequest::new(1, 0);
        assert_eq!(page.size(), 1);
    }

    #[test]
    fn first_page() {
        let page = PageRequest::first(25);
        assert_eq!(page.index(), 1);
        assert_eq!(page.limit(), 25);
    }

    #[test]
    fn default_window() {
        let page = PageRequest::default();
        assert_eq!(page.index(), 1);
        assert_eq!(page.size(), 20);
    }

    #[test]
    fn total_pages_rounds_up() {
        let summary = PageSummary::new(25, PageRequest::new(1, 10));
        assert_eq!(summary.total_pages(), 3);
        assert!(summary.has_next());

        let last = PageSummary::new(25, PageRequest::new(3, 10));
        assert!(!last.has_next());
    }

    #[test]
    fn total_pages_exact_division() {
        let summary = PageSummary::new(20, PageRequest::new(1, 10));
        assert_eq!(summary.total_pages(), 2);
    }

    #[test]
    fn empty_total_has_no_pages() {
        let summary = PageSummary::new(0, PageRequest::new(1, 10));
        assert_eq!(summary.total_pages(), 0);
        assert!(!summary.has_next());
    }
}

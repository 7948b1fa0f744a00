use serde::{Deserialize, Serialize};

use crate::types::PageWindow;

/// Pagination state for the log list.
///
/// The page is 1-based. `total_count` is the backend's last reported match
/// count; `None` means unknown (a failed fetch), in which case only page 1
/// is considered valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    page: u32,
    page_size: u32,
    total_count: Option<u64>,
}

impl Pager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total_count: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total_count(&self) -> Option<u64> {
        self.total_count
    }

    pub fn window(&self) -> PageWindow {
        PageWindow {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Pages available for the last known count; an empty result set still
    /// has one (empty) page so UI controls stay well-defined.
    pub fn total_pages(&self) -> u32 {
        match self.total_count {
            Some(count) => (count.div_ceil(self.page_size as u64) as u32).max(1),
            None => 1,
        }
    }

    /// Record the count a fetch reported, clamping the page back into range
    /// if rows disappeared underneath us.
    pub fn set_total_count(&mut self, count: Option<u64>) {
        self.total_count = count;
        if self.page > self.total_pages() {
            self.page = self.total_pages();
        }
    }

    /// Move to `page`. Out-of-range requests are a no-op and return false.
    pub fn go_to(&mut self, page: u32) -> bool {
        if page < 1 || page > self.total_pages() || page == self.page {
            return false;
        }
        self.page = page;
        true
    }

    /// Back to page 1; every filter change goes through here.
    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Number of records the current page is expected to hold.
    pub fn expected_len(&self) -> u64 {
        let total = self.total_count.unwrap_or(0);
        let start = (self.page as u64 - 1) * self.page_size as u64;
        (total.saturating_sub(start)).min(self.page_size as u64)
    }

    /// `[start, end)` bounds for slicing a fully client-held result set.
    pub fn slice_bounds(&self, len: usize) -> (usize, usize) {
        let start = ((self.page as usize - 1) * self.page_size as usize).min(len);
        let end = (start + self.page_size as usize).min(len);
        (start, end)
    }
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(PageWindow::default().page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pager_with(count: u64) -> Pager {
        let mut p = Pager::new(10);
        p.set_total_count(Some(count));
        p
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(pager_with(0).total_pages(), 1);
        assert_eq!(pager_with(10).total_pages(), 1);
        assert_eq!(pager_with(11).total_pages(), 2);
        assert_eq!(pager_with(95).total_pages(), 10);
    }

    #[test]
    fn test_go_to_rejects_out_of_range() {
        let mut p = pager_with(25);
        assert!(!p.go_to(0));
        assert_eq!(p.page(), 1);
        assert!(!p.go_to(4));
        assert_eq!(p.page(), 1);
        assert!(p.go_to(3));
        assert_eq!(p.page(), 3);
    }

    #[test]
    fn test_go_to_same_page_is_noop() {
        let mut p = pager_with(25);
        assert!(!p.go_to(1));
    }

    #[test]
    fn test_unknown_count_allows_only_page_one() {
        let mut p = Pager::new(10);
        assert!(!p.go_to(2));
        assert_eq!(p.page(), 1);
    }

    #[test]
    fn test_expected_len_last_page() {
        let mut p = pager_with(25);
        assert_eq!(p.expected_len(), 10);
        p.go_to(3);
        assert_eq!(p.expected_len(), 5);
    }

    #[test]
    fn test_shrinking_count_clamps_page() {
        let mut p = pager_with(40);
        p.go_to(4);
        p.set_total_count(Some(12));
        assert_eq!(p.page(), 2);
    }

    #[test]
    fn test_slice_bounds() {
        let mut p = pager_with(12);
        assert_eq!(p.slice_bounds(12), (0, 10));
        p.go_to(2);
        assert_eq!(p.slice_bounds(12), (10, 12));
    }
}

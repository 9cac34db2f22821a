//! Windowing math for virtualized columns.
//!
//! Rows have a fixed height, so the set of rows worth drawing is a pure
//! function of the scroll offset and viewport size. Nothing here knows about
//! terminals; the board view feeds it line counts.

use std::ops::Range;

/// Fixed-height list geometry for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub row_height: u32,
    pub height: u32,
    pub overscan: u32,
}

impl Viewport {
    pub fn new(row_height: u32, height: u32, overscan: u32) -> Self {
        Self { row_height, height, overscan }
    }

    /// Number of rows that fit in the viewport, counting a partial row.
    pub fn capacity(&self) -> u32 {
        if self.row_height == 0 {
            return 0;
        }
        self.height.div_ceil(self.row_height)
    }

    /// Upper bound on the size of any window: capacity plus overscan on both sides.
    pub fn max_rows(&self) -> u32 {
        self.capacity() + 2 * self.overscan
    }

    /// Largest scroll offset that still fills the viewport.
    pub fn max_scroll(&self, item_count: usize) -> u32 {
        let content = (item_count as u64).saturating_mul(self.row_height as u64);
        content.saturating_sub(self.height as u64).min(u32::MAX as u64) as u32
    }

    pub fn clamp_scroll(&self, scroll_offset: u32, item_count: usize) -> u32 {
        scroll_offset.min(self.max_scroll(item_count))
    }

    /// Smallest change to `scroll_offset` that brings row `index` fully into view.
    pub fn scroll_to_row(&self, scroll_offset: u32, index: usize) -> u32 {
        let top = (index as u32).saturating_mul(self.row_height);
        let bottom = top.saturating_add(self.row_height);
        if top < scroll_offset {
            top
        } else if bottom > scroll_offset.saturating_add(self.height) {
            bottom.saturating_sub(self.height)
        } else {
            scroll_offset
        }
    }

    pub fn range(&self, scroll_offset: u32, item_count: usize) -> Range<usize> {
        let range = visible_range(scroll_offset, item_count, self.row_height, self.height, self.overscan);
        debug_assert!(range.len() <= self.max_rows() as usize);
        range
    }
}

/// Index range `[start, end)` of rows to mount.
///
/// The first visible row is `floor(scroll_offset / row_height)`; the window
/// covers `ceil(viewport_height / row_height)` rows from there, widened by
/// `overscan` rows on each side and clamped to the list.
///
/// When the offset is not row-aligned one more row peeks in at the bottom;
/// callers keep `overscan >= 1` so that row is always mounted.
pub fn visible_range(
    scroll_offset: u32,
    item_count: usize,
    row_height: u32,
    viewport_height: u32,
    overscan: u32,
) -> Range<usize> {
    if item_count == 0 || row_height == 0 || viewport_height == 0 {
        return 0..0;
    }
    let first = (scroll_offset / row_height) as usize;
    let capacity = viewport_height.div_ceil(row_height) as usize;
    let overscan = overscan as usize;

    let start = first.saturating_sub(overscan).min(item_count);
    let end = first
        .saturating_add(capacity)
        .saturating_add(overscan)
        .min(item_count);
    start..end.max(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_has_empty_window() {
        assert_eq!(visible_range(0, 0, 120, 720, 5), 0..0);
    }

    #[test]
    fn zero_sized_geometry_is_empty() {
        assert_eq!(visible_range(0, 10, 0, 720, 5), 0..0);
        assert_eq!(visible_range(0, 10, 120, 0, 5), 0..0);
    }

    #[test]
    fn top_of_list_has_no_leading_overscan() {
        assert_eq!(visible_range(0, 500, 120, 720, 5), 0..11);
    }

    #[test]
    fn window_is_bounded_at_every_offset() {
        // 500 leads, 6 rows visible, overscan 5: never more than 16 mounted.
        let vp = Viewport::new(120, 720, 5);
        assert_eq!(vp.max_rows(), 16);
        let max = vp.max_scroll(500);
        let mut offset = 0;
        while offset <= max {
            let r = vp.range(offset, 500);
            assert!(r.len() <= 16, "offset {offset} mounted {} rows", r.len());
            assert!(r.end <= 500);
            offset += 37;
        }
    }

    #[test]
    fn bound_is_independent_of_item_count() {
        for n in [20usize, 1_000, 100_000] {
            let r = visible_range(120 * 10, n, 120, 700, 3);
            assert!(r.len() <= (700u32.div_ceil(120) + 6) as usize);
        }
    }

    #[test]
    fn middle_of_list_has_overscan_on_both_sides() {
        // first visible row = 20, capacity 6, overscan 5
        assert_eq!(visible_range(20 * 120, 500, 120, 720, 5), 15..31);
    }

    #[test]
    fn partial_rows_round_capacity_up() {
        let vp = Viewport::new(5, 12, 0);
        assert_eq!(vp.capacity(), 3);
        assert_eq!(vp.range(0, 10), 0..3);
    }

    #[test]
    fn partly_visible_bottom_row_is_mounted() {
        // Lines 4..14 are on screen: rows 0, 1 and the top of row 2.
        assert_eq!(visible_range(4, 10, 5, 10, 1), 0..3);
        for overscan in 1..3 {
            let vp = Viewport::new(5, 10, overscan);
            for offset in 0..=vp.max_scroll(10) {
                let first = (offset / 5) as usize;
                let last = ((offset + 10 - 1) / 5) as usize;
                let r = vp.range(offset, 10);
                assert!(r.contains(&first) && r.contains(&last), "offset {offset} mounted {r:?}");
                assert!(r.len() <= vp.max_rows() as usize);
            }
        }
    }

    #[test]
    fn window_clamps_at_end_of_list() {
        assert_eq!(visible_range(9 * 120, 10, 120, 720, 2), 7..10);
    }

    #[test]
    fn same_inputs_same_window() {
        let a = visible_range(1234, 321, 120, 650, 4);
        let b = visible_range(1234, 321, 120, 650, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn clamp_scroll_stops_at_last_page() {
        let vp = Viewport::new(5, 20, 2);
        assert_eq!(vp.max_scroll(10), 30);
        assert_eq!(vp.clamp_scroll(100, 10), 30);
        assert_eq!(vp.clamp_scroll(100, 2), 0);
    }

    #[test]
    fn scroll_to_row_moves_minimally() {
        let vp = Viewport::new(5, 20, 0);
        // Row 2 (lines 10..15) already visible at offset 0.
        assert_eq!(vp.scroll_to_row(0, 2), 0);
        // Row 6 (lines 30..35) needs offset 15.
        assert_eq!(vp.scroll_to_row(0, 6), 15);
        // Scrolling back up to row 1 puts it at the top.
        assert_eq!(vp.scroll_to_row(15, 1), 5);
    }
}

//! Page slicing and the page-number plan for the pager control.

use std::ops::Range;

use crate::domain::RegistryError;

use super::PageSize;

/// Number of page buttons shown around the active page.
pub const PAGE_RANGE_DISPLAYED: usize = 2;
/// Number of page buttons always shown at each end of the pager.
pub const BOUNDARY_PAGE_BUTTONS: usize = 1;

/// One visible window of a row sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub visible_rows: &'a [T],
    /// Position of `visible_rows` in the full sequence.
    pub range: Range<usize>,
    pub total_rows: usize,
    pub total_pages: usize,
    /// 1-based, 0 when there are no rows.
    pub start_row: usize,
    /// 1-based, 0 when there are no rows.
    pub end_row: usize,
}

/// Cuts page `page_index` (0-based) out of `rows`.
///
/// The index is not corrected: anything outside `0..total_pages` is an error,
/// except page 0 of an empty sequence which yields an empty page.
pub fn paginate<T>(rows: &[T], page_size: PageSize, page_index: usize) -> Result<Page<'_, T>, RegistryError> {
    let size = page_size.get();
    let total_rows = rows.len();
    let total_pages = total_rows.div_ceil(size);

    if total_rows == 0 {
        if page_index != 0 {
            return Err(RegistryError::PageOutOfRange { page_index, total_pages });
        }
        return Ok(Page {
            visible_rows: &rows[0..0],
            range: 0..0,
            total_rows,
            total_pages,
            start_row: 0,
            end_row: 0,
        });
    }

    if page_index >= total_pages {
        return Err(RegistryError::PageOutOfRange { page_index, total_pages });
    }

    let start = page_index * size;
    let end = (start + size).min(total_rows);
    Ok(Page {
        visible_rows: &rows[start..end],
        range: start..end,
        total_rows,
        total_pages,
        start_row: start + 1,
        end_row: end,
    })
}

/// An entry of the pager control: a page button or a collapsed gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    /// 1-based page number.
    Page(usize),
    Ellipsis,
}

/// Plans which page buttons to show for `active_page` (1-based).
///
/// Pages within `boundary_buttons` of either end are always shown, plus a
/// window of `range_displayed` pages around the active one that is shifted
/// rather than cut when it hits an end. Skipped runs collapse into a single
/// [`PageItem::Ellipsis`].
pub fn page_plan(
    active_page: usize,
    total_pages: usize,
    range_displayed: usize,
    boundary_buttons: usize,
) -> Vec<PageItem> {
    if total_pages <= range_displayed {
        return (1..=total_pages).map(PageItem::Page).collect();
    }

    // Window sides are kept in half pages so odd ranges split evenly.
    let active = active_page as i64 * 2;
    let total = total_pages as i64 * 2;
    let range = range_displayed as i64;

    let mut left = range;
    let mut right = range * 2 - left;
    if active > total - range {
        right = total - active;
        left = range * 2 - right;
    } else if active < range {
        left = active;
        right = range * 2 - left;
    }

    let mut items = Vec::with_capacity(total_pages.min(range_displayed + boundary_buttons * 2 + 2));
    for page in 1..=total_pages {
        let half = page as i64 * 2;
        let on_boundary = page <= boundary_buttons || page > total_pages - boundary_buttons.min(total_pages);
        let in_window = half >= active - left && half <= active + right;
        if on_boundary || in_window {
            items.push(PageItem::Page(page));
        } else if matches!(items.last(), Some(PageItem::Page(_))) {
            items.push(PageItem::Ellipsis);
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::PageItem::{Ellipsis, Page as P};
    use proptest::prelude::*;

    fn plan(active: usize, total: usize) -> Vec<PageItem> {
        page_plan(active, total, PAGE_RANGE_DISPLAYED, BOUNDARY_PAGE_BUTTONS)
    }

    #[test]
    fn first_page_window() {
        let rows: Vec<u32> = (1..=23).collect();
        let page = paginate(&rows, PageSize::Ten, 0).unwrap();
        assert_eq!(page.visible_rows, &rows[0..10]);
        assert_eq!((page.total_rows, page.total_pages), (23, 3));
        assert_eq!((page.start_row, page.end_row), (1, 10));
    }

    #[test]
    fn last_page_is_partial() {
        let rows: Vec<u32> = (1..=23).collect();
        let page = paginate(&rows, PageSize::Ten, 2).unwrap();
        assert_eq!(page.visible_rows, &rows[20..23]);
        assert_eq!((page.start_row, page.end_row), (21, 23));
        assert_eq!(page.range, 20..23);
    }

    #[test]
    fn empty_rows_have_no_pages() {
        let rows: Vec<u32> = Vec::new();
        let page = paginate(&rows, PageSize::Five, 0).unwrap();
        assert!(page.visible_rows.is_empty());
        assert_eq!((page.total_pages, page.start_row, page.end_row), (0, 0, 0));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let rows: Vec<u32> = (1..=10).collect();
        assert!(matches!(
            paginate(&rows, PageSize::Five, 2),
            Err(RegistryError::PageOutOfRange { page_index: 2, total_pages: 2 })
        ));
        let empty: Vec<u32> = Vec::new();
        assert!(paginate(&empty, PageSize::Five, 1).is_err());
    }

    #[test]
    fn plan_for_small_page_counts_lists_every_page() {
        assert_eq!(plan(1, 2), vec![P(1), P(2)]);
        assert_eq!(plan(1, 1), vec![P(1)]);
        assert!(plan(1, 0).is_empty());
    }

    #[test]
    fn plan_collapses_both_sides_around_the_active_page() {
        assert_eq!(plan(5, 10), vec![P(1), Ellipsis, P(4), P(5), P(6), Ellipsis, P(10)]);
    }

    #[test]
    fn plan_shifts_the_window_at_the_ends() {
        assert_eq!(plan(1, 10), vec![P(1), P(2), Ellipsis, P(10)]);
        assert_eq!(plan(10, 10), vec![P(1), Ellipsis, P(8), P(9), P(10)]);
        assert_eq!(plan(2, 3), vec![P(1), P(2), P(3)]);
    }

    #[test]
    fn plan_with_odd_range_splits_in_half_pages() {
        assert_eq!(page_plan(5, 10, 3, 1), vec![P(1), Ellipsis, P(4), P(5), P(6), Ellipsis, P(10)]);
    }

    #[test]
    fn plan_without_boundary_buttons_never_leads_with_a_gap() {
        assert_eq!(page_plan(5, 10, 2, 0), vec![P(4), P(5), P(6), Ellipsis]);
    }

    proptest! {
        #[test]
        fn pages_cover_every_row_once(len in 0usize..200, size_idx in 0usize..6) {
            let rows: Vec<usize> = (0..len).collect();
            let size = PageSize::ALL[size_idx];
            let first = paginate(&rows, size, 0).unwrap();
            let mut seen = Vec::new();
            for idx in 0..first.total_pages {
                seen.extend_from_slice(paginate(&rows, size, idx).unwrap().visible_rows);
            }
            prop_assert_eq!(seen, rows);
        }

        #[test]
        fn plan_is_increasing_and_gaps_are_isolated(total in 1usize..60, active_seed in 0usize..60) {
            let active = active_seed % total + 1;
            let items = plan(active, total);
            prop_assert!(items.contains(&P(active)));
            prop_assert_eq!(items.first(), Some(&P(1)));
            prop_assert_eq!(items.last(), Some(&P(total)));
            let mut last_page = 0;
            for pair in items.windows(2) {
                prop_assert!(!(pair[0] == Ellipsis && pair[1] == Ellipsis));
            }
            for item in &items {
                if let P(n) = item {
                    prop_assert!(*n > last_page);
                    last_page = *n;
                }
            }
            prop_assert!(items.iter().filter(|i| **i == Ellipsis).count() <= 2);
        }
    }
}

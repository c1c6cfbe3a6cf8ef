//! In-memory pagination of lists the server returns whole.

use serde::Serialize;

/// One page of a longer list. Pages are numbered from 1.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub results: Vec<T>,
    pub current_page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Slice `items` into the page numbered `page`.
///
/// Page 0 is treated as page 1 and a page size of 0 as 1. A page past the end is empty but still
/// reports the totals.
pub fn paginate<T>(items: Vec<T>, page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);

    let results = items
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        results,
        current_page: page,
        page_size,
        total_items,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_pages() {
        let items: Vec<u32> = (1..=12).collect();

        let first = paginate(items.clone(), 1, 5);
        assert_eq!(first.results, vec![1, 2, 3, 4, 5]);
        assert_eq!(first.total_items, 12);
        assert_eq!(first.total_pages, 3);

        let last = paginate(items, 3, 5);
        assert_eq!(last.results, vec![11, 12]);
        assert_eq!(last.current_page, 3);
    }

    #[test]
    fn page_zero_is_first_page() {
        let page = paginate(vec!["a", "b"], 0, 5);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.results, vec!["a", "b"]);
    }

    #[test]
    fn page_past_end_is_empty() {
        let page = paginate(vec![1, 2, 3], 4, 2);
        assert!(page.results.is_empty());
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_items, 3);
    }

    #[test]
    fn empty_list_has_no_pages() {
        let page = paginate(Vec::<u8>::new(), 1, 5);
        assert!(page.results.is_empty());
        assert_eq!(page.total_pages, 0);
    }
}

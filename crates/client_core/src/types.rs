use serde::Serialize;

/// One page of a list result, cut client side. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Page `page` of `items`. `page` 0 is read as 1 and `per_page` 0 as 1;
/// a page past the end is empty but keeps the requested number.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page);
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();
    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_into_fixed_size_pages() {
        let first = paginate((1..=7).collect::<Vec<_>>(), 1, 3);
        assert_eq!(first.items, vec![1, 2, 3]);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let last = paginate((1..=7).collect::<Vec<_>>(), 3, 3);
        assert_eq!(last.items, vec![7]);
        assert!(!last.has_next());
    }

    #[test]
    fn out_of_range_pages_are_empty() {
        let page = paginate(vec!["a", "b"], 5, 10);
        assert!(page.items.is_empty());
        assert_eq!(page.page, 5);
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn zero_arguments_are_clamped() {
        let page = paginate(vec![1, 2], 0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.items, vec![1]);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn empty_list_has_no_pages() {
        let page = paginate(Vec::<u8>::new(), 1, 10);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next());
    }
}

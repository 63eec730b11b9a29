//! Fixed-size pagination of listing items.

use serde::Serialize;

/// Position of one page within a paginated listing.
///
/// Page numbers are 1-based. `prev_url`/`next_url` are filled in by
/// [`Paginator::link`] once every sibling page's URL is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paginator {
    pub items_per_page: usize,
    pub page_number: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// The tag this listing is filtered by, for tag pages.
    pub tag: Option<String>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

impl Paginator {
    pub fn has_prev(&self) -> bool {
        self.page_number > 1
    }

    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages
    }

    /// Fill sibling links from the URLs of all pages, in page order.
    pub fn link(&mut self, page_urls: &[String]) {
        self.prev_url = if self.has_prev() {
            page_urls.get(self.page_number - 2).cloned()
        } else {
            None
        };
        self.next_url = if self.has_next() {
            page_urls.get(self.page_number).cloned()
        } else {
            None
        };
    }
}

/// One page of items.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub paginator: Paginator,
}

/// Split `items` into consecutive pages of `page_size`.
///
/// Item order is preserved and every item lands on exactly one page.
/// An empty input yields no pages.
pub fn paginate<T: Clone>(items: &[T], page_size: usize, tag: Option<&str>) -> Vec<Page<T>> {
    let page_size = page_size.max(1);
    let total_pages = items.len().div_ceil(page_size);
    items
        .chunks(page_size)
        .enumerate()
        .map(|(i, chunk)| Page {
            items: chunk.to_vec(),
            paginator: Paginator {
                items_per_page: page_size,
                page_number: i + 1,
                total_pages,
                total_items: items.len(),
                tag: tag.map(str::to_string),
                prev_url: None,
                next_url: None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_pages() {
        let pages = paginate::<u32>(&[], 10, None);
        assert!(pages.is_empty());
    }

    #[test]
    fn exact_multiple() {
        let pages = paginate(&[1, 2, 3, 4], 2, None);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].items, vec![3, 4]);
        assert_eq!(pages[1].paginator.total_pages, 2);
    }

    #[test]
    fn remainder_on_last_page() {
        let pages = paginate(&[1, 2, 3, 4, 5], 2, None);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].items, vec![5]);
        assert!(pages.iter().all(|p| p.paginator.total_items == 5));
    }

    #[test]
    fn order_preserved_across_pages() {
        let items: Vec<u32> = (0..7).collect();
        let flattened: Vec<u32> = paginate(&items, 3, None)
            .into_iter()
            .flat_map(|p| p.items)
            .collect();
        assert_eq!(flattened, items);
    }

    #[test]
    fn page_numbers_are_one_based() {
        let pages = paginate(&["a", "b"], 1, None);
        assert_eq!(pages[0].paginator.page_number, 1);
        assert_eq!(pages[1].paginator.page_number, 2);
        assert!(!pages[0].paginator.has_prev());
        assert!(pages[0].paginator.has_next());
        assert!(!pages[1].paginator.has_next());
    }

    #[test]
    fn zero_page_size_treated_as_one() {
        assert_eq!(paginate(&[1, 2], 0, None).len(), 2);
    }

    #[test]
    fn tag_carried_on_every_page() {
        let pages = paginate(&[1, 2, 3], 2, Some("rust"));
        assert!(pages.iter().all(|p| p.paginator.tag.as_deref() == Some("rust")));
    }

    #[test]
    fn link_sets_sibling_urls() {
        let urls = vec!["/".to_string(), "/index2.html".to_string(), "/index3.html".to_string()];
        let mut pages = paginate(&[1, 2, 3], 1, None);
        for page in &mut pages {
            page.paginator.link(&urls);
        }
        assert_eq!(pages[0].paginator.prev_url, None);
        assert_eq!(pages[0].paginator.next_url.as_deref(), Some("/index2.html"));
        assert_eq!(pages[1].paginator.prev_url.as_deref(), Some("/"));
        assert_eq!(pages[1].paginator.next_url.as_deref(), Some("/index3.html"));
        assert_eq!(pages[2].paginator.next_url, None);
    }
}

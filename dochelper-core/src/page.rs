//! Pagination settings and paginated find results.
//!
//! [`Pagination::calculate`] is the pure arithmetic behind every paginated find: given the total
//! number of matches, the requested page and the page size it yields the page metadata plus the
//! skip/limit a backend should apply. A page size of zero disables pagination entirely.

use serde::{Deserialize, Serialize};

use crate::query::{Sort, SortDirection};

/// Options for a find call.
///
/// # Example
///
/// ```ignore
/// use dochelper::page::FindOptions;
/// use dochelper::query::SortDirection;
///
/// let opts = FindOptions::builder()
///     .page(2)
///     .page_size(50)
///     .sort("created_at", SortDirection::Desc)
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Items per page; `0` returns every match.
    pub page_size: u64,
    /// Requested page, 1-based. Values below 2 select the first page.
    pub page: u64,
    /// Ordered sort keys.
    pub sort: Vec<Sort>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    pub fn page(mut self, page: u64) -> Self {
        self.options.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.options.page_size = page_size;
        self
    }

    /// Appends a sort key after any previously added ones.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort::new(field, direction));
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Page metadata and the skip/limit derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page_size: u64,
    pub current_page: u64,
    pub number_of_pages: u64,
    /// Documents to skip, set only past the first page.
    pub skip: Option<u64>,
    /// Documents to return, set whenever pagination applies.
    pub limit: Option<u64>,
}

impl Pagination {
    /// Computes the pagination for `total` matches.
    ///
    /// With `page_size == 0` every field stays zero and no skip/limit is applied. Otherwise the
    /// number of pages is `ceil(total / page_size)` and pages below 2 resolve to the first page.
    ///
    /// ```ignore
    /// let p = Pagination::calculate(11, 3, 5);
    /// assert_eq!((p.current_page, p.number_of_pages), (3, 3));
    /// assert_eq!((p.skip, p.limit), (Some(10), Some(5)));
    /// ```
    pub fn calculate(total: u64, page: u64, page_size: u64) -> Self {
        if page_size == 0 {
            return Self::default();
        }

        let current_page = if page > 1 { page } else { 1 };

        Self {
            page_size,
            current_page,
            number_of_pages: total.div_ceil(page_size),
            skip: (current_page > 1).then(|| (current_page - 1).saturating_mul(page_size)),
            limit: Some(page_size),
        }
    }
}

/// One page of decoded find results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaginationResult<T> {
    pub items: Vec<T>,
    /// Number of documents matching the filter across all pages.
    pub total: u64,
    pub page_size: u64,
    pub current_page: u64,
    pub number_of_pages: u64,
}

impl<T> PaginationResult<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page_size: pagination.page_size,
            current_page: pagination.current_page,
            number_of_pages: pagination.number_of_pages,
        }
    }

    /// Returns `true` if a page after this one exists.
    pub fn has_next_page(&self) -> bool {
        self.current_page < self.number_of_pages
    }

    pub fn next_page(&self) -> Option<u64> {
        self.has_next_page().then(|| self.current_page + 1)
    }

    pub fn previous_page(&self) -> Option<u64> {
        (self.current_page > 1).then(|| self.current_page - 1)
    }

    /// Maps the items while keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginationResult<U> {
        PaginationResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page_size: self.page_size,
            current_page: self.current_page,
            number_of_pages: self.number_of_pages,
        }
    }
}

impl<T> Default for PaginationResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page_size: 0,
            current_page: 0,
            number_of_pages: 0,
        }
    }
}

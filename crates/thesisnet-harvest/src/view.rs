//! Filtering and pagination over the result pool
//!
//! [`view`] is a pure function of the pool and a [`ViewQuery`]. [`ViewState`]
//! is the browsing cursor around it: any filter change sends the user back to
//! page 1.

use serde::Serialize;
use thesisnet_oai::{Classification, HarvestRecord, year_span};

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewQuery {
    /// Case-insensitive substring; empty matches everything
    pub text: String,
    /// Exact four-digit year
    pub year: Option<String>,
    /// `None` means all classifications
    pub classification: Option<Classification>,
    /// 1-based, clamped when the view is computed
    pub page: usize,
    pub page_size: usize,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            year: None,
            classification: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ViewQuery {
    /// Query from a search box: without an explicit `year`, the first year
    /// token in `input` becomes the year filter and is removed from the text.
    pub fn from_search(
        input: &str,
        year: Option<&str>,
        classification: Option<Classification>,
    ) -> Self {
        let explicit = year.map(str::trim).filter(|y| !y.is_empty());
        let (text, year) = match explicit {
            Some(year) => (input.trim().to_string(), Some(year.to_string())),
            None => match year_span(input) {
                Some(span) => {
                    let rest = format!("{} {}", &input[..span.start], &input[span.end..]);
                    (collapse_whitespace(&rest), Some(input[span].to_string()))
                }
                None => (input.trim().to_string(), None),
            },
        };
        Self {
            text,
            year,
            classification,
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn matches(&self, record: &HarvestRecord, needle: &str) -> bool {
        if let Some(year) = &self.year {
            if record.year != *year {
                return false;
            }
        }
        if let Some(class) = self.classification {
            if record.classification != class {
                return false;
            }
        }
        needle.is_empty() || record.haystack().contains(needle)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One page of filtered results.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct View<'a> {
    pub items: Vec<&'a HarvestRecord>,
    pub page: usize,
    pub total_pages: usize,
    /// Matches across all pages
    pub total: usize,
}

impl View<'_> {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Filter `pool` by `query` and cut out the requested page.
pub fn view<'a>(pool: &'a [HarvestRecord], query: &ViewQuery) -> View<'a> {
    let needle = query.text.trim().to_lowercase();
    let matched: Vec<&HarvestRecord> = pool.iter().filter(|r| query.matches(r, &needle)).collect();

    let page_size = query.page_size.max(1);
    let total = matched.len();
    let total_pages = total.div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let items = matched
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    View {
        items,
        page,
        total_pages,
        total,
    }
}

/// Browsing cursor: current filters and page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    query: ViewQuery,
    total_pages: usize,
}

impl ViewState {
    pub fn new(query: ViewQuery) -> Self {
        Self {
            query,
            total_pages: 1,
        }
    }

    pub fn query(&self) -> &ViewQuery {
        &self.query
    }

    /// New search text; a year token inside it replaces the year filter.
    pub fn set_search(&mut self, input: &str) {
        let classification = self.query.classification;
        let page_size = self.query.page_size;
        self.query = ViewQuery::from_search(input, None, classification).with_page_size(page_size);
    }

    pub fn set_year(&mut self, year: Option<&str>) {
        self.query.year = year.map(str::trim).filter(|y| !y.is_empty()).map(String::from);
        self.query.page = 1;
    }

    pub fn set_classification(&mut self, classification: Option<Classification>) {
        self.query.classification = classification;
        self.query.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.query.page_size = page_size.max(1);
        self.query.page = 1;
    }

    /// Compute the current page and remember how many pages there are.
    pub fn view<'a>(&mut self, pool: &'a [HarvestRecord]) -> View<'a> {
        let view = view(pool, &self.query);
        self.query.page = view.page;
        self.total_pages = view.total_pages;
        view
    }

    /// Advance one page; false when already on the last page.
    pub fn next_page(&mut self) -> bool {
        if self.query.page < self.total_pages {
            self.query.page += 1;
            true
        } else {
            false
        }
    }

    /// Step back one page; false when already on page 1.
    pub fn prev_page(&mut self) -> bool {
        if self.query.page > 1 {
            self.query.page -= 1;
            true
        } else {
            false
        }
    }
}

use serde::{Deserialize, Serialize};

/// Items per page on every listing.
pub const PAGE_SIZE: i64 = 10;

/// One page of an ordered listing, shaped for templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub number: i64,
    pub num_pages: i64,
    pub count: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<i64>,
    pub previous_page_number: Option<i64>,
    pub object_list: Vec<T>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    count: i64,
    per_page: i64,
}

/// The slice of rows a resolved page covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: i64,
    pub offset: i64,
    pub limit: i64,
}

impl Paginator {
    pub fn new(count: i64, per_page: i64) -> Self {
        Self {
            count: count.max(0),
            per_page: per_page.max(1),
        }
    }

    /// An empty listing still has one (empty) page.
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + self.per_page - 1) / self.per_page
        }
    }

    /// Resolves a raw `page` query value. Missing or non-numeric values give
    /// the first page; numbers outside `1..=num_pages` clamp to the nearest end.
    pub fn resolve(&self, requested: Option<&str>) -> PageWindow {
        let number = requested
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, self.num_pages());

        PageWindow {
            number,
            offset: (number - 1) * self.per_page,
            limit: self.per_page,
        }
    }

    pub fn page<T>(&self, window: PageWindow, object_list: Vec<T>) -> Paginated<T> {
        let num_pages = self.num_pages();
        let has_next = window.number < num_pages;
        let has_previous = window.number > 1;
        Paginated {
            number: window.number,
            num_pages,
            count: self.count,
            per_page: self.per_page,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(window.number + 1),
            previous_page_number: has_previous.then_some(window.number - 1),
            object_list,
        }
    }
}

/// Normalised cache key component for a raw `page` value.
pub fn requested_page_key(requested: Option<&str>) -> String {
    requested
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .filter(|number| *number >= 1)
        .unwrap_or(1)
        .to_string()
}

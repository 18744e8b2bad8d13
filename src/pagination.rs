//! This modules defines the common functionality for paging data.

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified.
    pub default_page: u64,
    /// The number of rows per page when not specified.
    pub default_page_size: u64,
    /// The largest page size a caller may ask for.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            max_page_size: 50,
        }
    }
}

impl PaginationConfig {
    /// The default config with the page size capped at `max_page_size`, which
    /// usually comes from the `app.max_records_per_page` setting.
    pub fn with_max_page_size(max_page_size: u64) -> Self {
        let max_page_size = max_page_size.max(1);
        let default = Self::default();

        Self {
            default_page_size: default.default_page_size.min(max_page_size),
            max_page_size,
            ..default
        }
    }
}

/// A resolved page of rows to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// The 1-based page number.
    pub number: u64,
    /// The number of rows per page.
    pub size: u64,
}

impl Page {
    /// Resolve an optional page number and size against `config`.
    ///
    /// A missing or zero page becomes the default page, and the page size is
    /// clamped to `1..=max_page_size`.
    pub fn new(number: Option<u64>, size: Option<u64>, config: &PaginationConfig) -> Self {
        let number = number.filter(|&page| page > 0).unwrap_or(config.default_page);
        let size = size
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size.max(1));

        Self { number, size }
    }

    /// The number of rows to skip.
    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.size
    }

    /// The number of rows to fetch.
    pub fn limit(&self) -> u64 {
        self.size
    }
}

/// The number of pages needed to show `row_count` rows, at least one.
pub fn page_count(row_count: u64, page_size: u64) -> u64 {
    row_count.div_ceil(page_size.max(1)).max(1)
}

/// A short summary such as "page 2 of 5 (93 rows)".
pub fn describe_page(page: &Page, row_count: u64) -> String {
    format!(
        "page {} of {} ({} rows)",
        page.number,
        page_count(row_count, page.size),
        row_count
    )
}

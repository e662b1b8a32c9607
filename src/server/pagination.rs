use serde::{Deserialize, Serialize};

use super::response::PageError;

pub const INVALID_PAGE: &str = "Invalid page number. Page number must be greater than 0.";
pub const PAGE_OUT_OF_RANGE: &str = "Page number exceeds available pages.";

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// Parses a 1-based page number. Missing or blank means page 1.
pub fn requested_page(raw: Option<&str>) -> Result<i64, PageError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(raw) => match raw.parse::<i64>() {
            Ok(page) if page > 0 => Ok(page),
            _ => Err(PageError::bad_request(INVALID_PAGE)),
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub current: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub per_page: i64,
    #[serde(skip)]
    pub offset: i64,
}

impl Page {
    /// Resolves `current` against the item count. Asking past the last page
    /// is an error, except that page 1 of an empty list is allowed.
    pub fn new(current: i64, per_page: i64, total_items: i64) -> Result<Self, PageError> {
        let total_pages = (total_items + per_page - 1) / per_page;
        if total_pages > 0 && current > total_pages {
            return Err(PageError::bad_request(PAGE_OUT_OF_RANGE));
        }
        if total_pages == 0 && current > 1 {
            return Err(PageError::bad_request(PAGE_OUT_OF_RANGE));
        }

        Ok(Self {
            current,
            total_pages,
            total_items,
            per_page,
            offset: (current - 1) * per_page,
        })
    }

    /// Items on this page.
    #[must_use]
    pub fn len(&self) -> i64 {
        (self.total_items - self.offset).clamp(0, self.per_page)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

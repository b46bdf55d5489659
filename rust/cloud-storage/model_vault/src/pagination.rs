use utoipa::{IntoParams, ToSchema};

/// Default number of items per page
pub const DEFAULT_LIMIT: i64 = 50;
/// Largest page a client may request
pub const MAX_LIMIT: i64 = 200;

/// Limit/offset pagination as supplied in the query string
#[derive(Debug, Default, Clone, Copy, serde::Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    /// Number of items to return. Defaults to 50, max 200.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Number of items to skip. Defaults to 0.
    #[serde(default)]
    pub offset: Option<i64>,
}

impl Pagination {
    /// Creates a new pagination request
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// The effective limit, clamped into `1..=MAX_LIMIT`
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// The effective offset, never negative
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// A page of results
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct Page<T> {
    /// The items on this page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// The limit used
    pub limit: i64,
    /// The offset used
    pub offset: i64,
}

impl<T> Page<T> {
    /// Builds a page from the items and the pagination used to fetch them
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            items,
            total,
            limit: pagination.limit(),
            offset: pagination.offset(),
        }
    }

    /// Maps every item on the page
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limit_and_offset() {
        assert_eq!(Pagination::default().limit(), DEFAULT_LIMIT);
        assert_eq!(Pagination::new(1000, -5).limit(), MAX_LIMIT);
        assert_eq!(Pagination::new(0, -5).limit(), 1);
        assert_eq!(Pagination::new(10, -5).offset(), 0);
    }
}

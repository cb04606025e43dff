use super::{ApiRateLimit, Issue};

/// One page of issues and its pagination metadata.
#[derive(Debug, PartialEq, Eq)]
pub struct PageResponse {
    /// Retrieved issues, in the order of the API response
    pub(crate) issues: Vec<Issue>,

    /// The number of the last page, authoritative on the first page only
    pub(crate) last_page: u32,

    /// The API rate limit information
    pub(crate) rate_limit: ApiRateLimit,
}

impl PageResponse {
    /// Creates a new `PageResponse` instance.
    pub fn new(issues: Vec<Issue>, last_page: u32, rate_limit: ApiRateLimit) -> Self {
        Self {
            issues,
            last_page,
            rate_limit,
        }
    }

    /// Retrieves the list of issues.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Consumes the response and returns its issues.
    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Retrieves the last page number.
    pub fn last_page(&self) -> u32 {
        self.last_page
    }

    /// Retrieves the API rate limit information.
    pub fn rate_limit(&self) -> &ApiRateLimit {
        &self.rate_limit
    }
}

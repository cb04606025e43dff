use crate::{Issue, StdResult};

/// A trait for retrieving every issue of a GitHub repository.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IssueCrawler: Sync + Send {
    /// Crawl the GitHub API for the issues of the `org/name` repository.
    ///
    /// Either all the issues are returned or an error, never a partial set.
    async fn crawl(&self, repository: &str) -> StdResult<Vec<Issue>>;
}

use crate::{PageRequest, PageResponse, StdResult};

/// A trait for fetching one page of the issues of a repository from the API.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IssueFetcher: Sync + Send {
    /// Fetches the issues of the requested page along with the pagination metadata.
    ///
    /// A throttling response is reported as a [`FetcherError::Throttled`](crate::FetcherError::Throttled) error.
    async fn fetch(&self, request: &PageRequest) -> StdResult<PageResponse>;
}

use std::fmt::Display;

use super::{FetcherError, RepositoryIdentifier};

/// The number of issues requested per page.
pub const ISSUES_PER_PAGE: u8 = 100;

/// A request for one page of the issues of a repository
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct PageRequest {
    /// The repository to list the issues of.
    pub(crate) repository: RepositoryIdentifier,

    /// The 1-based page number.
    pub(crate) page: u32,
}

impl PageRequest {
    /// Creates a new `PageRequest`, pages being numbered from 1.
    pub fn try_new(repository: RepositoryIdentifier, page: u32) -> Result<Self, FetcherError> {
        if page == 0 {
            return Err(FetcherError::InvalidPage(page));
        }

        Ok(Self { repository, page })
    }

    /// Retrieves the repository.
    pub fn repository(&self) -> &RepositoryIdentifier {
        &self.repository
    }

    /// Retrieves the page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Creates a dummy `PageRequest` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy(page: u32) -> Self {
        Self::try_new(RepositoryIdentifier::new("org", "repo"), page).unwrap()
    }
}

impl Display for PageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PageRequest: repository={}, page={}",
            self.repository, self.page
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_zero_is_rejected() {
        let error = PageRequest::try_new(RepositoryIdentifier::new("org", "repo"), 0).unwrap_err();

        assert_eq!(error, FetcherError::InvalidPage(0));
    }

    #[test]
    fn first_page_is_accepted() {
        let request = PageRequest::try_new(RepositoryIdentifier::new("org", "repo"), 1).unwrap();

        assert_eq!(request.page(), 1);
    }

    #[test]
    fn display() {
        assert_eq!(
            PageRequest::dummy(7).to_string(),
            "PageRequest: repository=org/repo, page=7"
        );
    }
}

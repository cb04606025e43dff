use std::{fmt::Display, ops::Deref, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FetcherError;

/// The identifier assigned to an issue by the API.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueId(pub u64);

impl Deref for IssueId {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The number of an issue within its repository.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IssueNumber(pub u64);

impl Deref for IssueNumber {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for IssueNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A label attached to an issue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub url: String,
    pub name: String,
    pub color: String,
}

/// An issue of a GitHub repository.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub(crate) id: IssueId,
    pub(crate) number: IssueNumber,
    pub(crate) state: String,
    pub(crate) title: String,
    pub(crate) body: String,
    pub(crate) created_by: String,
    pub(crate) labels: Vec<Label>,
    pub(crate) assignee: String,
    pub(crate) milestone: String,
    pub(crate) created_at: Option<DateTime<Utc>>,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) closed_at: Option<DateTime<Utc>>,
    pub(crate) repository: String,
}

impl Issue {
    /// Creates a new `Issue` with the mandatory fields, the others being left empty.
    pub fn new(id: u64, number: u64, state: &str, title: &str, repository: &str) -> Self {
        Self {
            id: IssueId(id),
            number: IssueNumber(number),
            state: state.to_string(),
            title: title.to_string(),
            body: String::new(),
            created_by: String::new(),
            labels: vec![],
            assignee: String::new(),
            milestone: String::new(),
            created_at: None,
            updated_at: None,
            closed_at: None,
            repository: repository.to_string(),
        }
    }

    /// Retrieves the issue identifier.
    pub fn id(&self) -> IssueId {
        self.id
    }

    /// Retrieves the issue number.
    pub fn number(&self) -> IssueNumber {
        self.number
    }

    /// Retrieves the issue state (`open` or `closed`).
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Retrieves the issue title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Retrieves the issue body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Retrieves the login of the issue author.
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Retrieves the labels of the issue.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Retrieves the login of the assignee.
    pub fn assignee(&self) -> &str {
        &self.assignee
    }

    /// Retrieves the milestone title.
    pub fn milestone(&self) -> &str {
        &self.milestone
    }

    /// Retrieves the creation time of the issue.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Retrieves the time of the last update of the issue.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Retrieves the time the issue was closed, if it is closed.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// Retrieves the `org/name` of the repository holding the issue.
    pub fn repository(&self) -> &str {
        &self.repository
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Issue: {}{}, State: {}, Title: {}",
            self.repository, self.number, self.state, self.title
        )
    }
}

/// A repository identifier of the form `org/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryIdentifier {
    organization: String,
    name: String,
}

impl RepositoryIdentifier {
    /// Creates a new `RepositoryIdentifier` from its two segments.
    pub fn new(organization: &str, name: &str) -> Self {
        Self {
            organization: organization.to_string(),
            name: name.to_string(),
        }
    }

    /// Retrieves the organization segment.
    pub fn organization(&self) -> &str {
        &self.organization
    }

    /// Retrieves the repository name segment.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepositoryIdentifier {
    type Err = FetcherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [organization, name] if !organization.is_empty() && !name.is_empty() => {
                Ok(Self::new(organization, name))
            }
            _ => Err(FetcherError::InvalidRepository(s.to_string())),
        }
    }
}

impl Display for RepositoryIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.organization, self.name)
    }
}

/// A fetcher API rate limit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRateLimit {
    /// The maximum number of requests that can be made in the current window.
    pub limit: u32,
    /// The remaining number of requests that can be made in the current window.
    pub remaining: u32,
    /// The epoch second at which the window resets.
    pub reset_at: i64,
}

impl ApiRateLimit {
    #[cfg(test)]
    /// Creates a dummy `ApiRateLimit` instance for testing purposes.
    pub fn dummy() -> Self {
        Self {
            limit: 5000,
            remaining: 4999,
            reset_at: 1735689600,
        }
    }
}

impl Display for ApiRateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RateLimit: calls={}/{}, reset={}",
            self.limit.saturating_sub(self.remaining),
            self.limit,
            self.reset_at
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod repository_identifier {
        use super::*;

        #[test]
        fn parses_org_and_name() {
            let repository: RepositoryIdentifier = "kubernetes/kubernetes".parse().unwrap();

            assert_eq!(repository.organization(), "kubernetes");
            assert_eq!(repository.name(), "kubernetes");
            assert_eq!(repository.to_string(), "kubernetes/kubernetes");
        }

        #[test]
        fn rejects_single_segment() {
            let error = "kubernetes".parse::<RepositoryIdentifier>().unwrap_err();

            assert_eq!(
                error,
                FetcherError::InvalidRepository("kubernetes".to_string())
            );
        }

        #[test]
        fn rejects_too_many_segments() {
            "kubernetes/kubernetes/issues"
                .parse::<RepositoryIdentifier>()
                .expect_err("Three segments should be rejected");
        }

        #[test]
        fn rejects_empty_segments() {
            "/kubernetes"
                .parse::<RepositoryIdentifier>()
                .expect_err("Empty organization should be rejected");
            "kubernetes/"
                .parse::<RepositoryIdentifier>()
                .expect_err("Empty name should be rejected");
        }
    }

    #[test]
    fn rate_limit_display_shows_consumed_calls() {
        let rate_limit = ApiRateLimit::dummy();

        assert_eq!(
            rate_limit.to_string(),
            "RateLimit: calls=1/5000, reset=1735689600"
        );
    }

    #[test]
    fn new_issue_has_no_timestamps() {
        let issue = Issue::new(1001, 42, "open", "Flaky test", "org/repo");

        assert_eq!(None, issue.created_at());
        assert_eq!(None, issue.updated_at());
        assert_eq!(None, issue.closed_at());
    }

    #[test]
    fn issue_display() {
        let issue = Issue::new(1001, 42, "open", "Flaky test", "org/repo");

        assert_eq!(
            issue.to_string(),
            "Issue: org/repo#42, State: open, Title: Flaky test"
        );
    }
}

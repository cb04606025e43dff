use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, HeaderMap, LINK, RETRY_AFTER},
};
use serde::Deserialize;

use crate::{
    ApiRateLimit, FetcherError, ISSUES_PER_PAGE, Issue, IssueFetcher, IssueId, IssueNumber, Label,
    PageRequest, PageResponse, RepositoryIdentifier, StdResult,
};

/// The REST production endpoint for GitHub.
pub const GITHUB_API_ENDPOINT: &str = "https://api.github.com";

const USER_AGENT: &str = "issue-crawler";

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

#[derive(Deserialize, Debug)]
struct IssueNode {
    id: u64,
    number: Option<u64>,
    state: Option<String>,
    title: Option<String>,
    body: Option<String>,
    user: Option<UserNode>,
    #[serde(default)]
    labels: Vec<LabelNode>,
    assignee: Option<UserNode>,
    milestone: Option<MilestoneNode>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
struct UserNode {
    login: Option<String>,
}

#[derive(Deserialize, Debug)]
struct LabelNode {
    url: Option<String>,
    name: Option<String>,
    color: Option<String>,
}

#[derive(Deserialize, Debug)]
struct MilestoneNode {
    title: Option<String>,
}

fn required<T>(value: Option<T>, field: &str, page: u32) -> Result<T, FetcherError> {
    value.ok_or_else(|| FetcherError::Decode {
        page,
        message: format!("missing field `{field}`"),
    })
}

impl LabelNode {
    fn try_into_label(self, page: u32) -> Result<Label, FetcherError> {
        Ok(Label {
            url: required(self.url, "label.url", page)?,
            name: required(self.name, "label.name", page)?,
            color: required(self.color, "label.color", page)?,
        })
    }
}

impl IssueNode {
    fn try_into_issue(
        self,
        repository: &RepositoryIdentifier,
        page: u32,
    ) -> Result<Issue, FetcherError> {
        let created_by = match self.user {
            Some(user) => required(user.login, "user.login", page)?,
            None => String::new(),
        };
        let assignee = match self.assignee {
            Some(assignee) => required(assignee.login, "assignee.login", page)?,
            None => String::new(),
        };
        let milestone = match self.milestone {
            Some(milestone) => required(milestone.title, "milestone.title", page)?,
            None => String::new(),
        };
        let labels = self
            .labels
            .into_iter()
            .map(|label| label.try_into_label(page))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Issue {
            id: IssueId(self.id),
            number: IssueNumber(required(self.number, "number", page)?),
            state: required(self.state, "state", page)?,
            title: required(self.title, "title", page)?,
            body: self.body.unwrap_or_default(),
            created_by,
            labels,
            assignee,
            milestone,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            repository: repository.to_string(),
        })
    }
}

/// Extracts the page number of the `rel="last"` entry of a `Link` header.
///
/// GitHub `Link` headers look like:
/// `<https://api.github.com/repos/org/repo/issues?per_page=100&page=2>; rel="next", <...&page=9>; rel="last"`
fn parse_last_page(link_header: &str) -> Option<u32> {
    link_header.split(',').find_map(|part| {
        let mut segments = part.split(';').map(str::trim);
        let url = segments
            .next()?
            .strip_prefix('<')
            .and_then(|url| url.strip_suffix('>'))?;
        let is_last = segments.any(|segment| segment == r#"rel="last""#);
        if !is_last {
            return None;
        }
        let (_, query) = url.split_once('?')?;

        query
            .split('&')
            .find_map(|param| param.strip_prefix("page="))
            .and_then(|page| page.parse().ok())
    })
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Tells a rate limited 403 apart from a permission denial.
///
/// GitHub signals an exhausted primary limit with `x-ratelimit-remaining: 0`, and a
/// secondary limit with a `retry-after` header or a "rate limit" message.
fn is_rate_limited_forbidden(headers: &HeaderMap, body: &str) -> bool {
    header_value::<u32>(headers, "x-ratelimit-remaining") == Some(0)
        || headers.contains_key(RETRY_AFTER)
        || body.to_lowercase().contains("rate limit")
}

fn parse_rate_limit(headers: &HeaderMap) -> ApiRateLimit {
    ApiRateLimit {
        limit: header_value(headers, "x-ratelimit-limit").unwrap_or_default(),
        remaining: header_value(headers, "x-ratelimit-remaining").unwrap_or_default(),
        reset_at: header_value(headers, "x-ratelimit-reset").unwrap_or_default(),
    }
}

/// Fetches pages of repository issues from the GitHub REST API.
pub struct RestIssueFetcher {
    client: Client,
    endpoint: String,
    token: String,
}

impl RestIssueFetcher {
    /// Creates a new `RestIssueFetcher` authenticated with the given token.
    ///
    /// Without a request timeout, a hung call stalls its caller indefinitely.
    pub fn try_new(
        endpoint: &str,
        token: &str,
        request_timeout: Option<Duration>,
    ) -> StdResult<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(request_timeout) = request_timeout {
            builder = builder.timeout(request_timeout);
        }
        let client = builder
            .build()
            .with_context(|| "Failed to build the HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn issues_url(&self, repository: &RepositoryIdentifier) -> String {
        format!(
            "{}/repos/{}/{}/issues",
            self.endpoint,
            repository.organization(),
            repository.name()
        )
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, FetcherError> {
        let page = request.page();
        let response = self
            .client
            .get(self.issues_url(request.repository()))
            .bearer_auth(&self.token)
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .query(&[
                ("state", "all".to_string()),
                ("per_page", ISSUES_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetcherError::Transport {
                page,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetcherError::Throttled {
                page,
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let headers = response.headers().clone();
            let message = response.text().await.unwrap_or_default();
            if status == StatusCode::FORBIDDEN && is_rate_limited_forbidden(&headers, &message) {
                return Err(FetcherError::Throttled {
                    page,
                    status: status.as_u16(),
                });
            }
            return Err(FetcherError::Remote {
                page,
                status: status.as_u16(),
                message,
            });
        }

        let last_page = response
            .headers()
            .get(LINK)
            .and_then(|link| link.to_str().ok())
            .and_then(parse_last_page)
            .unwrap_or(page);
        let rate_limit = parse_rate_limit(response.headers());
        let body = response.bytes().await.map_err(|e| FetcherError::Transport {
            page,
            message: e.to_string(),
        })?;
        let nodes: Vec<IssueNode> =
            serde_json::from_slice(&body).map_err(|e| FetcherError::Decode {
                page,
                message: e.to_string(),
            })?;
        let issues = nodes
            .into_iter()
            .map(|node| node.try_into_issue(request.repository(), page))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(issues, last_page, rate_limit))
    }
}

#[async_trait::async_trait]
impl IssueFetcher for RestIssueFetcher {
    async fn fetch(&self, request: &PageRequest) -> StdResult<PageResponse> {
        debug!("Fetching {request}");
        match self.fetch_page(request).await {
            Ok(response) => {
                info!(
                    "Fetched page {}/{} of {}: {} issues, {}",
                    request.page(),
                    response.last_page(),
                    request.repository(),
                    response.issues().len(),
                    response.rate_limit()
                );

                Ok(response)
            }
            Err(e @ FetcherError::Throttled { .. }) => Err(e.into()),
            Err(e) => {
                error!("Failed to list {request}: {e}");
                Err(e.into())
            }
        }
    }
}

use std::{fmt::Display, sync::Arc};

use anyhow::{Context, anyhow};
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::{
    Cancellation, DispatchRateLimiter, FetchConfig, Issue, IssueCrawler, IssueFetcher,
    PageRequest, RepositoryIdentifier, StdResult, WorkerPool,
};

/// Capacity of the page queue; a page is enqueued once the previous one is claimed.
const PAGE_QUEUE_CAPACITY: usize = 1;

/// Capacity of the issue sink between the workers and the aggregator.
const ISSUE_SINK_CAPACITY: usize = 100;

/// The phases of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Init,
    Priming,
    Dispatching,
    Draining,
    Completed,
    Aborted,
}

impl Display for CrawlPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            CrawlPhase::Init => "init",
            CrawlPhase::Priming => "priming",
            CrawlPhase::Dispatching => "dispatching",
            CrawlPhase::Draining => "draining",
            CrawlPhase::Completed => "completed",
            CrawlPhase::Aborted => "aborted",
        };
        write!(f, "{phase}")
    }
}

/// A crawler fetching the pages of a repository issues concurrently.
///
/// The first page is fetched alone to learn the page count, then the other pages are
/// dispatched at a bounded rate to a pool of workers. Every fetch start, the first page
/// included, is admitted by one limiter shared across the crawl, so slow pages never
/// release a burst of fetches.
pub struct ParallelIssueCrawler {
    /// The page fetcher shared by the workers
    fetcher: Arc<dyn IssueFetcher>,

    config: FetchConfig,
}

impl ParallelIssueCrawler {
    /// Creates a new `ParallelIssueCrawler` instance with the given fetcher and configuration.
    pub fn new(fetcher: Arc<dyn IssueFetcher>, config: FetchConfig) -> Self {
        Self { fetcher, config }
    }

    fn enter(repository: &dyn Display, phase: CrawlPhase) {
        debug!("Crawl of {repository} entering {phase} phase");
    }

    /// Enqueues the pages `2..=last_page` one by one as the rate limiter admits them.
    ///
    /// Returns the number of pages enqueued.
    async fn dispatch_pages(
        &self,
        repository: &RepositoryIdentifier,
        last_page: u32,
        pages: mpsc::Sender<PageRequest>,
        cancellation: &Cancellation,
    ) -> StdResult<u32> {
        let rate_limiter = DispatchRateLimiter::new(self.config.dispatch_interval);
        let mut total_dispatched = 0;
        for page in 2..=last_page {
            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                _ = rate_limiter.admit() => {}
            }
            let request = PageRequest::try_new(repository.clone(), page)?;
            let sent = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                sent = pages.send(request) => sent,
            };
            if sent.is_err() {
                warn!("Page queue closed, {page}/{last_page} not dispatched");
                break;
            }
            total_dispatched += 1;
        }

        Ok(total_dispatched)
    }
}

#[async_trait::async_trait]
impl IssueCrawler for ParallelIssueCrawler {
    async fn crawl(&self, repository: &str) -> StdResult<Vec<Issue>> {
        Self::enter(&repository, CrawlPhase::Init);
        let repository: RepositoryIdentifier = repository.parse()?;
        self.config.validate()?;

        Self::enter(&repository, CrawlPhase::Priming);
        let fetch_rate_limiter = Arc::new(DispatchRateLimiter::new(self.config.dispatch_interval));
        fetch_rate_limiter.admit().await;
        let first_page = self
            .fetcher
            .fetch(&PageRequest::try_new(repository.clone(), 1)?)
            .await
            .with_context(|| format!("Failed to fetch page 1 of {repository}"))?;
        let last_page = first_page.last_page().max(1);
        info!("Crawling {last_page} pages of {repository} issues");

        Self::enter(&repository, CrawlPhase::Dispatching);
        let (page_sender, page_receiver) = mpsc::channel(PAGE_QUEUE_CAPACITY);
        let (issue_sender, mut issue_receiver) = mpsc::channel(ISSUE_SINK_CAPACITY);
        let cancellation = Cancellation::new();

        let mut issues = first_page.into_issues();
        let aggregator = tokio::spawn(async move {
            while let Some(issue) = issue_receiver.recv().await {
                issues.push(issue);
            }
            issues
        });
        let pool = WorkerPool::new(
            Arc::clone(&self.fetcher),
            self.config.worker_count,
            fetch_rate_limiter,
        );
        let pool_cancellation = cancellation.clone();
        let pool_handle = tokio::spawn(async move {
            pool.run(page_receiver, issue_sender, pool_cancellation)
                .await
        });

        let dispatched = self
            .dispatch_pages(&repository, last_page, page_sender, &cancellation)
            .await;
        match &dispatched {
            Ok(total_dispatched) => debug!("Dispatched {total_dispatched} pages of {repository}"),
            Err(_) => {
                cancellation.cancel();
            }
        }

        Self::enter(&repository, CrawlPhase::Draining);
        let pool_result = pool_handle
            .await
            .map_err(|e| anyhow!(e).context("Worker pool task failed"))
            .and_then(|result| result)
            .and(dispatched.map(|_| ()));
        let issues = aggregator
            .await
            .map_err(|e| anyhow!(e).context("Issue aggregator task failed"))?;

        match pool_result {
            Ok(()) => {
                Self::enter(&repository, CrawlPhase::Completed);
                info!("Crawled {} issues of {repository}", issues.len());

                Ok(issues)
            }
            Err(e) => {
                Self::enter(&repository, CrawlPhase::Aborted);
                warn!(
                    "Discarding {} issues of {repository} after failure",
                    issues.len()
                );

                Err(e)
            }
        }
    }
}

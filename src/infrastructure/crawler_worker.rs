use std::sync::Arc;

use anyhow::anyhow;
use log::{error, info, warn};
use tokio::sync::{Mutex, mpsc};

use crate::{Cancellation, DispatchRateLimiter, Issue, IssueFetcher, PageRequest, StdResult};

/// The shared, multi reader end of the page queue.
pub type PageQueue = Arc<Mutex<mpsc::Receiver<PageRequest>>>;

/// A worker fetching the pages it claims from the page queue
pub struct IssueWorker {
    id: usize,
    fetcher: Arc<dyn IssueFetcher>,

    /// The limiter shared by every fetch of a crawl, gating the start of each fetch
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl IssueWorker {
    /// Creates a new `IssueWorker` instance with the given fetcher and fetch rate limiter.
    pub fn new(
        id: usize,
        fetcher: Arc<dyn IssueFetcher>,
        rate_limiter: Arc<DispatchRateLimiter>,
    ) -> Self {
        Self {
            id,
            fetcher,
            rate_limiter,
        }
    }

    async fn claim_page(pages: &PageQueue) -> Option<PageRequest> {
        pages.lock().await.recv().await
    }

    /// Triggers the cancellation with a fatal error.
    ///
    /// Only the first trigger returns the error, later ones are logged and swallowed.
    fn fail(&self, error: anyhow::Error, cancellation: &Cancellation) -> StdResult<()> {
        let id = self.id;
        if cancellation.cancel() {
            error!("Worker #{id} failed: {error:#}");
            return Err(error);
        }
        warn!("Worker #{id} failed after cancellation: {error:#}");

        Ok(())
    }

    /// Fetches pages until the queue is closed and drained, or until cancellation.
    ///
    /// Each fetch starts only once the shared rate limiter admits it. A fatal fetch or
    /// delivery error triggers the cancellation. The error is returned only by
    /// the worker which triggered it; later failures are logged and swallowed.
    pub async fn run(
        &self,
        pages: PageQueue,
        sink: mpsc::Sender<Issue>,
        cancellation: Cancellation,
    ) -> StdResult<()> {
        let id = self.id;
        info!("Worker #{id} starting up");
        loop {
            let request = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!("Worker #{id} cancelled");
                    return Ok(());
                }
                request = Self::claim_page(&pages) => request,
            };
            let Some(request) = request else {
                info!("Worker #{id} detected closed page queue, shutting down");
                return Ok(());
            };

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!("Worker #{id} cancelled while waiting to fetch page {}", request.page());
                    return Ok(());
                }
                _ = self.rate_limiter.admit() => {}
            }

            let fetched = tokio::select! {
                biased;
                _ = cancellation.cancelled() => {
                    info!("Worker #{id} cancelled while fetching page {}", request.page());
                    return Ok(());
                }
                fetched = self.fetcher.fetch(&request) => fetched,
            };
            let response = match fetched {
                Ok(response) => response,
                Err(e) => {
                    let e = e.context(format!(
                        "Failed to fetch page {} of {}",
                        request.page(),
                        request.repository()
                    ));
                    return self.fail(e, &cancellation);
                }
            };

            for issue in response.into_issues() {
                let sent = tokio::select! {
                    biased;
                    _ = cancellation.cancelled() => {
                        info!("Worker #{id} cancelled while delivering page {}", request.page());
                        return Ok(());
                    }
                    sent = sink.send(issue) => sent,
                };
                if sent.is_err() {
                    let e = anyhow!(
                        "Failed to deliver page {} of {}: issue sink closed",
                        request.page(),
                        request.repository()
                    );
                    return self.fail(e, &cancellation);
                }
            }
        }
    }
}

/// A pool of workers sharing one page queue, one issue sink and one fetch rate limiter.
pub struct WorkerPool {
    fetcher: Arc<dyn IssueFetcher>,
    worker_count: usize,
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl WorkerPool {
    /// Creates a new `WorkerPool` instance with the given fetcher, number of workers and
    /// fetch rate limiter.
    pub fn new(
        fetcher: Arc<dyn IssueFetcher>,
        worker_count: usize,
        rate_limiter: Arc<DispatchRateLimiter>,
    ) -> Self {
        Self {
            fetcher,
            worker_count,
            rate_limiter,
        }
    }

    /// Runs the workers until they all exited.
    ///
    /// Returns the first fatal error, if any.
    pub async fn run(
        &self,
        pages: mpsc::Receiver<PageRequest>,
        sink: mpsc::Sender<Issue>,
        cancellation: Cancellation,
    ) -> StdResult<()> {
        let pages: PageQueue = Arc::new(Mutex::new(pages));
        let mut handles = Vec::new();
        for id in 0..self.worker_count {
            let worker = IssueWorker::new(
                id,
                Arc::clone(&self.fetcher),
                Arc::clone(&self.rate_limiter),
            );
            let pages_clone = Arc::clone(&pages);
            let sink_clone = sink.clone();
            let cancellation_clone = cancellation.clone();
            let handle = tokio::spawn(async move {
                worker
                    .run(pages_clone, sink_clone, cancellation_clone)
                    .await
            });
            handles.push(handle);
        }
        drop(sink);
        info!("Started {} workers", handles.len());

        let mut outcome = Ok(());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    cancellation.cancel();
                    Err(anyhow!(e).context("Worker task failed"))
                }
            };
            if let Err(e) = result {
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }

        outcome
    }
}

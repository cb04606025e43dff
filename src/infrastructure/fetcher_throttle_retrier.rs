use std::{sync::Arc, time::Duration};

use log::warn;
use rand::Rng;
use tokio::time::sleep;

use crate::{FetcherError, IssueFetcher, PageRequest, PageResponse, StdResult};

/// A struct that retries an IssueFetcher for as long as the API throttles it, with a randomized delay.
///
/// There is no retry ceiling: a batch fetch favors completeness over latency.
/// Any other error is returned as is.
pub struct ThrottleRetrier {
    /// The fetcher to be retried.
    fetcher: Arc<dyn IssueFetcher>,

    /// The minimum delay before retrying a throttled request.
    min_throttle_delay: Duration,

    /// The upper bound of the random delay added to the minimum delay.
    throttle_jitter: Duration,
}

impl ThrottleRetrier {
    /// Creates a new `ThrottleRetrier` instance with the given delays.
    pub fn new(
        fetcher: Arc<dyn IssueFetcher>,
        min_throttle_delay: Duration,
        throttle_jitter: Duration,
    ) -> Self {
        Self {
            fetcher,
            min_throttle_delay,
            throttle_jitter,
        }
    }

    fn calculate_throttle_delay(&self) -> Duration {
        let jitter_millis = u64::try_from(self.throttle_jitter.as_millis()).unwrap_or(u64::MAX);

        self.min_throttle_delay
            .saturating_add(Duration::from_millis(rand::rng().random_range(0..=jitter_millis)))
    }
}

#[async_trait::async_trait]
impl IssueFetcher for ThrottleRetrier {
    /// Retries the request while it is throttled.
    async fn fetch(&self, request: &PageRequest) -> StdResult<PageResponse> {
        let mut attempts: u32 = 0;

        loop {
            match self.fetcher.fetch(request).await {
                Err(e) if FetcherError::is_throttled(&e) => {
                    attempts = attempts.saturating_add(1);
                    let delay = self.calculate_throttle_delay();
                    warn!("Throttled attempt #{attempts} for {request}, delaying for {delay:?}");
                    sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use tokio::time::Instant;

    use crate::{ApiRateLimit, Issue, MockIssueFetcher};

    use super::*;

    fn page_response() -> PageResponse {
        PageResponse::new(
            vec![
                Issue::new(3001, 201, "open", "issue-201", "org/repo"),
                Issue::new(3002, 202, "closed", "issue-202", "org/repo"),
            ],
            5,
            ApiRateLimit::dummy(),
        )
    }

    fn throttled(page: u32) -> anyhow::Error {
        FetcherError::Throttled { page, status: 403 }.into()
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_success_on_first_attempt() {
        let start = Instant::now();
        let fetcher = {
            let mut fetcher = MockIssueFetcher::new();
            fetcher
                .expect_fetch()
                .returning(|_| Ok(page_response()))
                .times(1);

            fetcher
        };
        let retrier = ThrottleRetrier::new(
            Arc::new(fetcher),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        let response = retrier.fetch(&PageRequest::dummy(3)).await.unwrap();

        assert_eq!(page_response(), response);
        assert_eq!(Duration::ZERO, start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_success_after_throttling_yields_same_issues() {
        let start = Instant::now();
        let fetcher = {
            let mut fetcher = MockIssueFetcher::new();
            fetcher
                .expect_fetch()
                .returning(|request| Err(throttled(request.page())))
                .times(2);
            fetcher
                .expect_fetch()
                .returning(|_| Ok(page_response()))
                .times(1);

            fetcher
        };
        let retrier = ThrottleRetrier::new(
            Arc::new(fetcher),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        let response = retrier.fetch(&PageRequest::dummy(3)).await.unwrap();

        assert_eq!(page_response(), response);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60), "elapsed: {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(120), "elapsed: {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_without_jitter_waits_exactly_min_delay() {
        let start = Instant::now();
        let fetcher = {
            let mut fetcher = MockIssueFetcher::new();
            fetcher
                .expect_fetch()
                .returning(|request| Err(throttled(request.page())))
                .times(3);
            fetcher
                .expect_fetch()
                .returning(|_| Ok(page_response()))
                .times(1);

            fetcher
        };
        let retrier =
            ThrottleRetrier::new(Arc::new(fetcher), Duration::from_secs(30), Duration::ZERO);

        retrier.fetch(&PageRequest::dummy(3)).await.unwrap();

        assert_eq!(Duration::from_secs(90), start.elapsed());
    }

    #[test]
    fn throttle_delay_saturates_at_max_duration() {
        let retrier = ThrottleRetrier::new(
            Arc::new(MockIssueFetcher::new()),
            Duration::MAX,
            Duration::from_secs(30),
        );

        assert_eq!(Duration::MAX, retrier.calculate_throttle_delay());
    }

    #[test]
    fn throttle_delay_with_max_jitter_stays_above_min_delay() {
        let retrier = ThrottleRetrier::new(
            Arc::new(MockIssueFetcher::new()),
            Duration::from_secs(30),
            Duration::MAX,
        );

        assert!(retrier.calculate_throttle_delay() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_fails_immediately_on_other_errors() {
        let start = Instant::now();
        let fetcher = {
            let mut fetcher = MockIssueFetcher::new();
            fetcher
                .expect_fetch()
                .returning(|_| Err(anyhow!("Connection reset by peer")))
                .times(1);

            fetcher
        };
        let retrier = ThrottleRetrier::new(
            Arc::new(fetcher),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        retrier
            .fetch(&PageRequest::dummy(3))
            .await
            .expect_err("Non throttling errors should not be retried");
        assert_eq!(Duration::ZERO, start.elapsed());
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_fails_when_decode_error_follows_throttling() {
        let fetcher = {
            let mut fetcher = MockIssueFetcher::new();
            fetcher
                .expect_fetch()
                .returning(|request| Err(throttled(request.page())))
                .times(1);
            fetcher
                .expect_fetch()
                .returning(|request| {
                    Err(FetcherError::Decode {
                        page: request.page(),
                        message: "missing field `number`".to_string(),
                    }
                    .into())
                })
                .times(1);

            fetcher
        };
        let retrier = ThrottleRetrier::new(
            Arc::new(fetcher),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        let error = retrier.fetch(&PageRequest::dummy(3)).await.unwrap_err();

        assert!(matches!(
            error.downcast_ref::<FetcherError>(),
            Some(FetcherError::Decode { page: 3, .. })
        ));
    }
}

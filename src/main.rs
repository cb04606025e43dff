use std::{sync::Arc, time::Duration};

use clap::Parser;
use log::{debug, info};

use issue_crawler::{
    FetchConfig, GITHUB_API_ENDPOINT, IssueCrawler, ParallelIssueCrawler, RestIssueFetcher,
    StdResult, ThrottleRetrier,
};

/// Command line arguments for the GitHub issue crawler
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Repository to crawl the issues of, in the `org/name` form
    repository: String,

    /// GitHub API token
    #[arg(long, env = "GITHUB_API_TOKEN", hide_env_values = true)]
    github_api_token: String,

    /// GitHub REST API endpoint
    #[arg(long, default_value = GITHUB_API_ENDPOINT)]
    api_endpoint: String,

    /// Number of workers fetching pages concurrently
    #[arg(short, long, default_value_t = 3)]
    worker_count: usize,

    /// Minimum delay between two page dispatches, in milliseconds
    #[arg(long, default_value_t = 333)]
    dispatch_interval_ms: u64,

    /// Minimum delay before retrying a throttled call, in seconds
    #[arg(long, default_value_t = 30)]
    min_throttle_delay_secs: u64,

    /// Upper bound of the random delay added to the throttle delay, in seconds
    #[arg(long, default_value_t = 30)]
    throttle_jitter_secs: u64,

    /// Timeout of each API call, in seconds (no timeout if omitted)
    #[arg(long)]
    request_timeout_secs: Option<u64>,
}

impl Args {
    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            worker_count: self.worker_count,
            dispatch_interval: Duration::from_millis(self.dispatch_interval_ms),
            min_throttle_delay: Duration::from_secs(self.min_throttle_delay_secs),
            throttle_jitter: Duration::from_secs(self.throttle_jitter_secs),
        }
    }
}

#[tokio::main]
async fn main() -> StdResult<()> {
    env_logger::init();
    info!("Starting GitHub issue crawling");
    let args = Args::parse();
    let config = args.fetch_config();
    debug!("Fetch configuration: {config:?}");

    let crawler = build_parallel_crawler(&args, config)?;
    let issues = crawler.crawl(&args.repository).await?;
    info!("Crawling completed: {} issues", issues.len());

    println!("{}", serde_json::to_string_pretty(&issues)?);

    Ok(())
}

fn build_parallel_crawler(args: &Args, config: FetchConfig) -> StdResult<Arc<dyn IssueCrawler>> {
    let fetcher = Arc::new(ThrottleRetrier::new(
        Arc::new(RestIssueFetcher::try_new(
            &args.api_endpoint,
            &args.github_api_token,
            args.request_timeout_secs.map(Duration::from_secs),
        )?),
        config.min_throttle_delay,
        config.throttle_jitter,
    ));

    Ok(Arc::new(ParallelIssueCrawler::new(fetcher, config)))
}

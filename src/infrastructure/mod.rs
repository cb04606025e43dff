mod cancellation;
mod crawler_parallel;
mod crawler_worker;
mod dispatch_rate_limiter;
mod fetcher_rest;
mod fetcher_throttle_retrier;

pub use cancellation::*;
pub use crawler_parallel::*;
pub use crawler_worker::*;
pub use dispatch_rate_limiter::*;
pub use fetcher_rest::*;
pub use fetcher_throttle_retrier::*;

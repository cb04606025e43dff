//! Concurrent retrieval of every issue of a GitHub repository.
//!
//! The first page is fetched alone to learn the page count, the remaining pages are
//! dispatched at a bounded rate to a pool of workers, and throttled calls are retried
//! after a randomized delay. A crawl returns either every issue or an error.

mod infrastructure;
mod interface;
mod model;

pub use infrastructure::*;
pub use interface::*;
pub use model::*;

mod crawler;
mod fetcher;

pub use crawler::*;
pub use fetcher::*;

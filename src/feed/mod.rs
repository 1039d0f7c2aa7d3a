pub mod fetcher;
pub mod traits;

pub use fetcher::HttpFeed;
pub use traits::PriceFeed;

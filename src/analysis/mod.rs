// Analysis module: AI market commentary behind a disk cache.

pub mod cache;
pub mod generator;
pub mod perplexity;
pub mod prompt;

pub use cache::AnalysisCache;
pub use generator::TextGenerator;
pub use perplexity::PerplexityClient;

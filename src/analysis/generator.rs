use crate::model::{Generation, GenerationError};

/// External text generation service used on analysis cache misses.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name stored alongside cached entries, e.g. `perplexity`.
    fn provider(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError>;
}

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Context lookup timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Retrieval-augmented lookup of reference text for a student message.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<String, ContextError>;
}

/// Provider used when no retrieval index is configured.
pub struct NoContext;

#[async_trait]
impl ContextProvider for NoContext {
    async fn lookup(&self, _query: &str) -> Result<String, ContextError> {
        Ok(String::new())
    }
}

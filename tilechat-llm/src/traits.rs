use async_trait::async_trait;
use tilechat_common::{ChatMessage, Result};

/// Sends one user message to a model and returns the reply text.
///
/// Implementations are stateless with respect to the conversation: each call
/// carries only the message it is given.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, message: &ChatMessage) -> Result<String>;

    /// Get the model name being used
    fn model_name(&self) -> &str;
}

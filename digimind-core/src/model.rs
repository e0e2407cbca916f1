//! Generation capability trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::GenerationRequest;

/// A hosted text-generation endpoint.
///
/// Implementations perform exactly one attempt per call and honour
/// [`GenerationRequest::timeout`]. Retrying is the caller's business
/// (see [`RetryPolicy`](crate::RetryPolicy)).
///
/// # Example
///
/// ```rust,ignore
/// use digimind_core::{ChatModel, GenerationRequest, Message};
///
/// let text = model.generate(GenerationRequest::new("llama3-70b-8192", vec![Message::user("hi")])).await?;
/// ```
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &str;

    /// Send the request and return the generated text.
    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}

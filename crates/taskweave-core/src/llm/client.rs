//! CompletionClient trait definition.
//!
//! The boundary between engine steps and model providers. Concrete HTTP
//! clients live outside this workspace; the engine only needs `complete`
//! and an orderly `close`.

use taskweave_types::llm::{ClientError, CompletionRequest, CompletionResponse};

/// Trait for completion backends.
///
/// Uses native async fn in traits (RPITIT). For runtime selection wrap an
/// implementation in [`BoxCompletionClient`](super::box_client::BoxCompletionClient).
pub trait CompletionClient: Send + Sync {
    /// Human-readable client name (e.g. "anthropic", "mock").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, ClientError>> + Send;

    /// Release any held resources. Requests after `close` should fail with
    /// [`ClientError::Closed`].
    fn close(&self) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

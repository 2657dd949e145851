//! BoxCompletionClient -- object-safe dynamic dispatch wrapper for CompletionClient.
//!
//! Same shape as `BoxAction`:
//! 1. An object-safe `CompletionClientDyn` trait with boxed futures
//! 2. A blanket impl of `CompletionClientDyn` for all `T: CompletionClient`
//! 3. `BoxCompletionClient` wraps `Arc<dyn CompletionClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use taskweave_types::llm::{ClientError, CompletionRequest, CompletionResponse};

use super::client::CompletionClient;

/// Object-safe version of [`CompletionClient`] with boxed futures.
pub trait CompletionClientDyn: Send + Sync {
    fn client_name(&self) -> &str;

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, ClientError>> + Send + 'a>>;

    fn close_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>>;
}

impl<T: CompletionClient> CompletionClientDyn for T {
    fn client_name(&self) -> &str {
        CompletionClient::name(self)
    }

    fn complete_boxed<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, ClientError>> + Send + 'a>> {
        Box::pin(self.complete(request))
    }

    fn close_boxed(&self) -> Pin<Box<dyn Future<Output = Result<(), ClientError>> + Send + '_>> {
        Box::pin(self.close())
    }
}

/// Type-erased completion client, cheap to clone.
#[derive(Clone)]
pub struct BoxCompletionClient {
    inner: Arc<dyn CompletionClientDyn>,
}

impl BoxCompletionClient {
    pub fn new<T: CompletionClient + 'static>(client: T) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.client_name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ClientError> {
        self.inner.complete_boxed(request).await
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.inner.close_boxed().await
    }
}

impl std::fmt::Debug for BoxCompletionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxCompletionClient")
            .field("name", &self.name())
            .finish()
    }
}

//! Tower integration.
//!
//! [`DispatchService`] exposes a shared [`Dispatcher`] as a
//! `tower::Service<BoxedDriver>`, so transport code can stack ordinary tower
//! layers around a dispatch:
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tower::{ServiceBuilder, ServiceExt};
//! use tower::timeout::TimeoutLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(TimeoutLayer::new(Duration::from_secs(5)))
//!     .service(DispatchService::new(dispatcher));
//!
//! let outcome = service.oneshot(driver).await?;
//! ```
//!
//! A timeout drops the in-flight dispatch. Conversation writes that already
//! happened are kept.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;

use parley_core::BoxedDriver;

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::DispatchError;

/// A cheaply cloneable service wrapping `Arc<Dispatcher>`.
#[derive(Debug, Clone)]
pub struct DispatchService {
    dispatcher: Arc<Dispatcher>,
}

impl DispatchService {
    pub fn new(dispatcher: impl Into<Arc<Dispatcher>>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
        }
    }

    /// Returns the wrapped dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Service<BoxedDriver> for DispatchService {
    type Response = DispatchOutcome;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<DispatchOutcome, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, driver: BoxedDriver) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move { dispatcher.listen(driver).await })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parley_core::MemoryStore;
    use tower::timeout::TimeoutLayer;
    use tower::{ServiceBuilder, ServiceExt};

    use super::*;
    use crate::context::Context as DispatchContext;
    use crate::testing::MockDriver;

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
        dispatcher
            .hears("quick", |_ctx: Arc<DispatchContext>| async { "fast" })
            .hears("slow", |_ctx: Arc<DispatchContext>| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "too late"
            });
        dispatcher
    }

    #[test]
    fn test_always_ready() {
        let mut service = DispatchService::new(dispatcher());
        let mut ready = tokio_test::task::spawn(ServiceExt::<BoxedDriver>::ready(&mut service));
        tokio_test::assert_ready_ok!(ready.poll());
    }

    #[tokio::test]
    async fn test_oneshot_dispatch() {
        let driver = MockDriver::new("quick", "u1");
        let request: BoxedDriver = driver.clone();
        let outcome = DispatchService::new(dispatcher())
            .oneshot(request)
            .await
            .unwrap();
        assert!(outcome.is_handled());
        assert_eq!(driver.sent(), vec!["fast"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_layer_cancels_dispatch() {
        let service = ServiceBuilder::new()
            .layer(TimeoutLayer::new(Duration::from_millis(100)))
            .service(DispatchService::new(dispatcher()));

        let driver = MockDriver::new("slow", "u1");
        let request: BoxedDriver = driver.clone();
        let err = service.oneshot(request).await.unwrap_err();
        assert!(err.is::<tower::timeout::error::Elapsed>());
        assert!(driver.sent().is_empty());
    }
}

//! Per-request dispatch.
//!
//! # Lifecycle
//! ```text
//! factory(request) → context
//!     → handler(context.clone())      (panics caught)
//!     → context.finalize(failure)     (exactly once)
//! ```
//!
//! # Design Decisions
//! - Finalization is owned by a drop guard, so a request dropped
//!   mid-handler still finalizes (with `HandlerFailure::Cancelled`)
//! - A panicking handler is contained here; it never takes the
//!   admission permit or the connection down with it

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{future::BoxFuture, FutureExt};
use tracing::Instrument;

use crate::http::context::{Context, ContextFactory, HandlerFailure};
use crate::observability::metrics;

/// A registered handler, erased over its future type.
pub type HandlerFn<C> = Arc<dyn Fn(C) -> BoxFuture<'static, ()> + Send + Sync>;

/// Erase a user handler into a [`HandlerFn`].
pub fn handler_fn<C, F, Fut>(handler: F) -> HandlerFn<C>
where
    C: Context,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx| handler(ctx).boxed())
}

/// Finalizes the context when dropped, unless `finish` already did.
struct FinalizeGuard<C: Context> {
    ctx: Option<C>,
}

impl<C: Context> FinalizeGuard<C> {
    fn new(ctx: C) -> Self {
        Self { ctx: Some(ctx) }
    }

    fn finish(mut self, failure: Option<HandlerFailure>) -> Response {
        match self.ctx.take() {
            Some(ctx) => ctx.finalize(failure),
            None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<C: Context> Drop for FinalizeGuard<C> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            drop(ctx.finalize(Some(HandlerFailure::Cancelled)));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one request through construct → invoke → finalize.
pub async fn dispatch<C: Context>(
    factory: &ContextFactory<C>,
    handler: &HandlerFn<C>,
    request: Request<Body>,
) -> Response {
    let ctx = factory(request);
    let guard = FinalizeGuard::new(ctx.clone());

    let outcome = AssertUnwindSafe(async move { handler(ctx).await })
        .catch_unwind()
        .await;
    let failure = outcome
        .err()
        .map(|payload| HandlerFailure::Panicked(panic_message(payload.as_ref())));

    guard.finish(failure)
}

/// Dispatch with a per-route span and request metrics.
pub async fn dispatch_route<C: Context>(
    route: Arc<str>,
    factory: ContextFactory<C>,
    handler: HandlerFn<C>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let span = tracing::debug_span!("dispatch", route = %route, method = %method);

    let response = dispatch(&factory, &handler, request).instrument(span).await;
    metrics::record_request(&method, response.status().as_u16(), &route, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every finalize call.
    #[derive(Clone)]
    struct Probe {
        log: Arc<Mutex<Vec<&'static str>>>,
        finalized: Arc<Mutex<Vec<Option<HandlerFailure>>>>,
    }

    impl Context for Probe {
        fn finalize(self, failure: Option<HandlerFailure>) -> Response {
            self.log.lock().unwrap().push("finalize");
            self.finalized.lock().unwrap().push(failure);
            StatusCode::NO_CONTENT.into_response()
        }
    }

    fn probe() -> (Probe, ContextFactory<Probe>) {
        let probe = Probe {
            log: Arc::default(),
            finalized: Arc::default(),
        };
        let built = probe.clone();
        let factory: ContextFactory<Probe> = Arc::new(move |_req| {
            built.log.lock().unwrap().push("construct");
            built.clone()
        });
        (probe, factory)
    }

    fn request() -> Request<Body> {
        Request::get("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn construct_invoke_finalize_in_order() {
        let (probe, factory) = probe();
        let handler = handler_fn(|ctx: Probe| async move {
            ctx.log.lock().unwrap().push("invoke");
        });

        let response = dispatch(&factory, &handler, request()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(*probe.log.lock().unwrap(), vec!["construct", "invoke", "finalize"]);
        assert_eq!(*probe.finalized.lock().unwrap(), vec![None]);
    }

    #[tokio::test]
    async fn finalize_runs_once_after_panic() {
        let (probe, factory) = probe();
        let handler = handler_fn(|_ctx: Probe| async move {
            panic!("boom");
        });

        dispatch(&factory, &handler, request()).await;
        assert_eq!(
            *probe.finalized.lock().unwrap(),
            vec![Some(HandlerFailure::Panicked("boom".into()))]
        );
    }

    #[tokio::test]
    async fn finalize_runs_once_when_request_is_dropped() {
        let (probe, factory) = probe();
        let started = Arc::new(AtomicUsize::new(0));
        let seen = started.clone();
        let handler = handler_fn(move |_ctx: Probe| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });

        let res = tokio::time::timeout(
            Duration::from_millis(20),
            dispatch(&factory, &handler, request()),
        )
        .await;
        assert!(res.is_err());
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(
            *probe.finalized.lock().unwrap(),
            vec![Some(HandlerFailure::Cancelled)]
        );
    }

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}

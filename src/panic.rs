//! Containment of panics raised by application callbacks.
//!
//! A panicking handler must not take the connection task down with it. The
//! panic is caught, logged and reported to the peer like any other handler
//! failure.

use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;

/// Render a panic payload as text.
///
/// ```
/// use qws::panic::describe;
///
/// assert_eq!(describe(&"boom"), "boom");
/// assert_eq!(describe(&String::from("boom")), "boom");
/// assert_eq!(describe(&5_u32), "non-string panic payload");
/// ```
#[must_use]
pub fn describe(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Await `future`, converting a panic into `Err` with its description.
pub(crate) async fn contain<F: Future>(future: F) -> Result<F::Output, String> {
    AssertUnwindSafe(future).catch_unwind().await.map_err(report)
}

/// Call `handler` and await the future it returns, containing a panic from
/// either step.
pub(crate) async fn contain_call<F, Fut>(handler: F) -> Result<Fut::Output, String>
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let future = std::panic::catch_unwind(AssertUnwindSafe(handler)).map_err(report)?;
    contain(future).await
}

fn report(payload: Box<dyn Any + Send>) -> String {
    let message = describe(&*payload);
    tracing::error!(panic = %message, "handler panicked");
    crate::metrics::inc_errors();
    format!("handler panicked: {message}")
}

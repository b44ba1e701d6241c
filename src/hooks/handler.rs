//! Handler type and isolated fan-out.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use super::event::HookEvent;

/// Callback invoked for every dispatched event.
///
/// Handlers run on a blocking-pool thread, outside the handler lock, so they
/// may call back into the watcher (register handlers, stop it). A slow
/// handler delays later events of the same session but never stalls the
/// async runtime.
pub type EventHandler = Arc<dyn Fn(&HookEvent) + Send + Sync>;

/// Invoke every handler with `event`, in registration order.
///
/// A panicking handler is logged and skipped; the remaining handlers still
/// receive the event. Returns how many handlers completed normally.
pub(crate) fn dispatch(handlers: &[EventHandler], event: &HookEvent) -> usize {
    let mut delivered = 0;
    for (index, handler) in handlers.iter().enumerate() {
        match catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(()) => delivered += 1,
            Err(payload) => {
                tracing::warn!(
                    "[dispatch] handler #{index} panicked on {} event: {}",
                    event.kind,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
    delivered
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

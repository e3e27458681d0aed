//! Per-request ambient state (§4.3).
//!
//! A `RequestContext` is created by the dispatcher before middleware runs and
//! destroyed after middleware post-processing completes, regardless of
//! whether a response was produced or an error propagated. It owns the slot
//! storage for request-scoped components and the cleanup callback list.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::definition::Instance;

/// A stable, process-unique identifier for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

static NEXT_REQUEST_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// Per-request ambient storage owning request-scoped instances and cleanup
/// callbacks (§4.3).
pub struct RequestContext {
    request_id: RequestId,
    metadata: Mutex<HashMap<String, String>>,
    slots: DashMap<String, Instance, ahash::RandomState>,
    cleanups: Mutex<Vec<Cleanup>>,
}

impl RequestContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            request_id: RequestId::next(),
            metadata: Mutex::new(HashMap::new()),
            slots: DashMap::with_hasher(ahash::RandomState::new()),
            cleanups: Mutex::new(Vec::new()),
        })
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.lock().unwrap().insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.metadata.lock().unwrap().get(key).cloned()
    }

    /// Register a callback to run when the context ends. Cleanups run in
    /// reverse insertion order; a panic/error in one does not prevent the
    /// rest from running.
    pub fn add_cleanup<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cleanups.lock().unwrap().push(Box::new(callback));
    }

    /// Look up (or insert, via `make`) the request-scoped slot for `name`.
    pub(crate) fn get_or_insert_slot<F>(&self, name: &str, make: F) -> crate::error::Result<Instance>
    where
        F: FnOnce() -> crate::error::Result<Instance>,
    {
        if let Some(existing) = self.slots.get(name) {
            return Ok(existing.clone());
        }
        let instance = make()?;
        self.slots.insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Run all cleanups in reverse order and clear the slot map. Logged
    /// failures never stop subsequent cleanups.
    pub fn finish(&self) {
        let callbacks: Vec<Cleanup> = {
            let mut guard = self.cleanups.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for callback in callbacks.into_iter().rev() {
            #[cfg(feature = "logging")]
            {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback));
                if result.is_err() {
                    tracing::warn!(target: "armature_core::request", "cleanup callback panicked");
                }
            }
            #[cfg(not(feature = "logging"))]
            {
                let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback));
            }
        }
        self.slots.clear();
    }
}

thread_local! {
    static CURRENT_REQUEST: RefCell<Option<Arc<RequestContext>>> = const { RefCell::new(None) };
}

/// Run `f` with `ctx` installed as the active request scope for the current
/// thread. Nested calls are not supported: the dispatcher establishes the
/// scope once per request and runs middleware/handler entirely within it.
///
/// Implementations that move a request across executor threads (work-stealing
/// async runtimes) must re-enter this scope after a resume point; the `async`
/// feature's dispatcher integration does so around every `.await` boundary it
/// owns.
pub fn with_request_scope<R>(ctx: Arc<RequestContext>, f: impl FnOnce() -> R) -> R {
    CURRENT_REQUEST.with(|slot| *slot.borrow_mut() = Some(ctx));
    let result = f();
    CURRENT_REQUEST.with(|slot| *slot.borrow_mut() = None);
    result
}

/// The currently active request scope on this thread, if any.
pub fn current_request_scope() -> Option<Arc<RequestContext>> {
    CURRENT_REQUEST.with(|slot| slot.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn cleanups_run_in_reverse_order() {
        let ctx = RequestContext::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        ctx.add_cleanup(move || o1.lock().unwrap().push(1));
        let o2 = order.clone();
        ctx.add_cleanup(move || o2.lock().unwrap().push(2));
        ctx.finish();
        assert_eq!(*order.lock().unwrap(), vec![2, 1]);
    }

    #[test]
    fn slot_constructed_once() {
        static CALLS: AtomicU32 = AtomicU32::new(0);
        let ctx = RequestContext::new();
        let make = || {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(42i32) as Instance)
        };
        let _ = ctx.get_or_insert_slot("bag", make).unwrap();
        let _ = ctx.get_or_insert_slot("bag", make).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_active_scope_by_default() {
        assert!(current_request_scope().is_none());
    }

    #[test]
    fn request_scope_is_installed_for_closure() {
        let ctx = RequestContext::new();
        let id = ctx.request_id();
        let observed = with_request_scope(ctx, || current_request_scope().map(|c| c.request_id()));
        assert_eq!(observed, Some(id));
        assert!(current_request_scope().is_none());
    }
}

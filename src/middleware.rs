//! The priority-ordered onion of cross-cutting concerns around handler
//! execution (§4.4).

use std::sync::Arc;

use crate::response::Response;
use crate::transport::NormalizedRequest;

/// A single middleware: given a request and a `call_next` continuation,
/// return a response. May mutate the request before calling `next`, skip
/// calling it to short-circuit, or mutate the response `next` returns.
pub trait Middleware: Send + Sync {
    /// Lower priority runs its pre-phase first and its post-phase last
    /// (classic onion, §4.4).
    fn priority(&self) -> i32;

    fn name(&self) -> &'static str {
        "middleware"
    }

    fn handle(&self, req: &mut NormalizedRequest, next: Next<'_>) -> Response;
}

/// The remaining chain of middleware plus the terminal continuation
/// (ultimately the handler invocation). Constructed inside-out: the
/// innermost continuation is the handler; each middleware wraps the next.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Fn(&mut NormalizedRequest) -> Response,
}

impl<'a> Next<'a> {
    pub fn call(self, req: &mut NormalizedRequest) -> Response {
        match self.chain.split_first() {
            Some((mw, rest)) => mw.handle(req, Next { chain: rest, terminal: self.terminal }),
            None => (self.terminal)(req),
        }
    }
}

/// Registered middleware sorted once at `refresh` (§4.4); runtime
/// reordering is not supported, matching the router's frozen-after-refresh
/// policy.
#[derive(Default)]
pub struct MiddlewarePipeline {
    registered: Vec<Arc<dyn Middleware>>,
    finalized: bool,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, middleware: Arc<dyn Middleware>) {
        assert!(!self.finalized, "middleware registered after refresh");
        self.registered.push(middleware);
    }

    /// Resolve priority ordering once, at `refresh`. A stable sort preserves
    /// registration order among ties (§4.4, §8).
    pub fn finalize(&mut self) {
        self.registered.sort_by_key(|m| m.priority());
        self.finalized = true;
    }

    pub fn run(&self, req: &mut NormalizedRequest, terminal: &dyn Fn(&mut NormalizedRequest) -> Response) -> Response {
        Next { chain: &self.registered, terminal }.call(req)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

//! WebSocket connection abstraction (§6, feature `websocket`).
//!
//! A WebSocket connection is modeled as a Request Context whose lifetime
//! spans the whole connection rather than a single request/response: the
//! scope is established in `on_open` and torn down in `on_close`, so
//! connection-scoped components resolve exactly once and see the same
//! cleanup ordering guarantees as an HTTP request (§4.3).

use std::sync::Arc;

use crate::request::RequestContext;

/// A single inbound WebSocket frame, already demultiplexed into text or
/// binary by the transport adapter.
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Why a connection closed: either the peer's declared code/reason, or no
/// close frame was ever received (e.g. the transport dropped).
#[derive(Debug, Clone)]
pub struct CloseReason {
    pub code: Option<u16>,
    pub reason: Option<String>,
}

/// Implemented by an application to react to the three points in a
/// WebSocket connection's life: open, message, close (§6). The transport
/// adapter owns the socket and calls these; the handler owns the
/// connection-scoped `RequestContext`.
pub trait ConnectionHandler: Send + Sync {
    /// Called once the connection is accepted, with a fresh scope bound to
    /// the connection's lifetime rather than a single request.
    fn on_open(&self, ctx: &Arc<RequestContext>) -> crate::error::Result<()> {
        let _ = ctx;
        Ok(())
    }

    fn on_message(&self, ctx: &Arc<RequestContext>, frame: Frame) -> crate::error::Result<()>;

    /// Called once, after which `ctx.finish()` runs connection-scoped
    /// cleanups in reverse registration order (§4.3).
    fn on_close(&self, ctx: &Arc<RequestContext>, reason: CloseReason) -> crate::error::Result<()> {
        let _ = (ctx, reason);
        Ok(())
    }
}

/// Drives one connection's lifecycle against a handler, owning the
/// connection-scoped `RequestContext` (§4.3, §6).
pub struct Connection<H: ConnectionHandler> {
    ctx: Arc<RequestContext>,
    handler: H,
}

impl<H: ConnectionHandler> Connection<H> {
    pub fn open(handler: H) -> crate::error::Result<Self> {
        let ctx = RequestContext::new();
        handler.on_open(&ctx)?;
        Ok(Self { ctx, handler })
    }

    pub fn message(&self, frame: Frame) -> crate::error::Result<()> {
        self.handler.on_message(&self.ctx, frame)
    }

    /// Ends the connection scope. Always runs cleanups, even if `on_close`
    /// itself errors (§4.3's teardown guarantee, extended to connections).
    pub fn close(self, reason: CloseReason) -> crate::error::Result<()> {
        let result = self.handler.on_close(&self.ctx, reason);
        self.ctx.finish();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Echo {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionHandler for Echo {
        fn on_open(&self, ctx: &Arc<RequestContext>) -> crate::error::Result<()> {
            self.log.lock().unwrap().push(format!("open:{}", ctx.request_id()));
            Ok(())
        }

        fn on_message(&self, _ctx: &Arc<RequestContext>, frame: Frame) -> crate::error::Result<()> {
            match frame {
                Frame::Text(t) => self.log.lock().unwrap().push(format!("text:{t}")),
                Frame::Binary(b) => self.log.lock().unwrap().push(format!("binary:{}", b.len())),
            }
            Ok(())
        }

        fn on_close(&self, _ctx: &Arc<RequestContext>, reason: CloseReason) -> crate::error::Result<()> {
            self.log.lock().unwrap().push(format!("close:{:?}", reason.code));
            Ok(())
        }
    }

    #[test]
    fn connection_runs_open_message_close_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let conn = Connection::open(Echo { log: log.clone() }).unwrap();
        conn.message(Frame::Text("hi".into())).unwrap();
        conn.close(CloseReason { code: Some(1000), reason: None }).unwrap();

        let entries = log.lock().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].starts_with("open:"));
        assert_eq!(entries[1], "text:hi");
        assert_eq!(entries[2], "close:Some(1000)");
    }

    #[test]
    fn close_runs_cleanups_registered_during_the_connection() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let conn = Connection::open(Echo { log: log.clone() }).unwrap();
        let cleanup_log = log.clone();
        conn.ctx.add_cleanup(move || cleanup_log.lock().unwrap().push("cleanup".into()));
        conn.close(CloseReason { code: None, reason: None }).unwrap();
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("cleanup"));
    }
}

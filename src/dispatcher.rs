//! Turns a normalized request into an invocation and a response (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::container::Container;
use crate::error::{CoreError, DispatchError, InputError};
use crate::middleware::MiddlewarePipeline;
use crate::params::codec::CodecRegistry;
use crate::params::model::ModelHandlerRegistry;
use crate::params::{ParameterDeclaration, ParameterResolver, ResolvedValue};
use crate::request::{with_request_scope, RequestContext};
use crate::response::{Body, Response};
use crate::router::{MatchOutcome, RouteEntry, Router};
use crate::transport::NormalizedRequest;

/// What a handler hands back before dispatcher normalization (§4.6): a
/// `Response` passes through untouched, everything else is mapped to one.
pub enum HandlerOutcome {
    Response(Response),
    /// A serializable record, mapped to `json(record)`.
    Record(Value),
    Text(String),
    /// Mapped to `no_content()`.
    None,
    Bytes(Vec<u8>, Option<String>),
}

pub type HandlerFn = Arc<
    dyn Fn(&Container, &Arc<RequestContext>, &HashMap<String, ResolvedValue>) -> crate::error::Result<HandlerOutcome>
        + Send
        + Sync,
>;

struct HandlerEntry {
    declarations: Vec<ParameterDeclaration>,
    handler: HandlerFn,
}

/// Ties the container, router, middleware pipeline, and parameter resolver
/// together into one request-handling entry point (§4.6).
pub struct Dispatcher {
    container: Container,
    router: Router,
    middleware: MiddlewarePipeline,
    codecs: CodecRegistry,
    models: ModelHandlerRegistry,
    handlers: HashMap<String, HandlerEntry>,
    config: RuntimeConfig,
}

impl Dispatcher {
    pub fn new(container: Container, config: RuntimeConfig) -> Self {
        let router = Router::new(config.route_case_sensitive, config.route_trailing_slash);
        Self {
            container,
            router,
            middleware: MiddlewarePipeline::new(),
            codecs: CodecRegistry::new(),
            models: ModelHandlerRegistry::new(),
            handlers: HashMap::new(),
            config,
        }
    }

    pub fn codecs_mut(&mut self) -> &mut CodecRegistry {
        &mut self.codecs
    }

    pub fn models_mut(&mut self) -> &mut ModelHandlerRegistry {
        &mut self.models
    }

    pub fn register_middleware(&mut self, middleware: Arc<dyn crate::middleware::Middleware>) {
        self.middleware.register(middleware);
    }

    /// Register one route plus its handler. Fails with `AmbiguousRoute` per
    /// the router's registration rules (§4.6).
    pub fn register_route(
        &mut self,
        method: impl Into<String>,
        path_template: impl Into<String>,
        handler_name: impl Into<String>,
        declarations: Vec<ParameterDeclaration>,
        handler: HandlerFn,
    ) -> crate::error::Result<()> {
        let handler_name = handler_name.into();
        self.router.register(RouteEntry {
            method: method.into(),
            path_template: path_template.into(),
            handler_name: handler_name.clone(),
        })?;
        self.handlers.insert(handler_name, HandlerEntry { declarations, handler });
        Ok(())
    }

    /// Finalize middleware ordering and start eager singletons via
    /// `Container::refresh` (§4.1, §4.4).
    pub fn refresh(&mut self) -> crate::error::Result<()> {
        self.middleware.finalize();
        self.container.refresh(self.config.clone())
    }

    /// Handle one request end to end: establish the request scope, run the
    /// middleware pipeline, invoke the matched handler, normalize the
    /// response, and tear down the scope on every exit path (§4.6).
    pub fn dispatch(&self, mut req: NormalizedRequest) -> Response {
        let ctx = RequestContext::new();
        let response = with_request_scope(ctx.clone(), || self.dispatch_inner(&mut req, &ctx));
        ctx.finish();
        response
    }

    fn dispatch_inner(&self, req: &mut NormalizedRequest, ctx: &Arc<RequestContext>) -> Response {
        match self.router.match_route(&req.method, &req.path) {
            MatchOutcome::Redirect { location } => {
                Response::with_status(308).with_header("Location", location)
            }
            MatchOutcome::NotFound => self.error_response(CoreError::Dispatch(DispatchError::RouteNotFound {
                method: req.method.clone(),
                path: req.path.clone(),
                diagnostic_id: crate::error::DiagnosticId::next(),
            })),
            MatchOutcome::MethodNotAllowed { allowed } => {
                self.error_response(CoreError::Dispatch(DispatchError::MethodNotAllowed {
                    method: req.method.clone(),
                    path: req.path.clone(),
                    allowed,
                    diagnostic_id: crate::error::DiagnosticId::next(),
                }))
            }
            MatchOutcome::Matched { handler_name, path_params } => {
                req.path_params = path_params;
                let handler_name = handler_name.to_string();
                self.middleware.run(req, &|req| self.invoke(&handler_name, req, ctx))
            }
        }
    }

    fn invoke(&self, handler_name: &str, req: &mut NormalizedRequest, ctx: &Arc<RequestContext>) -> Response {
        let Some(entry) = self.handlers.get(handler_name) else {
            return self.error_response(CoreError::Dispatch(DispatchError::RouteNotFound {
                method: req.method.clone(),
                path: req.path.clone(),
                diagnostic_id: crate::error::DiagnosticId::next(),
            }));
        };

        let resolver = ParameterResolver::new(&self.codecs, &self.models);
        let params = match resolver.resolve_all(&entry.declarations, req) {
            Ok(params) => params,
            Err(e) => return self.error_response(CoreError::Input(e)),
        };

        match (entry.handler)(&self.container, ctx, &params) {
            Ok(outcome) => self.normalize(outcome),
            Err(e) => self.error_response(e),
        }
    }

    /// Passes `Response` through; maps records/text/bytes/`None` per §4.6.
    fn normalize(&self, outcome: HandlerOutcome) -> Response {
        match outcome {
            HandlerOutcome::Response(resp) => resp,
            HandlerOutcome::Record(value) => {
                let mut resp = Response::with_status(200);
                resp.headers.insert("Content-Type", "application/json");
                resp.body = Body::Json(value);
                resp
            }
            HandlerOutcome::Text(text) => Response::text(text),
            HandlerOutcome::None => Response::no_content(),
            HandlerOutcome::Bytes(bytes, content_type) => Response::bytes(bytes, content_type.as_deref()),
        }
    }

    /// Error-to-response mapping (§4.6, §7): 400 for input errors, 500 with
    /// a diagnostic id (and no internal detail unless `debug_responses` is
    /// set) for everything else.
    fn error_response(&self, err: CoreError) -> Response {
        #[cfg(feature = "logging")]
        tracing::error!(
            target: "armature_core::dispatcher",
            error_code = err.error_code(),
            diagnostic_id = %err.diagnostic_id(),
            "request failed: {}", err
        );

        if err.is_client_error() {
            return self.client_error_response(err);
        }

        let diagnostic_id = err.diagnostic_id();
        if self.config.debug_responses {
            Response::error(500, err.to_string(), Some(err.error_code()))
                .with_header("X-Diagnostic-Id", diagnostic_id.to_string())
        } else {
            Response::error(500, "internal server error", Some(err.error_code()))
                .with_header("X-Diagnostic-Id", diagnostic_id.to_string())
        }
    }

    fn client_error_response(&self, err: CoreError) -> Response {
        match err {
            CoreError::Input(InputError::ResolveError(failures)) => {
                let details: Vec<Value> = failures
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "error_code": leaf_error_code(f),
                            "message": f.to_string(),
                        })
                    })
                    .collect();
                Response::error_with_details(400, "resolve_error", "parameter resolution failed", Value::Array(details))
            }
            CoreError::Input(input) => Response::error(400, input.to_string(), Some(leaf_error_code(&input))),
            CoreError::Dispatch(DispatchError::RouteNotFound { .. }) => {
                Response::error(404, err.to_string(), Some(err.error_code()))
            }
            CoreError::Dispatch(DispatchError::MethodNotAllowed { allowed, .. }) => {
                let mut resp = Response::error(405, err.to_string(), Some("method_not_allowed"));
                resp.headers.insert("Allow", allowed.join(", "));
                resp
            }
            other => Response::error(400, other.to_string(), Some(other.error_code())),
        }
    }
}

fn leaf_error_code(err: &InputError) -> &'static str {
    match err {
        InputError::DecodeError { .. } => "decode_error",
        InputError::ValidationError { .. } => "validation_error",
        InputError::ResolveError(_) => "resolve_error",
    }
}

/// Maps lifecycle/startup outcomes to the documented process exit codes
/// (§6): 0 clean shutdown, 1 startup failure, 2 unhandled fatal error while
/// serving. For binaries that drive the runtime directly without a
/// transport crate in the loop.
pub fn run<F>(dispatcher_build: impl FnOnce() -> crate::error::Result<Dispatcher>, serve: F) -> i32
where
    F: FnOnce(&Dispatcher) -> crate::error::Result<()>,
{
    let dispatcher = match dispatcher_build() {
        Ok(d) => d,
        Err(e) => {
            #[cfg(feature = "logging")]
            tracing::error!(target: "armature_core::dispatcher", error = %e, "startup failed");
            return 1;
        }
    };

    match serve(&dispatcher) {
        Ok(()) => {
            dispatcher.container.shutdown();
            0
        }
        Err(e) => {
            #[cfg(feature = "logging")]
            tracing::error!(target: "armature_core::dispatcher", error = %e, "unhandled fatal error while serving");
            dispatcher.container.shutdown();
            2
        }
    }
}

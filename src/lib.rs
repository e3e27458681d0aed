//! # Armature Core — a web-application runtime engine
//!
//! A name-keyed dependency injection container, a component lifecycle
//! manager, and a transport-agnostic HTTP request dispatch pipeline, fused
//! into one runtime core that a thin transport adapter (HTTP server,
//! WebSocket listener, test harness) can drive directly.
//!
//! ## Features
//!
//! - **Lock-free container** — `DashMap` + `ahash` for concurrent
//!   registration lookups, `OnceCell` for exactly-once singleton
//!   construction without holding a lock across user factory code.
//! - **Name-keyed registry** — components are addressed by name, not
//!   `TypeId`; declared-type injection is an optional convenience layered
//!   on top, resolved once at `refresh`.
//! - **Deterministic lifecycle** — Kahn's-algorithm startup ordering,
//!   shutdown as the exact reverse of actual startup order, three
//!   configurable failure modes.
//! - **Request-scoped state** — a `RequestContext` installed on a
//!   thread-local for the duration of one request, with LIFO cleanup.
//! - **Priority-ordered middleware** — an onion pipeline with short-circuit
//!   support and stable tie-breaking by registration order.
//! - **Structured parameter resolution** — path/query/body/header/file
//!   binding, type conversion, ordered constraint validation, and model
//!   binding through an extensible handler registry.
//! - **Observable** — optional `tracing` integration with JSON or pretty
//!   output (see [`logging`]).
//!
//! ## Quick start
//!
//! ```rust
//! use armature_core::prelude::*;
//!
//! let container = Container::new();
//! container
//!     .register(
//!         DefinitionBuilder::new("greeting")
//!             .typed_factory::<String, _>(|_c| Ok(String::from("hello")))
//!             .eager(true)
//!             .build(),
//!     )
//!     .unwrap();
//!
//! container.refresh(RuntimeConfig::default()).unwrap();
//! let greeting = container.get("greeting").unwrap();
//! assert_eq!(greeting.downcast_ref::<String>().unwrap().as_str(), "hello");
//! ```

mod config;
mod container;
mod definition;
mod dispatcher;
mod error;
mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod middleware;
mod params;
mod request;
mod response;
mod router;
mod transport;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use config::{CodecPriorities, RuntimeConfig, RuntimeConfigBuilder, StartupFailureMode, TrailingSlashPolicy};
pub use container::Container;
pub use definition::{
    Component, DefinitionBuilder, DependencyRef, Factory, HookExtractor, Instance, InjectionPoint, ResolveKey, Scope,
};
pub use dispatcher::{run, Dispatcher, HandlerFn, HandlerOutcome};
pub use error::{
    CoreError, DiagnosticId, DispatchError, InputError, LifecycleError, RegistryError, Result, ResolutionError,
};
pub use lifecycle::{ComponentState, LifecycleHook, LifecycleManager, ManagedComponent};
pub use middleware::{Middleware, MiddlewarePipeline, Next};
pub use params::codec::{BodyCodec, CodecRegistry, DecodedBody, UploadedFile};
pub use params::constraint::Constraint;
pub use params::model::{ModelHandler, ModelHandlerRegistry};
pub use params::{ParameterDeclaration, ParameterResolver, ParameterSource, ResolvedValue, TargetType};
pub use request::{current_request_scope, with_request_scope, RequestContext, RequestId};
pub use response::{Body, Headers, Response};
pub use router::{MatchOutcome, RouteEntry, Router};
pub use transport::{MultiMap, NormalizedRequest};

#[cfg(feature = "derive")]
pub use armature_core_derive::Component as DeriveComponent;

// Re-export tracing macros for convenience when the logging feature is enabled.
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

pub use std::sync::Arc;

/// Convenient single-line import for building on top of the runtime.
pub mod prelude {
    pub use crate::{
        Component, Constraint, Container, CoreError, DefinitionBuilder, Dispatcher, HandlerOutcome, InjectionPoint,
        LifecycleHook, Middleware, MiddlewarePipeline, NormalizedRequest, ParameterDeclaration, ParameterSource,
        RequestContext, Response, Result, RouteEntry, RuntimeConfig, RuntimeConfigBuilder, Scope, TargetType,
    };
    pub use std::sync::Arc;
}

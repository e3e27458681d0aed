//! The error taxonomy (§7) plus diagnostic id generation.
//!
//! Every user-visible error carries a [`DiagnosticId`] assigned at
//! construction time, so a 5xx response can point at a stable identifier
//! that correlates with structured logs without leaking internal detail.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// A process-unique, monotonically increasing id assigned to every
/// user-visible error at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticId(u64);

static NEXT_DIAGNOSTIC_ID: AtomicU64 = AtomicU64::new(1);

impl DiagnosticId {
    /// Allocate the next diagnostic id. Called once per error construction.
    pub fn next() -> Self {
        Self(NEXT_DIAGNOSTIC_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DiagnosticId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "diag-{:x}", self.0)
    }
}

/// Registry errors: Definition registration / freeze-state violations (§4.1, §7).
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("component already registered: {name}")]
    AlreadyRegistered { name: String, diagnostic_id: DiagnosticId },

    #[error("registry is frozen: cannot register {name}")]
    RegistryFrozen { name: String, diagnostic_id: DiagnosticId },

    #[error("container is closed")]
    ContainerClosed { diagnostic_id: DiagnosticId },
}

/// Resolution errors raised while resolving a named dependency (§4.1, §7).
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    #[error("dependency not found: {name}{}", consumer_suffix(.consumer, .attribute))]
    DependencyNotFound {
        name: String,
        consumer: Option<String>,
        attribute: Option<String>,
        diagnostic_id: DiagnosticId,
    },

    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String>, diagnostic_id: DiagnosticId },

    #[error("ambiguous dependency for type {type_name}: candidates {}", candidates.join(", "))]
    AmbiguousDependency {
        type_name: String,
        candidates: Vec<String>,
        diagnostic_id: DiagnosticId,
    },

    #[error("no active request scope")]
    NoActiveRequestScope { diagnostic_id: DiagnosticId },
}

fn consumer_suffix(consumer: &Option<String>, attribute: &Option<String>) -> String {
    match (consumer, attribute) {
        (Some(c), Some(a)) => format!(" (required by {c}.{a})"),
        (Some(c), None) => format!(" (required by {c})"),
        _ => String::new(),
    }
}

/// Lifecycle errors raised by `post_construct`/`startup`/`pre_destroy`/`destroy` (§4.2, §7).
#[derive(Error, Debug, Clone)]
#[error("lifecycle error in {component} during {phase}: {cause} (state after: {state_after})")]
pub struct LifecycleError {
    pub component: String,
    pub phase: String,
    pub cause: String,
    pub state_after: String,
    pub diagnostic_id: DiagnosticId,
}

/// Dispatch errors raised by the router / dispatcher (§4.6, §7).
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    RouteNotFound {
        method: String,
        path: String,
        diagnostic_id: DiagnosticId,
    },

    #[error("method not allowed: {method} {path}, allowed: {}", allowed.join(", "))]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
        diagnostic_id: DiagnosticId,
    },

    #[error("ambiguous route: {method} {path_template}")]
    AmbiguousRoute {
        method: String,
        path_template: String,
        diagnostic_id: DiagnosticId,
    },
}

/// Input errors raised by parameter decoding/conversion/validation (§4.5, §7).
#[derive(Error, Debug, Clone)]
pub enum InputError {
    #[error("failed to decode body as {content_type}: {reason}")]
    DecodeError {
        content_type: String,
        reason: String,
        diagnostic_id: DiagnosticId,
    },

    #[error("validation failed for parameter {parameter}: {constraint} (value: {value_display})")]
    ValidationError {
        parameter: String,
        constraint: String,
        value_display: String,
        diagnostic_id: DiagnosticId,
    },

    #[error("{} validation failure(s)", .0.len())]
    ResolveError(Vec<InputError>),
}

impl InputError {
    /// Flatten nested `ResolveError`s into the leaf `ValidationError`/`DecodeError` list.
    pub fn flatten(&self) -> Vec<&InputError> {
        match self {
            InputError::ResolveError(errs) => errs.iter().flat_map(|e| e.flatten()).collect(),
            other => vec![other],
        }
    }

    pub fn diagnostic_id(&self) -> Option<DiagnosticId> {
        match self {
            InputError::DecodeError { diagnostic_id, .. } => Some(*diagnostic_id),
            InputError::ValidationError { diagnostic_id, .. } => Some(*diagnostic_id),
            InputError::ResolveError(errs) => errs.first().and_then(|e| e.diagnostic_id()),
        }
    }
}

/// The crate-wide error type: a flat enum over the five categories of §7,
/// matching the teacher's single-enum `DiError` shape.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Input(#[from] InputError),
}

impl CoreError {
    /// The stable, short error code surfaced to clients in `{error_code, ...}` payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Registry(RegistryError::AlreadyRegistered { .. }) => "already_registered",
            CoreError::Registry(RegistryError::RegistryFrozen { .. }) => "registry_frozen",
            CoreError::Registry(RegistryError::ContainerClosed { .. }) => "container_closed",
            CoreError::Resolution(ResolutionError::DependencyNotFound { .. }) => "dependency_not_found",
            CoreError::Resolution(ResolutionError::CircularDependency { .. }) => "circular_dependency",
            CoreError::Resolution(ResolutionError::AmbiguousDependency { .. }) => "ambiguous_dependency",
            CoreError::Resolution(ResolutionError::NoActiveRequestScope { .. }) => "no_active_request_scope",
            CoreError::Lifecycle(_) => "lifecycle_error",
            CoreError::Dispatch(DispatchError::RouteNotFound { .. }) => "route_not_found",
            CoreError::Dispatch(DispatchError::MethodNotAllowed { .. }) => "method_not_allowed",
            CoreError::Dispatch(DispatchError::AmbiguousRoute { .. }) => "ambiguous_route",
            CoreError::Input(InputError::DecodeError { .. }) => "decode_error",
            CoreError::Input(InputError::ValidationError { .. }) => "validation_error",
            CoreError::Input(InputError::ResolveError(_)) => "resolve_error",
        }
    }

    pub fn diagnostic_id(&self) -> DiagnosticId {
        match self {
            CoreError::Registry(RegistryError::AlreadyRegistered { diagnostic_id, .. })
            | CoreError::Registry(RegistryError::RegistryFrozen { diagnostic_id, .. })
            | CoreError::Registry(RegistryError::ContainerClosed { diagnostic_id })
            | CoreError::Resolution(ResolutionError::DependencyNotFound { diagnostic_id, .. })
            | CoreError::Resolution(ResolutionError::CircularDependency { diagnostic_id, .. })
            | CoreError::Resolution(ResolutionError::AmbiguousDependency { diagnostic_id, .. })
            | CoreError::Resolution(ResolutionError::NoActiveRequestScope { diagnostic_id })
            | CoreError::Lifecycle(LifecycleError { diagnostic_id, .. })
            | CoreError::Dispatch(DispatchError::RouteNotFound { diagnostic_id, .. })
            | CoreError::Dispatch(DispatchError::MethodNotAllowed { diagnostic_id, .. })
            | CoreError::Dispatch(DispatchError::AmbiguousRoute { diagnostic_id, .. }) => *diagnostic_id,
            CoreError::Input(input) => input.diagnostic_id().unwrap_or_else(DiagnosticId::next),
        }
    }

    /// Whether this error maps to a 4xx (input/routing) or 5xx (internal/resolution) response.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CoreError::Input(_)
                | CoreError::Dispatch(DispatchError::RouteNotFound { .. })
                | CoreError::Dispatch(DispatchError::MethodNotAllowed { .. })
        )
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;

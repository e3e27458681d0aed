//! The data model of §3: `Definition`, `Scope`, and injection points.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::container::Container;
use crate::lifecycle::LifecycleHook;

/// Type-erases the downcast from a constructed `Instance` to a component's
/// `LifecycleHook` impl, captured generically at registration time (the same
/// erasure-closure trick the teacher's hot cache uses for `Arc<dyn Any>`).
pub type HookExtractor = Arc<dyn Fn(&Instance) -> Option<Arc<dyn LifecycleHook>> + Send + Sync>;

/// The policy governing how long an instance lives and who shares it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance per container lifetime, shared by every caller.
    Singleton,
    /// A fresh instance on every `get`.
    Prototype,
    /// One instance per active `RequestContext`.
    Request,
}

/// A type-erased instance handle returned by a factory.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A factory builds an instance given the container it was resolved from.
/// Factories for eager singletons must not suspend (§5); request/prototype
/// factories may, via whatever async story the embedding binary chooses —
/// the core only requires `Fn` here and lets callers block internally or
/// hand back pre-resolved work through request-scoped state.
pub type Factory = Arc<dyn Fn(&Container) -> crate::error::Result<Instance> + Send + Sync>;

/// Either a name or a declared type, used by an injection point or a
/// dependency declaration to identify what it needs.
#[derive(Debug, Clone)]
pub enum ResolveKey {
    Name(String),
    Type(TypeId, &'static str),
    /// Try name first (attribute name in the registered naming convention),
    /// then fall back to type.
    Auto,
}

/// The declaration on a consumer that it needs a dependency (§3).
#[derive(Debug, Clone)]
pub struct InjectionPoint {
    pub attribute_name: &'static str,
    pub resolve_key: ResolveKey,
    pub required: bool,
}

/// A single declared dependency name or type marker a Definition requires
/// before its factory runs.
#[derive(Debug, Clone)]
pub enum DependencyRef {
    Name(String),
    Type(TypeId, &'static str),
}

impl DependencyRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }
}

/// The immutable description of one resolvable component (§3).
#[derive(Clone)]
pub struct Definition {
    pub name: String,
    pub factory: Factory,
    pub declared_dependencies: Vec<DependencyRef>,
    pub injection_points: Vec<InjectionPoint>,
    pub scope: Scope,
    pub eager: bool,
    pub source_tag: String,
    pub type_id: Option<TypeId>,
    pub type_name: Option<&'static str>,
    pub as_hook: Option<HookExtractor>,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("eager", &self.eager)
            .field("declared_dependencies", &self.declared_dependencies)
            .field("source_tag", &self.source_tag)
            .finish()
    }
}

/// Ergonomic construction of a [`Definition`] without hand-assembling every
/// field (teacher's builder idiom, generalized to the name-keyed registry).
pub struct DefinitionBuilder {
    name: String,
    factory: Option<Factory>,
    declared_dependencies: Vec<DependencyRef>,
    injection_points: Vec<InjectionPoint>,
    scope: Scope,
    eager: bool,
    source_tag: String,
    type_id: Option<TypeId>,
    type_name: Option<&'static str>,
    as_hook: Option<HookExtractor>,
}

impl DefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: None,
            declared_dependencies: Vec::new(),
            injection_points: Vec::new(),
            scope: Scope::Singleton,
            eager: false,
            source_tag: String::from("<builder>"),
            type_id: None,
            type_name: None,
            as_hook: None,
        }
    }

    /// Mark that `T` implements `LifecycleHook`; the lifecycle manager will
    /// downcast the constructed instance to it once refresh runs.
    pub fn lifecycle_hook<T>(mut self) -> Self
    where
        T: LifecycleHook + 'static,
    {
        self.as_hook = Some(Arc::new(|instance: &Instance| {
            instance.clone().downcast::<T>().ok().map(|t| t as Arc<dyn LifecycleHook>)
        }));
        self
    }

    pub fn factory<F>(mut self, f: F) -> Self
    where
        F: Fn(&Container) -> crate::error::Result<Instance> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(f));
        self
    }

    /// Register a typed factory that directly produces `T`, type-tagging the
    /// Definition so declared-type injection keys can find it.
    pub fn typed_factory<T, F>(mut self, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> crate::error::Result<T> + Send + Sync + 'static,
    {
        self.type_id = Some(TypeId::of::<T>());
        self.type_name = Some(std::any::type_name::<T>());
        self.factory = Some(Arc::new(move |c| {
            f(c).map(|v| Arc::new(v) as Instance)
        }));
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.declared_dependencies.push(DependencyRef::name(name));
        self
    }

    pub fn injection_point(mut self, point: InjectionPoint) -> Self {
        self.injection_points.push(point);
        self
    }

    pub fn injection_points(mut self, points: Vec<InjectionPoint>) -> Self {
        self.injection_points = points;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }

    pub fn source_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = tag.into();
        self
    }

    pub fn build(self) -> Definition {
        let factory = self
            .factory
            .unwrap_or_else(|| panic!("Definition {} built without a factory", self.name));
        Definition {
            name: self.name,
            factory,
            declared_dependencies: self.declared_dependencies,
            injection_points: self.injection_points,
            scope: self.scope,
            eager: self.eager,
            source_tag: self.source_tag,
            type_id: self.type_id,
            type_name: self.type_name,
            as_hook: self.as_hook,
        }
    }
}

/// Implemented by `#[derive(Component)]`. Supplies a default registered name
/// and the injection points declared with `#[inject]`, for a discovery
/// collaborator to hand to [`DefinitionBuilder::injection_points`].
pub trait Component {
    fn component_name() -> &'static str;
    fn injection_points() -> Vec<InjectionPoint>;
}

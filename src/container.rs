//! The definitive registry of Definitions and the sole authority for
//! constructing and caching instances (§4.1).

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::config::RuntimeConfig;
use crate::definition::{Definition, DependencyRef, Instance, ResolveKey, Scope};
use crate::error::{CoreError, DiagnosticId, RegistryError, ResolutionError, Result};
use crate::lifecycle::{LifecycleManager, ManagedComponent};
use crate::request::current_request_scope;

const STATE_OPEN: u8 = 0;
const STATE_FROZEN: u8 = 1;
const STATE_DRAINING: u8 = 2;
const STATE_CLOSED: u8 = 3;

thread_local! {
    /// Per-thread resolution stack, used only to catch *dynamic* cycles
    /// encountered while a factory is running (§4.1 step 2). Complements the
    /// static cycle check done at `refresh`.
    static RESOLUTION_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

struct Registry {
    definitions: DashMap<String, Arc<Definition>, ahash::RandomState>,
    singletons: DashMap<String, Arc<OnceCell<Instance>>, ahash::RandomState>,
    type_index: OnceCell<HashMap<TypeId, Vec<String>>>,
    state: AtomicU8,
    lifecycle: OnceCell<LifecycleManager>,
    config: OnceCell<RuntimeConfig>,
}

/// The container: accepts registrations while *open*, accepts `get` while
/// *frozen*, and tears down through *draining* into *closed* (§4.1).
#[derive(Clone)]
pub struct Container {
    inner: Arc<Registry>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                definitions: DashMap::with_hasher(ahash::RandomState::new()),
                singletons: DashMap::with_hasher(ahash::RandomState::new()),
                type_index: OnceCell::new(),
                state: AtomicU8::new(STATE_OPEN),
                lifecycle: OnceCell::new(),
                config: OnceCell::new(),
            }),
        }
    }

    fn state(&self) -> u8 {
        self.inner.state.load(Ordering::Acquire)
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.definitions.contains_key(name)
    }

    pub fn config(&self) -> Option<&RuntimeConfig> {
        self.inner.config.get()
    }

    /// Register a Definition. Legal only while open (§4.1).
    pub fn register(&self, definition: Definition) -> Result<()> {
        match self.state() {
            STATE_OPEN => {}
            _ => {
                return Err(CoreError::Registry(RegistryError::RegistryFrozen {
                    name: definition.name,
                    diagnostic_id: DiagnosticId::next(),
                }));
            }
        }

        if self.inner.definitions.contains_key(&definition.name) {
            return Err(CoreError::Registry(RegistryError::AlreadyRegistered {
                name: definition.name,
                diagnostic_id: DiagnosticId::next(),
            }));
        }

        #[cfg(feature = "logging")]
        tracing::debug!(target: "armature_core::container", name = %definition.name, "registered definition");

        self.inner.definitions.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Transition open→frozen. Validates dependency existence, detects
    /// static cycles among eager singletons, and constructs them in
    /// topological order, then drives the lifecycle manager's `post_construct`
    /// and `startup` phases over them (§4.1, §4.2).
    pub fn refresh(&self, config: RuntimeConfig) -> Result<()> {
        if self
            .inner
            .state
            .compare_exchange(STATE_OPEN, STATE_FROZEN, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::Registry(RegistryError::RegistryFrozen {
                name: String::from("<refresh>"),
                diagnostic_id: DiagnosticId::next(),
            }));
        }

        self.build_type_index();
        self.validate_dependencies_exist()?;
        self.check_eager_cycles()?;

        let failure_mode = config.startup_failure_mode;
        let deadline = config.shutdown_component_deadline;
        let _ = self.inner.config.set(config);

        let lifecycle = LifecycleManager::new(failure_mode, deadline);
        let _ = self.inner.lifecycle.set(lifecycle);

        let eager_names = self.eager_singleton_names();
        for name in &eager_names {
            self.get(name)?;
        }

        let managed = self.managed_components(&eager_names);
        self.inner.lifecycle.get().unwrap().start(managed)?;

        #[cfg(feature = "logging")]
        tracing::info!(target: "armature_core::container", count = eager_names.len(), "refresh complete");

        Ok(())
    }

    fn build_type_index(&self) {
        let mut index: HashMap<TypeId, Vec<String>> = HashMap::new();
        for entry in self.inner.definitions.iter() {
            if let Some(type_id) = entry.value().type_id {
                index.entry(type_id).or_default().push(entry.key().clone());
            }
        }
        let _ = self.inner.type_index.set(index);
    }

    fn resolve_name_for_type(&self, type_id: TypeId, type_name: &str) -> Result<String> {
        let index = self.inner.type_index.get().expect("type index built at refresh");
        match index.get(&type_id) {
            Some(names) if names.len() == 1 => Ok(names[0].clone()),
            Some(names) if names.len() > 1 => Err(CoreError::Resolution(ResolutionError::AmbiguousDependency {
                type_name: type_name.to_string(),
                candidates: names.clone(),
                diagnostic_id: DiagnosticId::next(),
            })),
            _ => Err(CoreError::Resolution(ResolutionError::DependencyNotFound {
                name: type_name.to_string(),
                consumer: None,
                attribute: None,
                diagnostic_id: DiagnosticId::next(),
            })),
        }
    }

    fn validate_dependencies_exist(&self) -> Result<()> {
        for entry in self.inner.definitions.iter() {
            for dep in &entry.value().declared_dependencies {
                match dep {
                    DependencyRef::Name(name) => {
                        if !self.inner.definitions.contains_key(name) {
                            return Err(CoreError::Resolution(ResolutionError::DependencyNotFound {
                                name: name.clone(),
                                consumer: Some(entry.key().clone()),
                                attribute: None,
                                diagnostic_id: DiagnosticId::next(),
                            }));
                        }
                    }
                    DependencyRef::Type(type_id, type_name) => {
                        self.resolve_name_for_type(*type_id, type_name)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn eager_singleton_names(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = Vec::new();
        for (i, entry) in self.inner.definitions.iter().enumerate() {
            if entry.value().eager && entry.value().scope == Scope::Singleton {
                names.push((i, entry.key().clone()));
            }
        }
        names.sort_by_key(|(i, _)| *i);
        names.into_iter().map(|(_, n)| n).collect()
    }

    fn dependency_names(&self, def: &Definition) -> Vec<String> {
        def.declared_dependencies
            .iter()
            .filter_map(|dep| match dep {
                DependencyRef::Name(name) => Some(name.clone()),
                DependencyRef::Type(type_id, type_name) => self.resolve_name_for_type(*type_id, type_name).ok(),
            })
            .collect()
    }

    /// DFS cycle check over declared dependencies reachable from eager
    /// singletons, the subgraph actually walked during `refresh`-time
    /// construction (§4.1, §8).
    fn check_eager_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: HashMap<String, Mark> = HashMap::new();

        fn visit(
            container: &Container,
            name: &str,
            marks: &mut HashMap<String, Mark>,
            stack: &mut Vec<String>,
        ) -> Result<()> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let mut path = stack.clone();
                    path.push(name.to_string());
                    return Err(CoreError::Resolution(ResolutionError::CircularDependency {
                        path,
                        diagnostic_id: DiagnosticId::next(),
                    }));
                }
                None => {}
            }

            marks.insert(name.to_string(), Mark::Visiting);
            stack.push(name.to_string());

            if let Some(def) = container.inner.definitions.get(name) {
                for dep in container.dependency_names(&def) {
                    visit(container, &dep, marks, stack)?;
                }
            }

            stack.pop();
            marks.insert(name.to_string(), Mark::Done);
            Ok(())
        }

        for name in self.eager_singleton_names() {
            let mut stack = Vec::new();
            visit(self, &name, &mut marks, &mut stack)?;
        }
        Ok(())
    }

    fn managed_components(&self, eager_names: &[String]) -> Vec<ManagedComponent> {
        eager_names
            .iter()
            .map(|name| {
                let def = self.inner.definitions.get(name).unwrap();
                let depends_on = self.dependency_names(&def);
                let hook = self.inner.singletons.get(name).and_then(|cell| {
                    cell.get().and_then(|instance| def.as_hook.as_ref().and_then(|f| f(instance)))
                });
                ManagedComponent { name: name.clone(), depends_on, hook }
            })
            .collect()
    }

    /// Resolve `name`, respecting its declared scope (§4.1). Legal only when
    /// frozen.
    pub fn get(&self, name: &str) -> Result<Instance> {
        match self.state() {
            STATE_OPEN | STATE_CLOSED => {
                return Err(CoreError::Registry(RegistryError::ContainerClosed {
                    diagnostic_id: DiagnosticId::next(),
                }));
            }
            _ => {}
        }

        let def = self
            .inner
            .definitions
            .get(name)
            .ok_or_else(|| {
                CoreError::Resolution(ResolutionError::DependencyNotFound {
                    name: name.to_string(),
                    consumer: None,
                    attribute: None,
                    diagnostic_id: DiagnosticId::next(),
                })
            })?
            .clone();

        match def.scope {
            Scope::Singleton => self.get_singleton(&def),
            Scope::Prototype => self.construct(&def),
            Scope::Request => self.get_request_scoped(&def),
        }
    }

    /// As `get`, but returns `Ok(None)` instead of a `DependencyNotFound`
    /// error for an unknown name.
    pub fn try_get(&self, name: &str) -> Result<Option<Instance>> {
        if !self.inner.definitions.contains_key(name) {
            return Ok(None);
        }
        self.get(name).map(Some)
    }

    fn get_singleton(&self, def: &Definition) -> Result<Instance> {
        let cell = self
            .inner
            .singletons
            .entry(def.name.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        // `OnceCell::get_or_try_init` only serializes the insertion itself;
        // it does not hold a lock across `construct`, so concurrent callers
        // race on the cell's own synchronization rather than ours, avoiding
        // priority inversion while still running the factory exactly once.
        cell.get_or_try_init(|| self.construct(def)).cloned()
    }

    fn get_request_scoped(&self, def: &Definition) -> Result<Instance> {
        let ctx = current_request_scope().ok_or_else(|| {
            CoreError::Resolution(ResolutionError::NoActiveRequestScope { diagnostic_id: DiagnosticId::next() })
        })?;
        ctx.get_or_insert_slot(&def.name, || self.construct(def))
    }

    fn construct(&self, def: &Definition) -> Result<Instance> {
        let already_on_stack = RESOLUTION_STACK.with(|s| s.borrow().contains(&def.name));
        if already_on_stack {
            let path = RESOLUTION_STACK.with(|s| s.borrow().clone());
            return Err(CoreError::Resolution(ResolutionError::CircularDependency {
                path,
                diagnostic_id: DiagnosticId::next(),
            }));
        }

        RESOLUTION_STACK.with(|s| s.borrow_mut().push(def.name.clone()));
        #[cfg(feature = "logging")]
        tracing::trace!(target: "armature_core::container", name = %def.name, "constructing");

        let result = (def.factory)(self).and_then(|instance| self.validate_injection_points(def, instance));

        RESOLUTION_STACK.with(|s| {
            s.borrow_mut().pop();
        });

        result
    }

    /// Resolve and validate declared injection points after the factory
    /// returns the raw instance and before it is handed back from `get`
    /// (§4.1). `Instance` is an opaque `Arc<dyn Any + Send + Sync>` with no
    /// reflection, so this pass cannot reach into a concrete struct's fields
    /// — it resolves each point's key exactly as `get` would, and fails the
    /// construction with `DependencyNotFound` if a required point is
    /// unresolved. Writing the resolved value onto the consumer's field is
    /// the factory's job: a `#[derive(Component)]` type's generated factory
    /// (or a hand-written one) pulls its dependencies out of the container
    /// directly while it has the concrete type in scope, the same way the
    /// `demos/derive.rs` example does. See DESIGN.md's injection-point open
    /// question for why this is validation-only rather than reflection-based
    /// assignment.
    fn validate_injection_points(&self, def: &Definition, instance: Instance) -> Result<Instance> {
        for point in &def.injection_points {
            let resolved = match &point.resolve_key {
                ResolveKey::Name(name) => self.try_get(name)?,
                ResolveKey::Type(type_id, type_name) => match self.resolve_name_for_type(*type_id, type_name) {
                    Ok(name) => self.try_get(&name)?,
                    Err(_) if !point.required => None,
                    Err(e) => return Err(e),
                },
                ResolveKey::Auto => self.try_get(point.attribute_name)?,
            };

            if resolved.is_none() && point.required {
                return Err(CoreError::Resolution(ResolutionError::DependencyNotFound {
                    name: point.attribute_name.to_string(),
                    consumer: Some(def.name.clone()),
                    attribute: Some(point.attribute_name.to_string()),
                    diagnostic_id: DiagnosticId::next(),
                }));
            }
        }
        Ok(instance)
    }

    /// Transition frozen→draining→closed, driving the lifecycle manager
    /// through shutdown (§4.1).
    pub fn shutdown(&self) {
        let prev = self.inner.state.swap(STATE_DRAINING, Ordering::AcqRel);
        if prev == STATE_CLOSED {
            self.inner.state.store(STATE_CLOSED, Ordering::Release);
            return;
        }

        if let Some(lifecycle) = self.inner.lifecycle.get() {
            lifecycle.shutdown();
        }

        self.inner.state.store(STATE_CLOSED, Ordering::Release);
        #[cfg(feature = "logging")]
        tracing::info!(target: "armature_core::container", "shutdown complete");
    }

    pub fn is_frozen(&self) -> bool {
        self.state() == STATE_FROZEN
    }

    pub fn is_closed(&self) -> bool {
        self.state() == STATE_CLOSED
    }

    pub fn lifecycle_state(&self, name: &str) -> Option<crate::lifecycle::ComponentState> {
        self.inner.lifecycle.get().and_then(|l| l.get_state(name))
    }
}

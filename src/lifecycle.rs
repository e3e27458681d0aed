//! Component lifecycle ordering and phase execution (§4.2).
//!
//! The manager orders eager singleton components topologically over their
//! declared dependencies, runs lifecycle hooks in defined phases, and
//! reports structured failures without aborting shutdown.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::config::StartupFailureMode;
use crate::error::{CoreError, DiagnosticId, LifecycleError, Result};

#[cfg(feature = "async")]
use std::future::Future;
#[cfg(feature = "async")]
use std::pin::Pin;

#[cfg(feature = "async")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `created → initializing → initialized → running → stopping → stopped`,
/// with `failed` reachable from any non-terminal state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    Created,
    Initializing,
    Initialized,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl ComponentState {
    fn is_terminal(self) -> bool {
        matches!(self, ComponentState::Stopped | ComponentState::Failed)
    }
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComponentState::Created => "created",
            ComponentState::Initializing => "initializing",
            ComponentState::Initialized => "initialized",
            ComponentState::Running => "running",
            ComponentState::Stopping => "stopping",
            ComponentState::Stopped => "stopped",
            ComponentState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Hooks a component may implement for each lifecycle phase. Missing hooks
/// are no-ops via the default implementations. When the `async` feature is
/// enabled, the manager always calls the `_async` variants, whose defaults
/// simply delegate to the sync ones — so a component implementing only the
/// sync form still behaves correctly, and a component implementing both
/// effectively has its async form preferred.
pub trait LifecycleHook: Send + Sync {
    fn post_construct(&self) -> Result<()> {
        Ok(())
    }
    fn startup(&self) -> Result<()> {
        Ok(())
    }
    fn pre_destroy(&self) -> Result<()> {
        Ok(())
    }
    fn destroy(&self) -> Result<()> {
        Ok(())
    }

    #[cfg(feature = "async")]
    fn post_construct_async(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.post_construct() })
    }
    #[cfg(feature = "async")]
    fn startup_async(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.startup() })
    }
    #[cfg(feature = "async")]
    fn pre_destroy_async(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.pre_destroy() })
    }
    #[cfg(feature = "async")]
    fn destroy_async(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.destroy() })
    }
}

/// One eager singleton as seen by the lifecycle manager: its name, its
/// declared dependency names (already resolved from type markers by the
/// container), and its hook if it has one.
pub struct ManagedComponent {
    pub name: String,
    pub depends_on: Vec<String>,
    pub hook: Option<Arc<dyn LifecycleHook>>,
}

struct Tracked {
    hook: Option<Arc<dyn LifecycleHook>>,
    state: ComponentState,
}

/// Orders and executes the lifecycle phases over the set of eager singleton
/// components (§4.2). Non-eager (prototype/request) components have no
/// single well-defined lifetime and are not managed here — see DESIGN.md for
/// that Open Question resolution.
pub struct LifecycleManager {
    failure_mode: StartupFailureMode,
    per_component_deadline: std::time::Duration,
    states: RwLock<HashMap<String, Tracked>>,
    /// Order components were actually started in; shutdown reverses this,
    /// not the declared graph, per §4.2.
    startup_order: RwLock<Vec<String>>,
}

impl LifecycleManager {
    pub fn new(failure_mode: StartupFailureMode, per_component_deadline: std::time::Duration) -> Self {
        Self {
            failure_mode,
            per_component_deadline,
            states: RwLock::new(HashMap::new()),
            startup_order: RwLock::new(Vec::new()),
        }
    }

    pub fn get_state(&self, name: &str) -> Option<ComponentState> {
        self.states.read().unwrap().get(name).map(|t| t.state)
    }

    /// Kahn's-algorithm topological order: dependencies before dependents.
    /// Returns the order, or a `CircularDependency` error with the cycle path.
    pub fn topological_order(components: &[ManagedComponent]) -> Result<Vec<String>> {
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        let known: HashSet<&str> = components.iter().map(|c| c.name.as_str()).collect();

        for c in components {
            indegree.entry(&c.name).or_insert(0);
            for dep in &c.depends_on {
                if known.contains(dep.as_str()) {
                    *indegree.entry(&c.name).or_insert(0) += 1;
                    dependents.entry(dep.as_str()).or_default().push(&c.name);
                }
            }
        }

        // Deterministic order among equally-ready nodes: registration order.
        let position: HashMap<&str, usize> =
            components.iter().enumerate().map(|(i, c)| (c.name.as_str(), i)).collect();
        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&n, _)| n)
            .collect();
        ready.sort_by_key(|n| position[n]);
        let mut queue: VecDeque<&str> = ready.into();

        let mut order = Vec::with_capacity(components.len());
        let mut remaining = indegree.clone();

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());
            if let Some(deps) = dependents.get(node) {
                let mut newly_ready = Vec::new();
                for &dependent in deps {
                    let entry = remaining.get_mut(dependent).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        newly_ready.push(dependent);
                    }
                }
                newly_ready.sort_by_key(|n| position[n]);
                for n in newly_ready {
                    queue.push_back(n);
                }
            }
        }

        if order.len() != components.len() {
            let cycle_path = components
                .iter()
                .map(|c| c.name.clone())
                .filter(|n| !order.contains(n))
                .collect();
            return Err(CoreError::Resolution(crate::error::ResolutionError::CircularDependency {
                path: cycle_path,
                diagnostic_id: DiagnosticId::next(),
            }));
        }

        Ok(order)
    }

    /// Run `post_construct` then `startup` for every component in
    /// topological order, honoring the configured failure mode.
    pub fn start(&self, components: Vec<ManagedComponent>) -> Result<()> {
        let order = Self::topological_order(&components)?;
        let mut by_name: HashMap<String, ManagedComponent> =
            components.into_iter().map(|c| (c.name.clone(), c)).collect();

        {
            let mut states = self.states.write().unwrap();
            for name in &order {
                states.insert(
                    name.clone(),
                    Tracked {
                        hook: by_name.get(name).and_then(|c| c.hook.clone()),
                        state: ComponentState::Created,
                    },
                );
            }
        }

        let mut started_order = Vec::new();
        let mut first_error = None;

        for name in &order {
            let component = by_name.remove(name).unwrap();
            self.set_state(name, ComponentState::Initializing);

            let outcome = component
                .hook
                .as_ref()
                .map(|h| h.post_construct().and_then(|_| h.startup()))
                .unwrap_or(Ok(()));

            match outcome {
                Ok(()) => {
                    self.set_state(name, ComponentState::Running);
                    started_order.push(name.clone());
                    #[cfg(feature = "logging")]
                    tracing::info!(target: "armature_core::lifecycle", component = %name, "started");
                }
                Err(err) => {
                    self.set_state(name, ComponentState::Failed);
                    #[cfg(feature = "logging")]
                    tracing::error!(target: "armature_core::lifecycle", component = %name, error = %err, "startup failed");
                    match self.failure_mode {
                        StartupFailureMode::Strict => {
                            first_error = Some(err);
                            break;
                        }
                        StartupFailureMode::Warn => {
                            if first_error.is_none() {
                                first_error = None;
                            }
                        }
                        StartupFailureMode::Ignore => {}
                    }
                }
            }
        }

        *self.startup_order.write().unwrap() = started_order;

        match self.failure_mode {
            StartupFailureMode::Strict => match first_error {
                Some(err) => Err(err),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Run `pre_destroy` then `destroy` for every successfully started
    /// component, in reverse of the order they actually started (§4.2).
    /// Failures are logged, never abort shutdown, and every remaining
    /// component still receives its attempt. Each hook call is bounded by
    /// `per_component_deadline` (§5): a hook that hangs past its deadline is
    /// logged as timed out and the manager moves on to the next component
    /// rather than blocking the rest of shutdown indefinitely.
    pub fn shutdown(&self) {
        let order: Vec<String> = {
            let guard = self.startup_order.read().unwrap();
            guard.iter().rev().cloned().collect()
        };

        for name in order {
            let hook = {
                let states = self.states.read().unwrap();
                states.get(&name).and_then(|t| t.hook.clone())
            };
            self.set_state(&name, ComponentState::Stopping);
            if let Some(hook) = hook {
                self.run_bounded(&name, "pre_destroy", {
                    let hook = hook.clone();
                    move || hook.pre_destroy()
                });
                self.run_bounded(&name, "destroy", {
                    let hook = hook.clone();
                    move || hook.destroy()
                });
            }
            self.set_state(&name, ComponentState::Stopped);
        }
    }

    /// Runs `call` on a dedicated thread and waits at most
    /// `per_component_deadline` for it to finish, logging either its error
    /// or a timeout. The thread is detached on timeout: a hook that never
    /// returns leaks a thread rather than blocking the rest of shutdown.
    fn run_bounded(&self, name: &str, phase: &str, call: impl FnOnce() -> Result<()> + Send + 'static) {
        let (tx, rx) = std::sync::mpsc::sync_channel::<Result<()>>(1);
        std::thread::spawn(move || {
            let _ = tx.send(call());
        });

        match rx.recv_timeout(self.per_component_deadline) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                #[cfg(feature = "logging")]
                tracing::warn!(target: "armature_core::lifecycle", component = %name, error = %err, "{phase} failed");
                #[cfg(not(feature = "logging"))]
                let _ = err;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                #[cfg(feature = "logging")]
                tracing::warn!(
                    target: "armature_core::lifecycle",
                    component = %name,
                    deadline_ms = self.per_component_deadline.as_millis() as u64,
                    "{phase} timed out, continuing shutdown"
                );
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                #[cfg(feature = "logging")]
                tracing::warn!(target: "armature_core::lifecycle", component = %name, "{phase} thread panicked");
            }
        }
    }

    pub fn deadline(&self) -> std::time::Duration {
        self.per_component_deadline
    }

    fn set_state(&self, name: &str, state: ComponentState) {
        let mut states = self.states.write().unwrap();
        if let Some(tracked) = states.get_mut(name) {
            if tracked.state.is_terminal() && state != ComponentState::Failed {
                // idempotent: a terminal state never regresses
                return;
            }
            tracked.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        log: Arc<std::sync::Mutex<Vec<String>>>,
        name: &'static str,
        fail: bool,
    }

    impl LifecycleHook for Recorder {
        fn startup(&self) -> Result<()> {
            if self.fail {
                return Err(CoreError::Lifecycle(LifecycleError {
                    component: self.name.into(),
                    phase: "startup".into(),
                    cause: "boom".into(),
                    state_after: "failed".into(),
                    diagnostic_id: DiagnosticId::next(),
                }));
            }
            self.log.lock().unwrap().push(self.name.to_string());
            Ok(())
        }

        fn pre_destroy(&self) -> Result<()> {
            self.log.lock().unwrap().push(format!("destroy:{}", self.name));
            Ok(())
        }
    }

    #[test]
    fn startup_order_respects_dependencies() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let comps = vec![
            ManagedComponent {
                name: "a".into(),
                depends_on: vec![],
                hook: Some(Arc::new(Recorder { log: log.clone(), name: "a", fail: false })),
            },
            ManagedComponent {
                name: "b".into(),
                depends_on: vec!["a".into()],
                hook: Some(Arc::new(Recorder { log: log.clone(), name: "b", fail: false })),
            },
            ManagedComponent {
                name: "c".into(),
                depends_on: vec!["b".into()],
                hook: Some(Arc::new(Recorder { log: log.clone(), name: "c", fail: false })),
            },
        ];

        let manager = LifecycleManager::new(StartupFailureMode::Strict, std::time::Duration::from_secs(30));
        manager.start(comps).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);

        log.lock().unwrap().clear();
        manager.shutdown();
        assert_eq!(*log.lock().unwrap(), vec!["destroy:c", "destroy:b", "destroy:a"]);
    }

    #[test]
    fn strict_mode_stops_after_first_failure() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let comps = vec![
            ManagedComponent {
                name: "a".into(),
                depends_on: vec![],
                hook: Some(Arc::new(Recorder { log: log.clone(), name: "a", fail: false })),
            },
            ManagedComponent {
                name: "b".into(),
                depends_on: vec!["a".into()],
                hook: Some(Arc::new(Recorder { log: log.clone(), name: "b", fail: true })),
            },
            ManagedComponent {
                name: "c".into(),
                depends_on: vec!["b".into()],
                hook: Some(Arc::new(Recorder { log: log.clone(), name: "c", fail: false })),
            },
        ];

        let manager = LifecycleManager::new(StartupFailureMode::Strict, std::time::Duration::from_secs(30));
        let result = manager.start(comps);
        assert!(result.is_err());
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(manager.get_state("a"), Some(ComponentState::Running));
        assert_eq!(manager.get_state("b"), Some(ComponentState::Failed));
        assert_eq!(manager.get_state("c"), Some(ComponentState::Created));

        log.lock().unwrap().clear();
        manager.shutdown();
        // only a was ever running; b failed, c never started
        assert_eq!(*log.lock().unwrap(), vec!["destroy:a"]);
    }

    struct HangingOnDestroy;

    impl LifecycleHook for HangingOnDestroy {
        fn pre_destroy(&self) -> Result<()> {
            std::thread::sleep(std::time::Duration::from_secs(60));
            Ok(())
        }
    }

    #[test]
    fn shutdown_does_not_block_on_a_hanging_hook() {
        let comps = vec![
            ManagedComponent { name: "slow".into(), depends_on: vec![], hook: Some(Arc::new(HangingOnDestroy)) },
        ];
        let manager = LifecycleManager::new(StartupFailureMode::Ignore, std::time::Duration::from_millis(20));
        manager.start(comps).unwrap();

        let started = std::time::Instant::now();
        manager.shutdown();
        assert!(started.elapsed() < std::time::Duration::from_secs(5), "shutdown must not wait for the hung hook");
        assert_eq!(manager.get_state("slow"), Some(ComponentState::Stopped));
    }

    #[test]
    fn circular_dependency_detected() {
        let comps = vec![
            ManagedComponent { name: "a".into(), depends_on: vec!["b".into()], hook: None },
            ManagedComponent { name: "b".into(), depends_on: vec!["a".into()], hook: None },
        ];
        let result = LifecycleManager::topological_order(&comps);
        assert!(result.is_err());
    }
}

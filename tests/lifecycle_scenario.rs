//! Whole-runtime scenario 6 of the testable-properties list: lifecycle
//! ordering across dependent eager singletons, both on a clean startup and
//! under a strict-mode startup failure.

use armature_core::{
    Container, DefinitionBuilder, LifecycleHook, Result, RuntimeConfig, RuntimeConfigBuilder, Scope,
    StartupFailureMode,
};
use std::sync::{Arc, Mutex};

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl LifecycleHook for Recorder {
    fn startup(&self) -> Result<()> {
        if self.fail {
            return Err(armature_core::CoreError::Lifecycle(armature_core::LifecycleError {
                component: self.name.into(),
                phase: "startup".into(),
                cause: "boom".into(),
                state_after: "failed".into(),
                diagnostic_id: armature_core::DiagnosticId::next(),
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

fn register(container: &Container, name: &'static str, log: Arc<Mutex<Vec<String>>>, fail: bool, depends_on: Option<&str>) {
    let mut builder = DefinitionBuilder::new(name)
        .typed_factory::<Recorder, _>(move |_c| Ok(Recorder { name, log: log.clone(), fail }))
        .lifecycle_hook::<Recorder>()
        .scope(Scope::Singleton)
        .eager(true);
    if let Some(dep) = depends_on {
        builder = builder.depends_on(dep);
    }
    container.register(builder.build()).unwrap();
}

#[test]
fn startup_and_shutdown_respect_declared_dependency_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    register(&container, "A", log.clone(), false, None);
    register(&container, "B", log.clone(), false, Some("A"));
    register(&container, "C", log.clone(), false, Some("B"));

    container.refresh(RuntimeConfig::default()).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);

    log.lock().unwrap().clear();
    container.shutdown();
    assert_eq!(*log.lock().unwrap(), vec!["destroy:C", "destroy:B", "destroy:A"]);
}

#[test]
fn strict_mode_startup_failure_stops_downstream_components() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let container = Container::new();
    register(&container, "A", log.clone(), false, None);
    register(&container, "B", log.clone(), true, Some("A"));
    register(&container, "C", log.clone(), false, Some("B"));

    let config = RuntimeConfigBuilder::new().startup_failure_mode(StartupFailureMode::Strict).build();
    let err = container.refresh(config);
    assert!(err.is_err());

    assert_eq!(*log.lock().unwrap(), vec!["A"]);
    assert_eq!(container.lifecycle_state("A"), Some(armature_core::ComponentState::Running));
    assert_eq!(container.lifecycle_state("B"), Some(armature_core::ComponentState::Failed));
    assert_eq!(container.lifecycle_state("C"), Some(armature_core::ComponentState::Created));

    log.lock().unwrap().clear();
    container.shutdown();
    assert_eq!(*log.lock().unwrap(), vec!["destroy:A"]);
}

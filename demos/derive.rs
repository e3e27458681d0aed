//! Shows the `Component` derive macro: it only emits metadata
//! (`component_name` + `injection_points`), so a discovery collaborator
//! (here, written by hand) is still responsible for turning that metadata
//! into a registered `Definition`. The container validates the declared
//! points (fails construction if a required one is missing) but does not
//! populate struct fields from them — the factory below does that itself,
//! by calling `get` for each dependency while it has the concrete type in
//! scope (see DESIGN.md's injection-point open question).

use armature_core::{
    Component, Container, DefinitionBuilder, DeriveComponent, ResolveKey, RuntimeConfig, Scope,
};
use std::sync::Arc;

#[derive(DeriveComponent)]
#[component(name = "greeter")]
struct Greeter {
    #[inject(name = "greeting_prefix")]
    prefix: String,
}

fn register_component<T>(container: &Container, build: impl Fn(&Container) -> T + Send + Sync + 'static)
where
    T: Component + Send + Sync + 'static,
{
    let points = T::injection_points();
    for point in &points {
        if let ResolveKey::Name(name) = &point.resolve_key {
            println!("  needs dependency `{name}` for attribute `{}`", point.attribute_name);
        }
    }

    container
        .register(
            DefinitionBuilder::new(T::component_name())
                .typed_factory::<T, _>(move |c| Ok(build(c)))
                .injection_points(points)
                .scope(Scope::Singleton)
                .eager(true)
                .build(),
        )
        .unwrap();
}

fn main() {
    let container = Container::new();

    container
        .register(
            DefinitionBuilder::new("greeting_prefix")
                .typed_factory::<String, _>(|_c| Ok(String::from("Hello")))
                .eager(true)
                .build(),
        )
        .unwrap();

    println!("registering `greeter`:");
    register_component::<Greeter>(&container, |c| {
        let prefix = c.get("greeting_prefix").unwrap();
        Greeter { prefix: (*prefix.downcast_ref::<String>().unwrap()).clone() }
    });

    container.refresh(RuntimeConfig::default()).unwrap();

    let greeter: Arc<Greeter> = container.get("greeter").unwrap().downcast::<Greeter>().unwrap();
    println!("{}, world!", greeter.prefix);

    container.shutdown();
}

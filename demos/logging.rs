//! Shows the three ways to bring up structured logging: a one-line default,
//! a named preset, and the builder for custom targets/formats.
//!
//! Run with: `cargo run --example logging --features logging-pretty`

use armature_core::logging;

fn main() {
    logging::builder()
        .pretty()
        .debug()
        .with_target_filter("armature_core")
        .with_line_number()
        .init();

    tracing::info!(target: "armature_core::demo", "runtime started");
    tracing::debug!(target: "armature_core::demo", component = "greeter", "resolved dependency");
    tracing::warn!(target: "armature_core::demo", "this only prints because the filter targets armature_core");
}

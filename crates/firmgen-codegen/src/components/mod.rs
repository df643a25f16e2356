/// Schema and registration shared by runtime-managed components.
pub mod base;
pub mod example_component;
/// Schema and registration shared by sensors.
pub mod sensor;

use firmgen::schema::SchemaRegistry;

use crate::component::Components;
use crate::error::Result;

/// Returns the registry of all the built-in components.
///
/// # Errors
///
/// Fails when two built-in components share a kind.
pub fn builtin() -> Result<Components> {
    let mut schemas = SchemaRegistry::new();

    Components::new()
        .component(example_component::example_component(&mut schemas)?)?
        .component(example_component::example_sensor(&mut schemas)?)
}

use firmgen::fields::{FieldKind, Fields};
use firmgen::id::Identifier;
use firmgen::schema::Schema;
use firmgen::value::ConfigNode;

use crate::context::EmitContext;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::Expression;

/// The field overriding the setup priority of a runtime object.
pub const SETUP_PRIORITY: &str = "setup_priority";

/// Returns the schema shared by every runtime-managed component.
///
/// # Errors
///
/// Fails when the schema cannot be built.
pub fn component_schema() -> Result<Schema> {
    Schema::from_fields(
        "component",
        Fields::new().optional(SETUP_PRIORITY, FieldKind::float()),
    )
    .map_err(|e| Error::stage(ErrorKind::Registry, e))
}

/// Registers an instance as a runtime object.
///
/// # Errors
///
/// Fails when the instance was already registered.
pub fn register_component(
    context: &EmitContext,
    config: &ConfigNode,
    id: &Identifier,
) -> Result<()> {
    if let Some(priority) = config.get_f64(SETUP_PRIORITY) {
        context.add(Expression::from(id).method(
            "set_setup_priority",
            vec![Expression::Float(priority)],
        ));
    }

    if !context.register_runtime_object(id) {
        return Err(context.error(format!("`{id}` is already registered")));
    }
    Ok(())
}

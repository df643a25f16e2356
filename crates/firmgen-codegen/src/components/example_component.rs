//! A hub component and the sensor platform attached to it.
//!
//! ```json
//! {
//!     "example_component": {},
//!     "sensor": [
//!         { "name": "Outdoor" },
//!         { "name": "Indoor", "accuracy_decimals": 1 }
//!     ]
//! }
//! ```

use firmgen::component::{Capability, ComponentDeclaration};
use firmgen::fields::Fields;
use firmgen::id::Identifier;
use firmgen::schema::SchemaRegistry;
use firmgen::value::ConfigNode;

use crate::component::Component;
use crate::context::EmitContext;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::Expression;

use super::base::component_schema;
use super::sensor::{SensorOptions, sensor_schema};

/// Kind of the hub component.
pub const EXAMPLE_COMPONENT: &str = "example_component";

/// Kind of the sensors attached to the hub.
pub const SENSOR: &str = "sensor";

/// Native type of the hub component.
pub const EXAMPLE_COMPONENT_TYPE: &str = "example_component::ExampleComponent";

/// Native type of the sensors.
pub const EXAMPLE_SENSOR_TYPE: &str = "example_component::ExampleSensor";

/// The field referencing the hub a sensor belongs to.
pub const PARENT_ID: &str = "example_component_id";

// Header declaring the native types.
const HEADER: &str = "example_component.h";

/// Defines the hub [`Component`].
///
/// # Errors
///
/// Fails when the kind schema is already defined in `schemas`.
pub fn example_component(schemas: &mut SchemaRegistry) -> Result<Component> {
    let schema = schemas
        .define_schema(
            EXAMPLE_COMPONENT,
            Fields::new().declare_id(EXAMPLE_COMPONENT_TYPE),
            Some(&component_schema()?),
        )
        .map_err(|e| Error::stage(ErrorKind::Registry, e))?;

    Ok(Component::new(
        ComponentDeclaration::new(EXAMPLE_COMPONENT, schema)
            .capability(Capability::Schedulable)
            .single_instance(),
        emit_example_component,
    ))
}

/// Defines the sensor [`Component`].
///
/// Sensors report two decimals and a `measurement` state class unless
/// configured otherwise.
///
/// # Errors
///
/// Fails when the kind schema is already defined in `schemas`.
pub fn example_sensor(schemas: &mut SchemaRegistry) -> Result<Component> {
    let base = sensor_schema(
        SensorOptions::new(EXAMPLE_SENSOR_TYPE)
            .unit_of_measurement("")
            .icon("")
            .accuracy_decimals(2)
            .state_class("measurement"),
    )?
    .merge(&component_schema()?)
    .map_err(|e| Error::stage(ErrorKind::Registry, e))?;

    let schema = schemas
        .define_schema(
            SENSOR,
            Fields::new().use_id(PARENT_ID, EXAMPLE_COMPONENT_TYPE),
            Some(&base),
        )
        .map_err(|e| Error::stage(ErrorKind::Registry, e))?;

    Ok(Component::new(
        ComponentDeclaration::new(SENSOR, schema)
            .dependency(EXAMPLE_COMPONENT)
            .capability(Capability::Measurable)
            .capability(Capability::Schedulable),
        emit_example_sensor,
    ))
}

async fn emit_example_component(
    context: EmitContext,
    _config: ConfigNode,
    id: Identifier,
) -> Result<()> {
    context.add_include(HEADER);
    context.new_pvariable(&id, Vec::new());
    Ok(())
}

async fn emit_example_sensor(context: EmitContext, config: ConfigNode, id: Identifier) -> Result<()> {
    let parent = config.get_id(PARENT_ID).and_then(|parent| parent.name.clone());

    context.add_include(HEADER);
    let sensor = context.new_pvariable(&id, Vec::new());

    if let Some(parent) = parent {
        let parent = context.get_variable(parent).await?;
        context.add(sensor.method("set_parent", vec![Expression::from(&parent)]));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use firmgen::component::Capability;
    use firmgen::schema::SchemaRegistry;

    use serde_json::json;

    use crate::buffer::GeneratedCode;
    use crate::components::builtin;
    use crate::generator::Generator;

    use super::{EXAMPLE_COMPONENT, PARENT_ID, SENSOR, example_component, example_sensor};

    pub(crate) fn example_configuration() -> serde_json::Value {
        json!({
            "example_component": {},
            "sensor": [
                {
                    "id": "outdoor",
                    "name": "Outdoor",
                    "example_component_id": "example_component",
                },
                { "name": "Indoor", "accuracy_decimals": 1 },
            ],
        })
    }

    pub(crate) fn generator() -> Generator {
        Generator::new(builtin().unwrap())
    }

    // Position of a rendered statement inside `setup()`.
    pub(crate) fn position(code: &GeneratedCode, statement: &str) -> usize {
        code.statements
            .iter()
            .position(|s| s.to_string() == statement)
            .unwrap_or_else(|| panic!("`{statement}` was not emitted"))
    }

    #[test]
    fn declarations() {
        let mut schemas = SchemaRegistry::new();
        let hub = example_component(&mut schemas).unwrap();
        let sensor = example_sensor(&mut schemas).unwrap();

        assert!(!hub.declaration().multi_conf());
        assert!(hub.declaration().has(Capability::Schedulable));

        assert!(sensor.declaration().multi_conf());
        assert!(sensor.declaration().has(Capability::Measurable));
        assert!(sensor.declaration().dependencies().contains(&EXAMPLE_COMPONENT.into()));
        assert!(sensor.declaration().schema().field(PARENT_ID).is_some());
        assert!(sensor.declaration().schema().field("setup_priority").is_some());

        assert!(schemas.contains(EXAMPLE_COMPONENT));
        assert!(schemas.contains(SENSOR));
        assert!(example_component(&mut schemas).is_err());
    }

    #[test]
    fn sensor_setters() {
        let code = generator()
            .generate(&json!({
                "example_component": { "setup_priority": 600.0 },
                "sensor": {
                    "id": "garden",
                    "name": "Garden",
                    "accuracy_decimals": 1,
                    "unit_of_measurement": "°C",
                    "expire_after": "5min",
                    "internal": true,
                },
            }))
            .unwrap();

        position(&code, "example_component->set_setup_priority(600.0f);");
        let created = position(&code, "garden = new example_component::ExampleSensor();");
        let named = position(&code, "garden->set_name(\"Garden\");");
        let registered = position(&code, "App.register_sensor(garden);");
        assert!(created < named);
        assert!(named < registered);

        position(&code, "garden->set_internal(true);");
        position(&code, "garden->set_unit_of_measurement(\"°C\");");
        position(&code, "garden->set_accuracy_decimals(1);");
        position(&code, "garden->set_expire_after(300000);");
    }
}

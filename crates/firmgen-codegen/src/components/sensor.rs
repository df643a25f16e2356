use std::borrow::Cow;

use firmgen::fields::{FieldKind, Fields};
use firmgen::id::Identifier;
use firmgen::schema::Schema;
use firmgen::value::{ConfigNode, ConfigValue};

use crate::context::EmitContext;
use crate::error::{Error, ErrorKind, Result};
use crate::expression::Expression;

// Base name of the automatic sensor identifiers.
const SENSOR_ID_BASE: &str = "sensor";

// Default number of decimals reported by a sensor.
const DEFAULT_ACCURACY_DECIMALS: i64 = 0;

// Limits of the number of decimals.
const MIN_ACCURACY_DECIMALS: i64 = -3;
const MAX_ACCURACY_DECIMALS: i64 = 8;

/// All accepted state classes.
pub const STATE_CLASSES: &[&str] = &["", "measurement", "total_increasing", "total"];

/// The default values of the sensor fields, chosen by each sensor
/// platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorOptions {
    type_name: Cow<'static, str>,
    unit_of_measurement: Cow<'static, str>,
    icon: Cow<'static, str>,
    accuracy_decimals: i64,
    state_class: Cow<'static, str>,
    device_class: Cow<'static, str>,
}

impl SensorOptions {
    /// Creates the [`SensorOptions`] of a sensor with the given native
    /// type.
    #[must_use]
    pub fn new(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            type_name: type_name.into(),
            unit_of_measurement: Cow::Borrowed(""),
            icon: Cow::Borrowed(""),
            accuracy_decimals: DEFAULT_ACCURACY_DECIMALS,
            state_class: Cow::Borrowed(""),
            device_class: Cow::Borrowed(""),
        }
    }

    /// Sets the default unit of measurement.
    #[must_use]
    pub fn unit_of_measurement(mut self, unit: impl Into<Cow<'static, str>>) -> Self {
        self.unit_of_measurement = unit.into();
        self
    }

    /// Sets the default icon.
    #[must_use]
    pub fn icon(mut self, icon: impl Into<Cow<'static, str>>) -> Self {
        self.icon = icon.into();
        self
    }

    /// Sets the default number of decimals.
    #[must_use]
    pub const fn accuracy_decimals(mut self, decimals: i64) -> Self {
        self.accuracy_decimals = decimals;
        self
    }

    /// Sets the default state class.
    #[must_use]
    pub fn state_class(mut self, state_class: impl Into<Cow<'static, str>>) -> Self {
        self.state_class = state_class.into();
        self
    }

    /// Sets the default device class.
    #[must_use]
    pub fn device_class(mut self, device_class: impl Into<Cow<'static, str>>) -> Self {
        self.device_class = device_class.into();
        self
    }
}

/// Returns the schema shared by every sensor.
///
/// # Errors
///
/// Fails when a default of `options` is not a valid value, such as an
/// unknown state class.
pub fn sensor_schema(options: SensorOptions) -> Result<Schema> {
    let fields = Fields::new()
        .declare_id_with_base(options.type_name, SENSOR_ID_BASE)
        .optional("name", FieldKind::String)
        .boolean("internal", false)
        .string("unit_of_measurement", options.unit_of_measurement)
        .string("icon", options.icon)
        .integer_with_limits(
            "accuracy_decimals",
            options.accuracy_decimals,
            MIN_ACCURACY_DECIMALS,
            MAX_ACCURACY_DECIMALS,
        )
        .optional_with_default(
            "state_class",
            FieldKind::one_of(STATE_CLASSES.iter().copied()),
            options.state_class.into_owned(),
        )
        .string("device_class", options.device_class)
        .boolean("force_update", false)
        .optional("expire_after", FieldKind::TimePeriod);

    Schema::from_fields("sensor", fields).map_err(|e| Error::stage(ErrorKind::Registry, e))
}

/// Registers an instance as a sensor, applying its measurement metadata.
pub fn register_sensor(context: &EmitContext, config: &ConfigNode, id: &Identifier) -> Result<()> {
    let setter = |method: &str, value: Expression| {
        context.add(Expression::from(id).method(method, vec![value]));
    };

    if let Some(name) = config.get_str("name") {
        setter("set_name", Expression::Str(name.into()));
    }
    if config.get_bool("internal") == Some(true) {
        setter("set_internal", Expression::Bool(true));
    }
    for (field, method) in [
        ("unit_of_measurement", "set_unit_of_measurement"),
        ("icon", "set_icon"),
        ("device_class", "set_device_class"),
    ] {
        if let Some(value) = config.get_str(field).filter(|v| !v.is_empty()) {
            setter(method, Expression::Str(value.into()));
        }
    }
    if let Some(decimals) = config.get_i64("accuracy_decimals") {
        setter("set_accuracy_decimals", Expression::Integer(decimals));
    }
    if let Some(state_class) = config.get_str("state_class").filter(|v| !v.is_empty()) {
        setter(
            "set_state_class",
            Expression::raw(format!(
                "sensor::STATE_CLASS_{}",
                state_class.to_ascii_uppercase()
            )),
        );
    }
    if config.get_bool("force_update") == Some(true) {
        setter("set_force_update", Expression::Bool(true));
    }
    if let Some(millis) = config.get("expire_after").and_then(ConfigValue::as_millis) {
        setter(
            "set_expire_after",
            Expression::Integer(i64::try_from(millis).unwrap_or(i64::MAX)),
        );
    }

    context.add(Expression::raw("App").method("register_sensor", vec![Expression::from(id)]));
    Ok(())
}

#[cfg(test)]
mod tests {
    use firmgen::error::ErrorKind as ConfigErrorKind;
    use firmgen::path::ConfigPath;
    use firmgen::validate::validate;
    use firmgen::value::ConfigNode;

    use serde_json::json;

    use crate::error::ErrorKind;

    use super::{SensorOptions, sensor_schema};

    #[test]
    fn sensor_defaults() {
        let schema = sensor_schema(
            SensorOptions::new("example_component::ExampleSensor")
                .accuracy_decimals(2)
                .state_class("measurement"),
        )
        .unwrap();
        let path = ConfigPath::root().field("sensor").index(0);

        let node = validate(
            &ConfigNode::from_json(&json!({ "name": "Outdoor" }), &path).unwrap(),
            &schema,
            &path,
        )
        .unwrap();

        assert_eq!(node.get_i64("accuracy_decimals"), Some(2));
        assert_eq!(node.get_str("state_class"), Some("measurement"));
        assert_eq!(node.get_str("unit_of_measurement"), Some(""));
        assert_eq!(node.get_bool("internal"), Some(false));
        assert!(!node.contains("expire_after"));
        assert_eq!(
            node.get_id("id").and_then(|id| id.base.as_deref()),
            Some("sensor")
        );
    }

    #[test]
    fn invalid_state_class() {
        let error = sensor_schema(SensorOptions::new("Sensor").state_class("sometimes")).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Registry);
        assert!(error.caused_by(ConfigErrorKind::SchemaConflict));
    }
}

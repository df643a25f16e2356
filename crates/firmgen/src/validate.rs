//! Validation of raw configuration nodes against a [`Schema`].
//!
//! The validator never stops at the first problem: every field of every
//! nested node is checked and all errors are returned together, each one
//! carrying the [`ConfigPath`] of the offending value.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{Error, ErrorKind, Errors};
use crate::fields::{Field, FieldKind};
use crate::id::{IdRef, validate_id_name};
use crate::path::ConfigPath;
use crate::schema::{Constraint, Schema};
use crate::value::{ConfigNode, ConfigValue, describe};

// Truthy and falsy spellings accepted for booleans.
const TRUE_VALUES: &[&str] = &["true", "yes", "on", "enable"];
const FALSE_VALUES: &[&str] = &["false", "no", "off", "disable"];

// Time units along with their length in milliseconds.
const TIME_UNITS: &[(&str, f64)] = &[
    ("us", 0.001),
    ("ms", 1.),
    ("s", 1_000.),
    ("sec", 1_000.),
    ("min", 60_000.),
    ("h", 3_600_000.),
    ("d", 86_400_000.),
];

/// Validates `raw` against `schema`, producing a normalized node located at
/// `path`.
///
/// Absent optional fields are filled with their defaults, an absent
/// identifier declaration becomes a request for an automatic identifier,
/// and present values are converted to their normalized form. Cross-field
/// constraints are checked only once every field is valid.
///
/// Validating an already-normalized node again yields the same node.
///
/// # Errors
///
/// Returns every missing, invalid and unknown field, plus every violated
/// constraint.
pub fn validate(raw: &ConfigNode, schema: &Schema, path: &ConfigPath) -> Result<ConfigNode, Errors> {
    let mut errors = Errors::new();
    let mut normalized = ConfigNode::new(path.clone());

    for (name, field) in schema.fields() {
        match raw.get(name).filter(|value| **value != ConfigValue::Null) {
            Some(value) => match convert(&field.kind, value, &path.field(name), name) {
                Ok(value) => normalized.add(&**name, value),
                Err(e) => errors.append(e),
            },
            None => match absent_value(field, path, name) {
                Ok(Some(value)) => normalized.add(&**name, value),
                Ok(None) => {}
                Err(e) => errors.push(e),
            },
        }
    }

    for key in raw.keys() {
        if schema.field(key).is_none() {
            errors.push(Error::unknown_field(path, key));
        }
    }

    if errors.is_empty() {
        for constraint in schema.constraints() {
            if let Err(e) = check_constraint(constraint, &normalized, path) {
                errors.push(e);
            }
        }
    }

    errors.into_result(normalized)
}

fn absent_value(field: &Field, path: &ConfigPath, name: &str) -> Result<Option<ConfigValue>, Error> {
    if field.required {
        return Err(Error::missing_field(path, name));
    }

    if let Some(default) = &field.default {
        return Ok(Some(default.clone()));
    }

    Ok(match &field.kind {
        FieldKind::DeclareId { type_name, base } => Some(ConfigValue::Id(IdRef::automatic(
            type_name.clone(),
            base.clone(),
        ))),
        _ => None,
    })
}

/// Converts a single value to the normalized form of `kind`.
///
/// `path` is the location of the value itself, which is where errors are
/// reported, and `name` the field it belongs to.
///
/// # Errors
///
/// Returns all the errors found in the value, nested values included.
pub fn convert(
    kind: &FieldKind,
    value: &ConfigValue,
    path: &ConfigPath,
    name: &str,
) -> Result<ConfigValue, Errors> {
    let invalid = |reason: String| -> Errors {
        Error::invalid_value(path, name, &reason).into()
    };

    match kind {
        FieldKind::Boolean => boolean(value).ok_or_else(|| {
            invalid(format!("expected a boolean, found {}", describe(value)))
        }),
        FieldKind::Integer { min, max } => {
            let v = integer(value)
                .ok_or_else(|| invalid(format!("expected an integer, found {}", describe(value))))?;
            if v < *min || v > *max {
                return Err(invalid(format!("{v} is outside the range [{min}, {max}]")));
            }
            Ok(ConfigValue::Integer(v))
        }
        FieldKind::Float { min, max } => {
            let v = float(value)
                .ok_or_else(|| invalid(format!("expected a number, found {}", describe(value))))?;
            if v < *min || v > *max {
                return Err(invalid(format!("{v} is outside the range [{min}, {max}]")));
            }
            Ok(ConfigValue::Float(v))
        }
        FieldKind::String => match value {
            ConfigValue::String(v) => Ok(ConfigValue::String(v.clone())),
            ConfigValue::Integer(v) => Ok(ConfigValue::String(v.to_string())),
            ConfigValue::Float(v) => Ok(ConfigValue::String(v.to_string())),
            ConfigValue::Bool(v) => Ok(ConfigValue::String(v.to_string())),
            other => Err(invalid(format!("expected a string, found {}", describe(other)))),
        },
        FieldKind::OneOf { options } => {
            let text = match value {
                ConfigValue::String(v) => v.clone(),
                ConfigValue::Integer(v) => v.to_string(),
                other => {
                    return Err(invalid(format!(
                        "expected one of {}, found {}",
                        join(options.iter().map(AsRef::as_ref)),
                        describe(other)
                    )));
                }
            };
            options
                .iter()
                .find(|option| option.eq_ignore_ascii_case(&text))
                .map(|option| ConfigValue::String(option.to_string()))
                .ok_or_else(|| {
                    invalid(format!(
                        "`{text}` is not one of {}",
                        join(options.iter().map(AsRef::as_ref))
                    ))
                })
        }
        FieldKind::TimePeriod => time_period(value).map(ConfigValue::TimePeriod).map_err(invalid),
        FieldKind::DeclareId { type_name, base } => match value {
            ConfigValue::String(v) => {
                validate_id_name(v).map_err(invalid)?;
                Ok(ConfigValue::Id(IdRef::explicit(v.clone(), type_name.clone())))
            }
            ConfigValue::Id(id) if id.declaration => {
                let mut id = id.clone();
                id.type_name = type_name.clone();
                if id.name.is_none() {
                    id.base = base.clone();
                }
                Ok(ConfigValue::Id(id))
            }
            other => Err(invalid(format!("expected an id, found {}", describe(other)))),
        },
        FieldKind::UseId { type_name } => match value {
            ConfigValue::String(v) => {
                validate_id_name(v).map_err(invalid)?;
                Ok(ConfigValue::Id(IdRef::reference(v.clone(), type_name.clone())))
            }
            ConfigValue::Id(id) if !id.declaration => Ok(ConfigValue::Id(id.clone())),
            other => Err(invalid(format!(
                "expected a reference to an id, found {}",
                describe(other)
            ))),
        },
        FieldKind::Nested { schema } => match value {
            ConfigValue::Node(node) => validate(node, schema, path).map(ConfigValue::Node),
            other => Err(invalid(format!("expected a mapping, found {}", describe(other)))),
        },
        FieldKind::SequenceOf { item } => {
            let items: &[ConfigValue] = match value {
                ConfigValue::Sequence(items) => items,
                single => core::slice::from_ref(single),
            };

            let mut errors = Errors::new();
            let mut normalized = Vec::with_capacity(items.len());
            for (index, item_value) in items.iter().enumerate() {
                match convert(item, item_value, &path.index(index), name) {
                    Ok(v) => normalized.push(v),
                    Err(e) => errors.append(e),
                }
            }
            errors.into_result(ConfigValue::Sequence(normalized))
        }
        FieldKind::Custom { check, .. } => check.check(value).map_err(invalid),
    }
}

fn check_constraint(
    constraint: &Constraint,
    node: &ConfigNode,
    path: &ConfigPath,
) -> Result<(), Error> {
    let violation = |description: String| {
        Error::new(ErrorKind::ConstraintViolation, description).at(path.clone())
    };

    match constraint {
        Constraint::Requires { field, requires } => {
            if node.contains(field) && !node.contains(requires) {
                return Err(violation(format!("`{field}` requires `{requires}`")));
            }
        }
        Constraint::Exclusive(fields) => {
            if present(node, fields) > 1 {
                return Err(violation(format!(
                    "at most one of {} may be set",
                    join(fields.iter().map(AsRef::as_ref))
                )));
            }
        }
        Constraint::AtLeastOne(fields) => {
            if present(node, fields) == 0 {
                return Err(violation(format!(
                    "at least one of {} must be set",
                    join(fields.iter().map(AsRef::as_ref))
                )));
            }
        }
        Constraint::ExactlyOne(fields) => {
            if present(node, fields) != 1 {
                return Err(violation(format!(
                    "exactly one of {} must be set",
                    join(fields.iter().map(AsRef::as_ref))
                )));
            }
        }
        Constraint::Inclusive(fields) => {
            let count = present(node, fields);
            if count != 0 && count != fields.len() {
                return Err(violation(format!(
                    "either none or all of {} must be set",
                    join(fields.iter().map(AsRef::as_ref))
                )));
            }
        }
    }
    Ok(())
}

fn present(node: &ConfigNode, fields: &[alloc::borrow::Cow<'static, str>]) -> usize {
    fields.iter().filter(|field| node.contains(field)).count()
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<String> = names.map(|name| format!("`{name}`")).collect();
    names.join(", ")
}

fn boolean(value: &ConfigValue) -> Option<ConfigValue> {
    match value {
        ConfigValue::Bool(v) => Some(ConfigValue::Bool(*v)),
        ConfigValue::String(v) => {
            let v = v.to_ascii_lowercase();
            if TRUE_VALUES.contains(&v.as_str()) {
                Some(ConfigValue::Bool(true))
            } else if FALSE_VALUES.contains(&v.as_str()) {
                Some(ConfigValue::Bool(false))
            } else {
                None
            }
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integer(value: &ConfigValue) -> Option<i64> {
    match value {
        ConfigValue::Integer(v) => Some(*v),
        ConfigValue::Float(v) if v.fract() == 0. && v.is_finite() => Some(*v as i64),
        ConfigValue::String(v) => v.trim().parse().ok(),
        _ => None,
    }
}

fn float(value: &ConfigValue) -> Option<f64> {
    match value {
        ConfigValue::String(v) => v.trim().parse().ok(),
        other => other.as_f64(),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn time_period(value: &ConfigValue) -> Result<u64, String> {
    match value {
        ConfigValue::TimePeriod(millis) => Ok(*millis),
        ConfigValue::Integer(millis) => u64::try_from(*millis)
            .map_err(|_| format!("{millis} is not a positive duration")),
        ConfigValue::String(text) => {
            let text = text.trim();
            let split = text
                .find(|c: char| c.is_ascii_alphabetic())
                .ok_or_else(|| format!("`{text}` lacks a time unit"))?;
            let (amount, unit) = text.split_at(split);

            let amount: f64 = amount
                .trim()
                .parse()
                .map_err(|_| format!("`{text}` is not a duration"))?;
            if amount < 0. || !amount.is_finite() {
                return Err(format!("`{text}` is not a positive duration"));
            }

            let (_, scale) = TIME_UNITS
                .iter()
                .find(|(name, _)| *name == unit.trim())
                .ok_or_else(|| format!("`{unit}` is not a time unit"))?;

            Ok((amount * scale).round() as u64)
        }
        other => Err(format!("expected a duration, found {}", describe(other))),
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::fields::{CustomCheck, FieldKind, Fields};
    use crate::id::IdRef;
    use crate::path::ConfigPath;
    use crate::schema::{Constraint, Schema};
    use crate::value::{ConfigNode, ConfigValue};

    use super::validate;

    fn sensor_path() -> ConfigPath {
        ConfigPath::root().field("sensor").index(0)
    }

    fn raw(value: serde_json::Value) -> ConfigNode {
        ConfigNode::from_json(&value, &sensor_path()).unwrap()
    }

    fn sensor_schema() -> Schema {
        Schema::from_fields(
            "sensor",
            Fields::new()
                .declare_id_with_base("ExampleSensor", "sensor")
                .required("name", FieldKind::String)
                .integer_with_limits("accuracy_decimals", 2, -1, 6)
                .optional_with_default(
                    "state_class",
                    FieldKind::one_of(["", "measurement", "total_increasing"]),
                    "",
                )
                .time_period("update_interval", "60s")
                .boolean("internal", false),
        )
        .unwrap()
    }

    #[test]
    fn defaults_and_automatic_id() {
        let schema = Schema::from_fields(
            "sensor",
            Fields::new()
                .declare_id_with_base("ExampleSensor", "sensor")
                .integer_with_limits("accuracy_decimals", 2, -1, 6),
        )
        .unwrap();

        let normalized = validate(&raw(json!({})), &schema, &sensor_path()).unwrap();

        assert_eq!(
            normalized,
            ConfigNode::new(sensor_path())
                .insert(
                    "id",
                    ConfigValue::Id(IdRef::automatic("ExampleSensor", Some("sensor".into())))
                )
                .insert("accuracy_decimals", 2_i64)
        );
    }

    #[test]
    fn conversions() {
        let normalized = validate(
            &raw(json!({
                "id": "outdoor",
                "name": 42,
                "accuracy_decimals": "3",
                "state_class": "MEASUREMENT",
                "update_interval": "1.5min",
                "internal": "yes",
            })),
            &sensor_schema(),
            &sensor_path(),
        )
        .unwrap();

        assert_eq!(
            normalized.get_id("id"),
            Some(&IdRef::explicit("outdoor", "ExampleSensor"))
        );
        assert_eq!(normalized.get_str("name"), Some("42"));
        assert_eq!(normalized.get_i64("accuracy_decimals"), Some(3));
        assert_eq!(normalized.get_str("state_class"), Some("measurement"));
        assert_eq!(
            normalized.get("update_interval"),
            Some(&ConfigValue::TimePeriod(90_000))
        );
        assert_eq!(normalized.get_bool("internal"), Some(true));
    }

    #[test]
    fn all_errors_are_collected() {
        let errors = validate(
            &raw(json!({
                "accuracy_decimals": 12,
                "state_class": "sometimes",
                "update_interval": "soon",
                "nmae": "typo",
            })),
            &sensor_schema(),
            &sensor_path(),
        )
        .unwrap_err();

        let kinds: alloc::vec::Vec<_> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorKind::MissingField,
                ErrorKind::InvalidValue,
                ErrorKind::InvalidValue,
                ErrorKind::InvalidValue,
                ErrorKind::UnknownField,
            ]
        );
        let paths: alloc::vec::Vec<_> = errors
            .iter()
            .map(|e| alloc::format!("{}", e.path().unwrap()))
            .collect();
        assert_eq!(
            paths,
            vec![
                "sensor[0]",
                "sensor[0].accuracy_decimals",
                "sensor[0].state_class",
                "sensor[0].update_interval",
                "sensor[0]",
            ]
        );
    }

    #[test]
    fn validation_is_idempotent() {
        let schema = sensor_schema();
        let first = validate(
            &raw(json!({ "name": "Outdoor", "update_interval": "10s" })),
            &schema,
            &sensor_path(),
        )
        .unwrap();

        let second = validate(&first, &schema, &sensor_path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nested_paths() {
        let filter = Schema::from_fields(
            "filter",
            Fields::new().required("multiply", FieldKind::float()),
        )
        .unwrap();
        let schema = Schema::from_fields(
            "sensor",
            Fields::new()
                .optional("filters", FieldKind::sequence_of(FieldKind::nested(filter)))
                .optional("pins", FieldKind::sequence_of(FieldKind::Integer { min: 0, max: 39 })),
        )
        .unwrap();

        let errors = validate(
            &raw(json!({
                "filters": [ { "multiply": 2 }, { "offset": 1 } ],
                "pins": [ 4, 40 ],
            })),
            &schema,
            &sensor_path(),
        )
        .unwrap_err();

        let located: alloc::vec::Vec<_> = errors
            .iter()
            .map(|e| (e.kind(), alloc::format!("{}", e.path().unwrap())))
            .collect();
        assert_eq!(
            located,
            vec![
                (ErrorKind::MissingField, "sensor[0].filters[1]".into()),
                (ErrorKind::UnknownField, "sensor[0].filters[1]".into()),
                (ErrorKind::InvalidValue, "sensor[0].pins[1]".into()),
            ]
        );

        // A single value is accepted as a one element sequence.
        let normalized = validate(&raw(json!({ "pins": 4 })), &schema, &sensor_path()).unwrap();
        assert_eq!(
            normalized.get("pins"),
            Some(&ConfigValue::Sequence(vec![ConfigValue::Integer(4)]))
        );
    }

    #[test]
    fn identifiers() {
        let schema = Schema::from_fields(
            "sensor",
            Fields::new()
                .declare_id("ExampleSensor")
                .use_id("parent", "ExampleComponent"),
        )
        .unwrap();

        let normalized = validate(
            &raw(json!({ "parent": "hub" })),
            &schema,
            &sensor_path(),
        )
        .unwrap();
        assert_eq!(
            normalized.get_id("parent"),
            Some(&IdRef::reference("hub", "ExampleComponent"))
        );

        let errors = validate(
            &raw(json!({ "id": "App", "parent": "not an id" })),
            &schema,
            &sensor_path(),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::InvalidValue));
    }

    #[test]
    fn constraints() {
        let schema = Schema::from_fields(
            "uart",
            Fields::new()
                .optional("tx_pin", FieldKind::integer())
                .optional("rx_pin", FieldKind::integer())
                .optional("rx_buffer_size", FieldKind::integer()),
        )
        .unwrap()
        .constraint(Constraint::at_least_one(["tx_pin", "rx_pin"]))
        .unwrap()
        .constraint(Constraint::requires("rx_buffer_size", "rx_pin"))
        .unwrap();

        let path = ConfigPath::root().field("uart");
        let node = |value| ConfigNode::from_json(&value, &path).unwrap();

        assert!(validate(&node(json!({ "tx_pin": 1 })), &schema, &path).is_ok());

        let errors = validate(&node(json!({})), &schema, &path).unwrap_err();
        assert!(errors.contains_kind(ErrorKind::ConstraintViolation));

        let errors = validate(
            &node(json!({ "tx_pin": 1, "rx_buffer_size": 256 })),
            &schema,
            &path,
        )
        .unwrap_err();
        assert!(errors.contains_kind(ErrorKind::ConstraintViolation));

        // Constraints are not checked while fields are invalid.
        let errors = validate(&node(json!({ "tx_pin": "x" })), &schema, &path).unwrap_err();
        assert!(!errors.contains_kind(ErrorKind::ConstraintViolation));
    }

    #[test]
    fn custom_check() {
        let gpio = CustomCheck::new(|value| match value {
            ConfigValue::String(pin) if pin.starts_with("GPIO") => pin[4..]
                .parse::<i64>()
                .map(ConfigValue::Integer)
                .map_err(|_| alloc::format!("`{pin}` is not a pin")),
            ConfigValue::Integer(pin) => Ok(ConfigValue::Integer(*pin)),
            _ => Err("expected a pin".into()),
        });
        let schema = Schema::from_fields(
            "output",
            Fields::new().required("pin", FieldKind::custom("pin", gpio)),
        )
        .unwrap();

        let normalized = validate(&raw(json!({ "pin": "GPIO12" })), &schema, &sensor_path()).unwrap();
        assert_eq!(normalized.get_i64("pin"), Some(12));

        let errors = validate(&raw(json!({ "pin": "D3" })), &schema, &sensor_path()).unwrap_err();
        assert!(errors.contains_kind(ErrorKind::InvalidValue));
    }
}

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::DefaultHashBuilder;

use indexmap::map::{IndexMap, Iter, Keys};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{Error, ErrorKind, Errors};
use crate::id::IdRef;
use crate::path::ConfigPath;

/// A configuration value, either raw or normalized.
///
/// Raw values come straight from the document and only use the scalar,
/// [`ConfigValue::Node`] and [`ConfigValue::Sequence`] variants. The
/// validator additionally produces [`ConfigValue::Id`] and
/// [`ConfigValue::TimePeriod`] values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// An explicit empty value.
    Null,
    /// A [`bool`] value.
    Bool(bool),
    /// An [`i64`] value.
    Integer(i64),
    /// A [`f64`] value.
    Float(f64),
    /// A characters sequence.
    String(String),
    /// A nested mapping.
    Node(ConfigNode),
    /// A sequence of values.
    Sequence(Vec<ConfigValue>),
    /// An identifier declaration or reference.
    Id(IdRef),
    /// A duration, in milliseconds.
    TimePeriod(u64),
}

impl ConfigValue {
    /// Converts a `json` value into a raw [`ConfigValue`].
    ///
    /// Nested objects become [`ConfigNode`]s located at `path`.
    #[must_use]
    pub fn from_json(value: &serde_json::Value, path: &ConfigPath) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(v) => Self::Bool(*v),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(v) => Self::Integer(v),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(v) => Self::String(v.clone()),
            serde_json::Value::Array(values) => Self::Sequence(
                values
                    .iter()
                    .enumerate()
                    .map(|(index, value)| Self::from_json(value, &path.index(index)))
                    .collect(),
            ),
            serde_json::Value::Object(_) => Self::Node(ConfigNode::from_json_unchecked(value, path)),
        }
    }

    /// Returns the name of the value type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Node(_) => "mapping",
            Self::Sequence(_) => "sequence",
            Self::Id(_) => "id",
            Self::TimePeriod(_) => "time period",
        }
    }

    /// Returns the value as a [`bool`], if it is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as an [`i64`], if it is one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a [`f64`].
    ///
    /// Integers are widened.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the value as a [`&str`], if it is a characters sequence.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as an [`IdRef`], if it is one.
    #[must_use]
    pub const fn as_id(&self) -> Option<&IdRef> {
        match self {
            Self::Id(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value as a [`ConfigNode`], if it is a mapping.
    #[must_use]
    pub const fn as_node(&self) -> Option<&ConfigNode> {
        match self {
            Self::Node(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the duration in milliseconds, if the value is a time period.
    #[must_use]
    pub const fn as_millis(&self) -> Option<u64> {
        match self {
            Self::TimePeriod(v) => Some(*v),
            _ => None,
        }
    }

    fn visit_ids<'a>(&'a self, path: &ConfigPath, visitor: &mut impl FnMut(&ConfigPath, &'a IdRef)) {
        match self {
            Self::Id(id) => visitor(path, id),
            Self::Node(node) => node.visit_ids(visitor),
            Self::Sequence(values) => {
                for (index, value) in values.iter().enumerate() {
                    value.visit_ids(&path.index(index), visitor);
                }
            }
            _ => {}
        }
    }

    fn visit_ids_mut(&mut self, path: &ConfigPath, visitor: &mut impl FnMut(&ConfigPath, &mut IdRef)) {
        match self {
            Self::Id(id) => visitor(path, id),
            Self::Node(node) => node.visit_ids_mut(visitor),
            Self::Sequence(values) => {
                for (index, value) in values.iter_mut().enumerate() {
                    value.visit_ids_mut(&path.index(index), visitor);
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<ConfigNode> for ConfigValue {
    fn from(value: ConfigNode) -> Self {
        Self::Node(value)
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Node(node) => node.serialize(serializer),
            Self::Sequence(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
            Self::Id(id) => match &id.name {
                Some(name) => serializer.serialize_str(name),
                None => serializer.serialize_unit(),
            },
            Self::TimePeriod(millis) => serializer.collect_str(&format_args!("{millis}ms")),
        }
    }
}

/// An ordered mapping from field names to [`ConfigValue`]s.
///
/// Every node remembers the [`ConfigPath`] it was read from so that errors
/// can point back to the document. Two nodes are equal when their entries
/// are equal, regardless of their location.
#[derive(Debug, Clone)]
pub struct ConfigNode {
    path: ConfigPath,
    entries: IndexMap<String, ConfigValue, DefaultHashBuilder>,
}

impl PartialEq for ConfigNode {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<'a> IntoIterator for &'a ConfigNode {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl ConfigNode {
    /// Creates an empty [`ConfigNode`] located at `path`.
    #[must_use]
    #[inline]
    pub fn new(path: ConfigPath) -> Self {
        Self {
            path,
            entries: IndexMap::with_hasher(DefaultHashBuilder::default()),
        }
    }

    /// Converts a `json` object into a raw [`ConfigNode`].
    ///
    /// `null` becomes an empty node.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Syntax`] when the value is neither an
    /// object nor `null`.
    pub fn from_json(value: &serde_json::Value, path: &ConfigPath) -> Result<Self, Error> {
        match value {
            serde_json::Value::Object(_) | serde_json::Value::Null => {
                Ok(Self::from_json_unchecked(value, path))
            }
            other => Err(Error::new(
                ErrorKind::Syntax,
                format!("expected a mapping, found `{other}`"),
            )
            .at(path.clone())),
        }
    }

    fn from_json_unchecked(value: &serde_json::Value, path: &ConfigPath) -> Self {
        let mut node = Self::new(path.clone());
        if let serde_json::Value::Object(object) = value {
            for (key, value) in object {
                node.add(key.clone(), ConfigValue::from_json(value, &path.field(key)));
            }
        }
        node
    }

    /// Inserts a value, returning the updated node.
    #[must_use]
    #[inline]
    pub fn insert(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Adds a value.
    #[inline]
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns the [`ConfigPath`] of this node.
    #[must_use]
    #[inline]
    pub const fn path(&self) -> &ConfigPath {
        &self.path
    }

    /// Retrieves a value by key.
    #[must_use]
    #[inline]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    /// Checks whether a key is present.
    #[must_use]
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Retrieves a [`bool`] value.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ConfigValue::as_bool)
    }

    /// Retrieves an [`i64`] value.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ConfigValue::as_i64)
    }

    /// Retrieves a [`f64`] value.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ConfigValue::as_f64)
    }

    /// Retrieves a characters sequence.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    /// Retrieves an [`IdRef`].
    #[must_use]
    pub fn get_id(&self, key: &str) -> Option<&IdRef> {
        self.get(key).and_then(ConfigValue::as_id)
    }

    /// Checks whether the node has no entries.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over all keys in document order.
    #[inline]
    pub fn keys(&self) -> Keys<'_, String, ConfigValue> {
        self.entries.keys()
    }

    /// Iterates over all entries in document order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, String, ConfigValue> {
        self.entries.iter()
    }

    /// Visits every [`IdRef`] contained in this node, nested values
    /// included, together with its location.
    pub fn visit_ids<'a>(&'a self, visitor: &mut impl FnMut(&ConfigPath, &'a IdRef)) {
        for (key, value) in &self.entries {
            value.visit_ids(&self.path.field(key), visitor);
        }
    }

    /// Mutably visits every [`IdRef`] contained in this node, nested
    /// values included, together with its location.
    pub fn visit_ids_mut(&mut self, visitor: &mut impl FnMut(&ConfigPath, &mut IdRef)) {
        for (key, value) in &mut self.entries {
            value.visit_ids_mut(&self.path.field(key), visitor);
        }
    }

    /// Collects the names of all identifiers referenced, and not declared,
    /// by this node.
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit_ids(&mut |_, id| {
            if !id.declaration {
                if let Some(name) = &id.name {
                    names.push(name.clone());
                }
            }
        });
        names
    }

    /// Collects the names of all identifiers declared by this node.
    ///
    /// Declarations still waiting for an automatic name are skipped.
    #[must_use]
    pub fn declarations(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit_ids(&mut |_, id| {
            if id.declaration {
                if let Some(name) = &id.name {
                    names.push(name.clone());
                }
            }
        });
        names
    }
}

impl Serialize for ConfigNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A configuration document.
///
/// Maps every component kind to the raw nodes of its instances, in
/// document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration(IndexMap<String, Vec<ConfigNode>, DefaultHashBuilder>);

impl Configuration {
    /// Creates an empty [`Configuration`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self(IndexMap::with_hasher(DefaultHashBuilder::default()))
    }

    /// Reads a [`Configuration`] from a `json` document.
    ///
    /// A kind mapped to an object, `null` or `{}` declares one instance;
    /// a kind mapped to a list declares one instance per element.
    ///
    /// # Errors
    ///
    /// All shape problems of the document are returned together.
    pub fn from_json(document: &serde_json::Value) -> Result<Self, Errors> {
        let serde_json::Value::Object(kinds) = document else {
            return Err(Error::new(
                ErrorKind::Syntax,
                "a configuration document must be a mapping of component kinds",
            )
            .into());
        };

        let mut configuration = Self::new();
        let mut errors = Errors::new();

        for (kind, value) in kinds {
            let path = ConfigPath::root().field(kind);
            let mut nodes = Vec::new();
            match value {
                serde_json::Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        match ConfigNode::from_json(item, &path.index(index)) {
                            Ok(node) => nodes.push(node),
                            Err(e) => errors.push(e),
                        }
                    }
                }
                other => match ConfigNode::from_json(other, &path) {
                    Ok(node) => nodes.push(node),
                    Err(e) => errors.push(e),
                },
            }
            configuration.0.insert(kind.clone(), nodes);
        }

        errors.into_result(configuration)
    }

    /// Parses a [`Configuration`] from `json` text.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::Syntax`] on malformed text, otherwise as
    /// [`Configuration::from_json`].
    pub fn from_json_str(text: &str) -> Result<Self, Errors> {
        let document: serde_json::Value = serde_json::from_str(text).map_err(Error::from)?;
        Self::from_json(&document)
    }

    /// Adds an instance of the given kind.
    #[inline]
    pub fn add(&mut self, kind: impl Into<String>, node: ConfigNode) {
        self.0.entry(kind.into()).or_default().push(node);
    }

    /// Iterates over all kinds together with their instances.
    #[inline]
    pub fn iter(&self) -> Iter<'_, String, Vec<ConfigNode>> {
        self.0.iter()
    }

    /// Returns the instances of a kind.
    #[must_use]
    pub fn instances(&self, kind: &str) -> &[ConfigNode] {
        self.0.get(kind).map_or(&[], Vec::as_slice)
    }

    /// Checks whether the document contains no kinds.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub(crate) fn describe(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(v) => format!("`{v}`"),
        ConfigValue::Integer(v) => v.to_string(),
        ConfigValue::Float(v) => v.to_string(),
        ConfigValue::Bool(v) => v.to_string(),
        other => format!("a {}", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use serde_json::json;

    use crate::error::ErrorKind;
    use crate::id::IdRef;
    use crate::path::ConfigPath;

    use super::{ConfigNode, ConfigValue, Configuration};

    #[test]
    fn configuration_from_json() {
        let configuration = Configuration::from_json(&json!({
            "example_component": null,
            "sensor": [
                { "name": "first" },
                { "name": "second", "accuracy_decimals": 3 },
            ],
        }))
        .unwrap();

        assert_eq!(configuration.instances("example_component").len(), 1);
        assert!(configuration.instances("example_component")[0].is_empty());

        let sensors = configuration.instances("sensor");
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[1].path().to_string(), "sensor[1]");
        assert_eq!(sensors[1].get_i64("accuracy_decimals"), Some(3));
        assert_eq!(sensors[0].get_str("name"), Some("first"));

        assert!(configuration.instances("light").is_empty());
    }

    #[cfg(feature = "preserve_order")]
    #[test]
    fn configuration_keeps_document_order() {
        let configuration = Configuration::from_json(&json!({
            "zeta": {},
            "alpha": { "b": 1, "a": 2 },
        }))
        .unwrap();

        let kinds: vec::Vec<&str> = configuration.iter().map(|(kind, _)| kind.as_str()).collect();
        assert_eq!(kinds, ["zeta", "alpha"]);

        let keys: vec::Vec<&str> = configuration.instances("alpha")[0]
            .keys()
            .map(alloc::string::String::as_str)
            .collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn configuration_shape_errors() {
        let errors = Configuration::from_json(&json!({
            "sensor": [ 1, { "name": "ok" }, "nope" ],
            "example_component": true,
        }))
        .unwrap_err();

        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::Syntax));

        let errors = Configuration::from_json_str("{ not json").unwrap_err();
        assert!(errors.contains_kind(ErrorKind::Syntax));

        let errors = Configuration::from_json(&json!([1, 2])).unwrap_err();
        assert!(errors.contains_kind(ErrorKind::Syntax));
    }

    #[test]
    fn node_identifiers() {
        let path = ConfigPath::root().field("sensor").index(0);
        let node = ConfigNode::new(path.clone())
            .insert("id", ConfigValue::Id(IdRef::explicit("outdoor", "Sensor")))
            .insert(
                "targets",
                ConfigValue::Sequence(vec![
                    ConfigValue::Id(IdRef::reference("hub", "Hub")),
                    ConfigValue::Id(IdRef::reference("relay", "Relay")),
                ]),
            );

        assert_eq!(node.declarations(), vec!["outdoor".to_string()]);
        assert_eq!(
            node.references(),
            vec!["hub".to_string(), "relay".to_string()]
        );

        let mut paths = vec![];
        node.visit_ids(&mut |path, _| paths.push(path.to_string()));
        assert_eq!(
            paths,
            vec!["sensor[0].id", "sensor[0].targets[0]", "sensor[0].targets[1]"]
        );
    }

    #[test]
    fn serialize_normalized_node() {
        let node = ConfigNode::new(ConfigPath::root())
            .insert("id", ConfigValue::Id(IdRef::explicit("outdoor", "Sensor")))
            .insert("update_interval", ConfigValue::TimePeriod(60_000))
            .insert("accuracy_decimals", 2_i64);

        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({
                "id": "outdoor",
                "update_interval": "60000ms",
                "accuracy_decimals": 2,
            })
        );
    }
}

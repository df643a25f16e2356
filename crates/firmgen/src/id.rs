use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;

use hashbrown::DefaultHashBuilder;

use indexmap::{IndexMap, IndexSet};

use serde::Serialize;

use crate::error::{Error, ErrorKind, Errors, Result};
use crate::path::ConfigPath;
use crate::value::ConfigNode;

/// Names which can never be handed out as identifiers.
///
/// They collide with the generated translation unit or with the native
/// language itself.
pub const RESERVED_IDS: &[&str] = &[
    "App", "setup", "loop", "main", "auto", "bool", "break", "case", "char", "class", "const",
    "continue", "default", "delete", "do", "double", "else", "enum", "extern", "false", "float",
    "for", "goto", "if", "inline", "int", "long", "namespace", "new", "nullptr", "operator",
    "private", "protected", "public", "return", "short", "signed", "sizeof", "static", "struct",
    "switch", "template", "this", "true", "typedef", "union", "unsigned", "using", "virtual",
    "void", "volatile", "while",
];

/// Checks whether `name` is a valid, non reserved, native identifier.
///
/// # Errors
///
/// Returns the reason why the name is rejected.
pub fn validate_id_name(name: &str) -> core::result::Result<(), String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err("an id must not be empty".into());
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(format!(
            "`{name}` must start with a letter or an underscore"
        ));
    }

    if let Some(c) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!("`{name}` contains the invalid character `{c}`"));
    }

    if RESERVED_IDS.contains(&name) {
        return Err(format!("`{name}` is a reserved name"));
    }

    Ok(())
}

/// Derives the automatic base name of a native type.
///
/// Only the last `::` segment is kept and converted to `snake_case`, so
/// `example_component::ExampleSensor` becomes `example_sensor`.
#[must_use]
pub fn base_name(type_name: &str) -> String {
    let last = type_name.rsplit("::").next().unwrap_or(type_name);
    let chars: alloc::vec::Vec<char> = last.chars().collect();

    let mut name = String::with_capacity(last.len() + 4);
    for (position, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let previous = position.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(position + 1);
            let boundary = previous.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
                || (previous.is_some_and(|p| p.is_ascii_uppercase())
                    && next.is_some_and(char::is_ascii_lowercase));
            if boundary && !name.ends_with('_') {
                name.push('_');
            }
            name.push(c.to_ascii_lowercase());
        } else if c.is_ascii_alphanumeric() {
            name.push(*c);
        } else if !name.ends_with('_') {
            name.push('_');
        }
    }

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// A symbolic handle used in generated code.
///
/// Identifiers are owned by the [`IdAllocator`] of a generation run;
/// configuration nodes and emitted statements only refer to them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identifier {
    name: String,
    type_name: Cow<'static, str>,
    is_pointer: bool,
}

impl Identifier {
    /// Creates an [`Identifier`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<Cow<'static, str>>,
        is_pointer: bool,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            is_pointer,
        }
    }

    /// Returns the identifier name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared native type.
    #[must_use]
    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Whether the identifier names a pointer.
    #[must_use]
    #[inline]
    pub const fn is_pointer(&self) -> bool {
        self.is_pointer
    }
}

impl core::fmt::Display for Identifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.name.fmt(f)
    }
}

/// An identifier slot inside a normalized configuration.
///
/// A declaration introduces a new identifier, possibly waiting for an
/// automatic name. A reference points to an identifier declared elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRef {
    /// The identifier name, [`None`] until an automatic name is assigned.
    pub name: Option<String>,
    /// The expected native type.
    pub type_name: Cow<'static, str>,
    /// The preferred base for automatic names.
    pub base: Option<Cow<'static, str>>,
    /// Whether this slot declares the identifier.
    pub declaration: bool,
}

impl IdRef {
    /// Creates a declaration waiting for an automatic name.
    #[must_use]
    pub fn automatic(
        type_name: impl Into<Cow<'static, str>>,
        base: Option<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: None,
            type_name: type_name.into(),
            base,
            declaration: true,
        }
    }

    /// Creates a declaration with a user-chosen name.
    #[must_use]
    pub fn explicit(name: impl Into<String>, type_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            type_name: type_name.into(),
            base: None,
            declaration: true,
        }
    }

    /// Creates a reference to an identifier declared elsewhere.
    #[must_use]
    pub fn reference(name: impl Into<String>, type_name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: Some(name.into()),
            type_name: type_name.into(),
            base: None,
            declaration: false,
        }
    }

    /// Checks whether a name has been assigned.
    #[must_use]
    #[inline]
    pub const fn is_resolved(&self) -> bool {
        self.name.is_some()
    }
}

/// The identifier table of a generation run.
///
/// Identifiers are unique within a run: colliding names get a monotonic
/// suffix (`name`, `name_2`, `name_3`, ...). Allocations are memoized by
/// the [`ConfigPath`] of the requesting node, so asking twice for the same
/// location returns the same [`Identifier`].
#[derive(Debug, Default)]
pub struct IdAllocator {
    by_name: IndexMap<String, Identifier, DefaultHashBuilder>,
    by_path: IndexMap<ConfigPath, Identifier, DefaultHashBuilder>,
    extra_reserved: IndexSet<String, DefaultHashBuilder>,
}

impl IdAllocator {
    /// Creates an empty [`IdAllocator`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an additional name, which will never be allocated.
    #[must_use]
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.extra_reserved.insert(name.into());
        self
    }

    /// Allocates a fresh identifier derived from `base`.
    pub fn allocate(
        &mut self,
        base: &str,
        type_name: impl Into<Cow<'static, str>>,
        is_pointer: bool,
    ) -> Identifier {
        let name = self.unique_name(base);
        let identifier = Identifier::new(name.clone(), type_name, is_pointer);
        self.by_name.insert(name, identifier.clone());
        identifier
    }

    /// Allocates an identifier for the node at `path`, or returns the one
    /// already allocated for it.
    pub fn allocate_for(
        &mut self,
        path: &ConfigPath,
        base: &str,
        type_name: impl Into<Cow<'static, str>>,
        is_pointer: bool,
    ) -> Identifier {
        if let Some(identifier) = self.by_path.get(path) {
            return identifier.clone();
        }

        let identifier = self.allocate(base, type_name, is_pointer);
        self.by_path.insert(path.clone(), identifier.clone());
        identifier
    }

    /// Registers a user-chosen identifier for the node at `path`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::DuplicateId`] when the name is already
    /// taken by another node.
    pub fn declare(
        &mut self,
        path: &ConfigPath,
        name: &str,
        type_name: impl Into<Cow<'static, str>>,
        is_pointer: bool,
    ) -> Result<Identifier> {
        if let Some(identifier) = self.by_path.get(path) {
            if identifier.name() == name {
                return Ok(identifier.clone());
            }
        }

        if self.by_name.contains_key(name) || self.is_reserved(name) {
            return Err(Error::new(
                ErrorKind::DuplicateId,
                format!("the id `{name}` is declared more than once"),
            )
            .at(path.clone()));
        }

        let identifier = Identifier::new(name, type_name, is_pointer);
        self.by_name.insert(name.into(), identifier.clone());
        self.by_path.insert(path.clone(), identifier.clone());
        Ok(identifier)
    }

    /// Retrieves an identifier by name.
    #[must_use]
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<&Identifier> {
        self.by_name.get(name)
    }

    /// Retrieves the identifier allocated for the node at `path`.
    #[must_use]
    #[inline]
    pub fn get(&self, path: &ConfigPath) -> Option<&Identifier> {
        self.by_path.get(path)
    }

    /// Returns the number of allocated identifiers.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Checks whether no identifier has been allocated.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates over all identifiers in allocation order.
    #[inline]
    pub fn iter(&self) -> indexmap::map::Values<'_, String, Identifier> {
        self.by_name.values()
    }

    /// Assigns names to every identifier declaration of `nodes`.
    ///
    /// User-chosen names are registered first, across all nodes, and
    /// automatic names are allocated afterwards in document order, so an
    /// automatic name never takes a name the user spelled out.
    ///
    /// # Errors
    ///
    /// All duplicated declarations are reported together.
    pub fn resolve_declarations<'a, I>(&mut self, nodes: I) -> core::result::Result<(), Errors>
    where
        I: IntoIterator<Item = &'a mut ConfigNode>,
    {
        let mut nodes: alloc::vec::Vec<&'a mut ConfigNode> = nodes.into_iter().collect();
        let mut errors = Errors::new();

        for node in &mut nodes {
            node.visit_ids_mut(&mut |path, id| {
                if !id.declaration {
                    return;
                }
                if let Some(name) = &id.name {
                    if let Err(e) = self.declare(path, name, id.type_name.clone(), true) {
                        errors.push(e);
                    }
                }
            });
        }

        for node in &mut nodes {
            node.visit_ids_mut(&mut |path, id| {
                if !id.declaration || id.name.is_some() {
                    return;
                }
                let base = id
                    .base
                    .as_deref()
                    .map_or_else(|| base_name(&id.type_name), String::from);
                let identifier = self.allocate_for(path, &base, id.type_name.clone(), true);
                id.name = Some(identifier.name.clone());
            });
        }

        errors.into_result(())
    }

    /// Checks that every identifier reference of `node` names a declared
    /// identifier of the expected type.
    ///
    /// # Errors
    ///
    /// Unknown names fail with [`ErrorKind::UnresolvedId`], type
    /// mismatches with [`ErrorKind::InvalidValue`].
    pub fn resolve_references(&self, node: &ConfigNode) -> core::result::Result<(), Errors> {
        let mut errors = Errors::new();

        node.visit_ids(&mut |path, id| {
            if id.declaration {
                return;
            }
            let Some(name) = &id.name else {
                return;
            };
            match self.lookup(name) {
                None => errors.push(
                    Error::new(
                        ErrorKind::UnresolvedId,
                        format!("couldn't find the id `{name}`"),
                    )
                    .at(path.clone()),
                ),
                Some(identifier) if !types_match(identifier.type_name(), &id.type_name) => {
                    errors.push(
                        Error::new(
                            ErrorKind::InvalidValue,
                            format!(
                                "the id `{name}` has type `{}`, expected `{}`",
                                identifier.type_name(),
                                id.type_name
                            ),
                        )
                        .at(path.clone()),
                    );
                }
                Some(_) => {}
            }
        });

        errors.into_result(())
    }

    fn is_reserved(&self, name: &str) -> bool {
        RESERVED_IDS.contains(&name) || self.extra_reserved.contains(name)
    }

    fn is_taken(&self, name: &str) -> bool {
        self.by_name.contains_key(name) || self.is_reserved(name)
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.is_taken(base) {
            return base.into();
        }

        let mut counter: u64 = 1;
        loop {
            counter += 1;
            let candidate = format!("{base}_{counter}");
            if !self.is_taken(&candidate) {
                return candidate;
            }
        }
    }
}

// A reference typed with a bare type name matches a fully qualified
// declaration of the same type.
fn types_match(declared: &str, expected: &str) -> bool {
    declared == expected
        || declared.rsplit("::").next() == expected.rsplit("::").next()
            && (!declared.contains("::") || !expected.contains("::"))
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use crate::error::ErrorKind;
    use crate::path::ConfigPath;
    use crate::value::{ConfigNode, ConfigValue};

    use super::{IdAllocator, IdRef, base_name, validate_id_name};

    #[test]
    fn automatic_base_names() {
        assert_eq!(base_name("example_component::ExampleSensor"), "example_sensor");
        assert_eq!(base_name("ExampleComponent"), "example_component");
        assert_eq!(base_name("HTTPRequest"), "http_request");
        assert_eq!(base_name("Bme280Sensor"), "bme280_sensor");
        assert_eq!(base_name("sensor"), "sensor");
    }

    #[test]
    fn id_names() {
        assert!(validate_id_name("outdoor_temperature").is_ok());
        assert!(validate_id_name("_private").is_ok());
        assert!(validate_id_name("").is_err());
        assert!(validate_id_name("2fast").is_err());
        assert!(validate_id_name("with-dash").is_err());
        assert!(validate_id_name("App").is_err());
        assert!(validate_id_name("class").is_err());
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let mut allocator = IdAllocator::new();

        let first = allocator.allocate("sensor", "Sensor", true);
        let second = allocator.allocate("sensor", "Sensor", true);
        let third = allocator.allocate("sensor", "Sensor", true);

        assert_eq!(first.name(), "sensor");
        assert_eq!(second.name(), "sensor_2");
        assert_eq!(third.name(), "sensor_3");

        // Reserved names are skipped.
        assert_eq!(allocator.allocate("loop", "Loop", false).name(), "loop_2");
    }

    #[test]
    fn allocations_are_memoized_by_path() {
        let mut allocator = IdAllocator::new();
        let path = ConfigPath::root().field("sensor").index(0);

        let first = allocator.allocate_for(&path, "sensor", "Sensor", true);
        let again = allocator.allocate_for(&path, "sensor", "Sensor", true);
        assert_eq!(first, again);
        assert_eq!(allocator.len(), 1);
        assert_eq!(allocator.get(&path), Some(&first));
    }

    #[test]
    fn duplicated_declarations() {
        let mut allocator = IdAllocator::new();
        let sensor = ConfigPath::root().field("sensor");

        assert!(allocator
            .declare(&sensor.index(0).field("id"), "outdoor", "Sensor", true)
            .is_ok());
        // Declaring again at the same location is idempotent.
        assert!(allocator
            .declare(&sensor.index(0).field("id"), "outdoor", "Sensor", true)
            .is_ok());

        let error = allocator
            .declare(&sensor.index(1).field("id"), "outdoor", "Sensor", true)
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DuplicateId);
    }

    #[test]
    fn explicit_names_win_over_automatic_ones() {
        let sensor = ConfigPath::root().field("sensor");

        // The first node asks for an automatic name, the second one spells
        // out the name the first one would get.
        let mut nodes = vec![
            ConfigNode::new(sensor.index(0)).insert(
                "id",
                ConfigValue::Id(IdRef::automatic("Sensor", Some("sensor".into()))),
            ),
            ConfigNode::new(sensor.index(1))
                .insert("id", ConfigValue::Id(IdRef::explicit("sensor", "Sensor"))),
        ];

        let mut allocator = IdAllocator::new();
        allocator.resolve_declarations(nodes.iter_mut()).unwrap();

        assert_eq!(nodes[0].get_id("id").unwrap().name.as_deref(), Some("sensor_2"));
        assert_eq!(nodes[1].get_id("id").unwrap().name.as_deref(), Some("sensor"));
    }

    #[test]
    fn references() {
        let mut allocator = IdAllocator::new();
        let _ = allocator.allocate("hub", "example_component::ExampleComponent", true);

        let node = ConfigNode::new(ConfigPath::root().field("sensor"))
            .insert("parent", ConfigValue::Id(IdRef::reference("hub", "ExampleComponent")));
        assert!(allocator.resolve_references(&node).is_ok());

        let node = ConfigNode::new(ConfigPath::root().field("sensor"))
            .insert("parent", ConfigValue::Id(IdRef::reference("hub", "Display")))
            .insert("other", ConfigValue::Id(IdRef::reference("missing", "Display")));
        let errors = allocator.resolve_references(&node).unwrap_err();
        assert!(errors.contains_kind(ErrorKind::InvalidValue));
        assert!(errors.contains_kind(ErrorKind::UnresolvedId));
    }
}

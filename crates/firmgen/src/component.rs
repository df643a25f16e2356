use alloc::borrow::Cow;
use alloc::format;
use alloc::sync::Arc;

use hashbrown::DefaultHashBuilder;

use indexmap::set::IndexSet;

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::id::Identifier;
use crate::macros::set;
use crate::path::ConfigPath;
use crate::schema::Schema;
use crate::value::ConfigNode;

/// A role held by the instances of a component kind.
///
/// Every capability selects an additional emission step, run after the
/// instance's own emission routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capability {
    /// The instance is registered as a runtime object receiving the setup
    /// and loop callbacks.
    Schedulable,
    /// The instance is registered as a sensor together with its
    /// measurement metadata.
    Measurable,
}

impl Capability {
    /// Returns the name associated with a [`Capability`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Schedulable => "Schedulable",
            Self::Measurable => "Measurable",
        }
    }
}

impl core::fmt::Display for Capability {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.name().fmt(f)
    }
}

set! {
  /// A set of [`Capability`] tags.
  #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
  pub struct Capabilities(IndexSet<Capability, DefaultHashBuilder>);
}

set! {
  /// An ordered set of component kind names.
  #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
  pub struct KindNames(IndexSet<Cow<'static, str>, DefaultHashBuilder>);
}

/// The static description of a component kind.
///
/// A declaration is immutable once registered. Its emission routine lives
/// in the code generation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentDeclaration {
    kind: Cow<'static, str>,
    #[serde(skip_serializing_if = "KindNames::is_empty")]
    dependencies: KindNames,
    #[serde(skip_serializing_if = "KindNames::is_empty")]
    conflicts_with: KindNames,
    schema: Schema,
    capabilities: Capabilities,
    multi_conf: bool,
}

impl ComponentDeclaration {
    /// Creates a [`ComponentDeclaration`] for a kind accepting any number
    /// of instances.
    #[must_use]
    pub fn new(kind: impl Into<Cow<'static, str>>, schema: Schema) -> Self {
        Self {
            kind: kind.into(),
            dependencies: KindNames::new(),
            conflicts_with: KindNames::new(),
            schema,
            capabilities: Capabilities::new(),
            multi_conf: true,
        }
    }

    /// Adds a kind which must be configured and emitted before this one.
    #[must_use]
    pub fn dependency(mut self, kind: impl Into<Cow<'static, str>>) -> Self {
        self.dependencies.add(kind.into());
        self
    }

    /// Adds a kind which cannot be configured together with this one.
    #[must_use]
    pub fn conflicts_with(mut self, kind: impl Into<Cow<'static, str>>) -> Self {
        self.conflicts_with.add(kind.into());
        self
    }

    /// Adds a [`Capability`].
    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.add(capability);
        self
    }

    /// Restricts the kind to a single instance.
    #[must_use]
    pub fn single_instance(mut self) -> Self {
        self.multi_conf = false;
        self
    }

    /// Returns the kind name.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the kinds this kind depends on.
    #[must_use]
    #[inline]
    pub const fn dependencies(&self) -> &KindNames {
        &self.dependencies
    }

    /// Returns the kinds this kind conflicts with.
    #[must_use]
    #[inline]
    pub const fn conflicting_kinds(&self) -> &KindNames {
        &self.conflicts_with
    }

    /// Returns the [`Schema`].
    #[must_use]
    #[inline]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the [`Capabilities`].
    #[must_use]
    #[inline]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Checks whether the kind holds a [`Capability`].
    #[must_use]
    #[inline]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether more than one instance may be configured.
    #[must_use]
    #[inline]
    pub const fn multi_conf(&self) -> bool {
        self.multi_conf
    }
}

/// A validated instance of a component kind, ready to be ordered and
/// emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfiguredInstance {
    /// The position of the instance in the configuration document.
    pub index: usize,
    /// The declaration of the instance kind.
    pub declaration: Arc<ComponentDeclaration>,
    /// The normalized configuration, identifiers resolved.
    pub config: ConfigNode,
    /// The identifier of the instance.
    pub id: Identifier,
}

impl ConfiguredInstance {
    /// Creates a [`ConfiguredInstance`].
    ///
    /// The identifier is read from the identifier field of the declaration
    /// schema.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::UnresolvedId`] when the schema declares an
    /// identifier field which has not been assigned a name.
    pub fn new(
        index: usize,
        declaration: Arc<ComponentDeclaration>,
        config: ConfigNode,
    ) -> Result<Option<Self>> {
        let Some((field, type_name)) = declaration.schema().id_field() else {
            return Ok(None);
        };

        let name = config
            .get_id(field)
            .and_then(|id| id.name.clone())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::UnresolvedId,
                    format!("the `{field}` of `{}` has no name", declaration.kind()),
                )
                .at(config.path().clone())
            })?;

        let id = Identifier::new(name, alloc::string::String::from(type_name), true);
        Ok(Some(Self {
            index,
            declaration,
            config,
            id,
        }))
    }

    /// Creates a [`ConfiguredInstance`] with an already known identifier.
    #[must_use]
    pub const fn with_id(
        index: usize,
        declaration: Arc<ComponentDeclaration>,
        config: ConfigNode,
        id: Identifier,
    ) -> Self {
        Self {
            index,
            declaration,
            config,
            id,
        }
    }

    /// Returns the kind name.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &str {
        self.declaration.kind()
    }

    /// Returns the [`ConfigPath`] of the instance.
    #[must_use]
    #[inline]
    pub fn path(&self) -> &ConfigPath {
        self.config.path()
    }
}

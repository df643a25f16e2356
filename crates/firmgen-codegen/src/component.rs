use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use firmgen::component::ComponentDeclaration;
use firmgen::error::{Error as ConfigError, ErrorKind as ConfigErrorKind};
use firmgen::id::Identifier;
use firmgen::value::ConfigNode;

use futures_util::FutureExt;
use futures_util::future::LocalBoxFuture;

use hashbrown::DefaultHashBuilder;

use indexmap::map::{IndexMap, Iter};

use crate::context::EmitContext;
use crate::error::{Error, ErrorKind, Result};

/// The code emission logic of a component kind.
///
/// Any `async` function or closure taking an [`EmitContext`], the
/// normalized configuration of an instance and its [`Identifier`] is an
/// emission routine.
pub trait EmissionRoutine {
    /// Starts the emission of an instance.
    fn emit(
        &self,
        context: EmitContext,
        config: ConfigNode,
        id: Identifier,
    ) -> LocalBoxFuture<'static, Result<()>>;
}

impl<F, Fut> EmissionRoutine for F
where
    F: Fn(EmitContext, ConfigNode, Identifier) -> Fut,
    Fut: Future<Output = Result<()>> + 'static,
{
    fn emit(
        &self,
        context: EmitContext,
        config: ConfigNode,
        id: Identifier,
    ) -> LocalBoxFuture<'static, Result<()>> {
        self(context, config, id).boxed_local()
    }
}

/// A component kind: its declaration plus its emission routine.
#[derive(Clone)]
pub struct Component {
    declaration: Arc<ComponentDeclaration>,
    routine: Arc<dyn EmissionRoutine>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("declaration", &self.declaration)
            .finish_non_exhaustive()
    }
}

impl Component {
    /// Creates a [`Component`].
    #[must_use]
    pub fn new<R>(declaration: ComponentDeclaration, routine: R) -> Self
    where
        R: EmissionRoutine + 'static,
    {
        Self {
            declaration: Arc::new(declaration),
            routine: Arc::new(routine),
        }
    }

    /// Returns the kind name.
    #[must_use]
    #[inline]
    pub fn kind(&self) -> &str {
        self.declaration.kind()
    }

    /// Returns the [`ComponentDeclaration`].
    #[must_use]
    #[inline]
    pub const fn declaration(&self) -> &Arc<ComponentDeclaration> {
        &self.declaration
    }

    pub(crate) fn emit(
        &self,
        context: EmitContext,
        config: ConfigNode,
        id: Identifier,
    ) -> LocalBoxFuture<'static, Result<()>> {
        self.routine.emit(context, config, id)
    }
}

/// The registry of all the component kinds known to a generator.
#[derive(Debug, Clone)]
pub struct Components(IndexMap<Cow<'static, str>, Component, DefaultHashBuilder>);

impl Default for Components {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a Components {
    type Item = (&'a Cow<'static, str>, &'a Component);
    type IntoIter = Iter<'a, Cow<'static, str>, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Components {
    /// Creates an empty [`Components`] registry.
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self(IndexMap::with_hasher(DefaultHashBuilder::default()))
    }

    /// Registers a [`Component`], returning the updated registry.
    ///
    /// # Errors
    ///
    /// Fails when a component of the same kind is already registered.
    pub fn component(mut self, component: Component) -> Result<Self> {
        self.add(component)?;
        Ok(self)
    }

    /// Registers a [`Component`].
    ///
    /// The schema of every component must declare an identifier field,
    /// whose native type is the type of the emitted variable.
    ///
    /// # Errors
    ///
    /// Fails when a component of the same kind is already registered, or
    /// when its schema declares no identifier.
    pub fn add(&mut self, component: Component) -> Result<()> {
        let kind = Cow::Owned(component.kind().to_owned());
        if component.declaration.schema().id_field().is_none() {
            return Err(Error::stage(
                ErrorKind::Registry,
                ConfigError::new(
                    ConfigErrorKind::SchemaConflict,
                    format!("the component `{kind}` declares no identifier field"),
                ),
            ));
        }
        if self.0.contains_key(&kind) {
            return Err(Error::stage(
                ErrorKind::Registry,
                ConfigError::new(
                    ConfigErrorKind::SchemaConflict,
                    format!("the component `{kind}` is already registered"),
                ),
            ));
        }
        self.0.insert(kind, component);
        Ok(())
    }

    /// Retrieves the [`Component`] of a kind.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigErrorKind::UnknownKind`] when the kind is not
    /// registered.
    pub fn get(&self, kind: &str) -> std::result::Result<&Component, ConfigError> {
        self.0.get(kind).ok_or_else(|| {
            ConfigError::new(
                ConfigErrorKind::UnknownKind,
                format!("the component `{kind}` is not registered"),
            )
        })
    }

    /// Checks whether a kind is registered.
    #[must_use]
    #[inline]
    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains_key(kind)
    }

    /// Returns the number of registered kinds.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks whether no kind is registered.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all components in registration order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, Cow<'static, str>, Component> {
        self.0.iter()
    }

    /// Describes every registered kind, schema included, as `json`.
    ///
    /// # Errors
    ///
    /// Fails when a description cannot be serialized.
    pub fn describe(&self) -> Result<serde_json::Value> {
        let mut kinds = serde_json::Map::new();
        for (kind, component) in &self.0 {
            kinds.insert(
                kind.to_string(),
                serde_json::to_value(component.declaration.as_ref())?,
            );
        }
        Ok(serde_json::Value::Object(kinds))
    }
}

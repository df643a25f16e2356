use alloc::borrow::Cow;
use alloc::format;
use alloc::vec::Vec;

use hashbrown::DefaultHashBuilder;

use indexmap::map::{IndexMap, Iter};

use serde::Serialize;

use crate::error::{Error, ErrorKind, Result};
use crate::fields::{Field, FieldKind, Fields};
use crate::macros::map;
use crate::path::ConfigPath;
use crate::validate::convert;

/// The conventional name of the field declaring an instance identifier.
pub const ID_FIELD: &str = "id";

/// A cross-field constraint, checked against normalized values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Constraint {
    /// When `field` is present, `requires` must be present too.
    Requires {
        /// The triggering field.
        field: Cow<'static, str>,
        /// The field required by the triggering one.
        requires: Cow<'static, str>,
    },
    /// At most one of the fields may be present.
    Exclusive(Vec<Cow<'static, str>>),
    /// At least one of the fields must be present.
    AtLeastOne(Vec<Cow<'static, str>>),
    /// Exactly one of the fields must be present.
    ExactlyOne(Vec<Cow<'static, str>>),
    /// Either none or all of the fields must be present.
    Inclusive(Vec<Cow<'static, str>>),
}

impl Constraint {
    /// Creates a [`Constraint::Requires`].
    #[must_use]
    pub fn requires(
        field: impl Into<Cow<'static, str>>,
        requires: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::Requires {
            field: field.into(),
            requires: requires.into(),
        }
    }

    /// Creates a [`Constraint::Exclusive`].
    #[must_use]
    pub fn exclusive<const N: usize>(fields: [&'static str; N]) -> Self {
        Self::Exclusive(fields.into_iter().map(Cow::Borrowed).collect())
    }

    /// Creates a [`Constraint::AtLeastOne`].
    #[must_use]
    pub fn at_least_one<const N: usize>(fields: [&'static str; N]) -> Self {
        Self::AtLeastOne(fields.into_iter().map(Cow::Borrowed).collect())
    }

    /// Creates a [`Constraint::ExactlyOne`].
    #[must_use]
    pub fn exactly_one<const N: usize>(fields: [&'static str; N]) -> Self {
        Self::ExactlyOne(fields.into_iter().map(Cow::Borrowed).collect())
    }

    /// Creates a [`Constraint::Inclusive`].
    #[must_use]
    pub fn inclusive<const N: usize>(fields: [&'static str; N]) -> Self {
        Self::Inclusive(fields.into_iter().map(Cow::Borrowed).collect())
    }

    /// Returns all the field names mentioned by the constraint.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Requires { field, requires } => alloc::vec![field.as_ref(), requires.as_ref()],
            Self::Exclusive(fields)
            | Self::AtLeastOne(fields)
            | Self::ExactlyOne(fields)
            | Self::Inclusive(fields) => fields.iter().map(AsRef::as_ref).collect(),
        }
    }
}

/// A flat set of field specifications plus cross-field constraints.
///
/// A [`Schema`] built on top of a base schema contains the merged fields of
/// both: extension is composition, nothing links a schema to its base after
/// the merge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    name: Cow<'static, str>,
    fields: IndexMap<Cow<'static, str>, Field, DefaultHashBuilder>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    constraints: Vec<Constraint>,
}

impl Schema {
    /// Creates an empty [`Schema`].
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::with_hasher(DefaultHashBuilder::default()),
            constraints: Vec::new(),
        }
    }

    /// Creates a [`Schema`] from [`Fields`].
    ///
    /// Field defaults are converted to their normalized form.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SchemaConflict`] when a default does not
    /// match the kind of its field.
    pub fn from_fields(name: impl Into<Cow<'static, str>>, fields: Fields) -> Result<Self> {
        let mut schema = Self::new(name);
        for (name, field) in fields {
            schema.merge_field(name, field)?;
        }
        Ok(schema)
    }

    /// Adds a cross-field [`Constraint`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SchemaConflict`] when the constraint
    /// mentions a field the schema does not declare.
    pub fn constraint(mut self, constraint: Constraint) -> Result<Self> {
        if let Some(unknown) = constraint
            .fields()
            .into_iter()
            .find(|name| !self.fields.contains_key(*name))
        {
            return Err(Error::new(
                ErrorKind::SchemaConflict,
                format!(
                    "a constraint of `{}` mentions the undeclared field `{unknown}`",
                    self.name
                ),
            ));
        }
        self.constraints.push(constraint);
        Ok(self)
    }

    /// Returns a new [`Schema`] with `more` fields merged in.
    ///
    /// A field of `more` may redefine a field with the same name only when
    /// the kinds are compatible; the redefinition then replaces the
    /// previous one in place.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SchemaConflict`] on an incompatible
    /// redefinition.
    pub fn extend(&self, more: Fields) -> Result<Self> {
        let mut schema = self.clone();
        for (name, field) in more {
            schema.merge_field(name, field)?;
        }
        Ok(schema)
    }

    /// Returns a new [`Schema`] with all fields and constraints of `other`
    /// merged in.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SchemaConflict`] on an incompatible
    /// redefinition.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        let mut schema = self.clone();
        for (name, field) in &other.fields {
            schema.merge_field(name.clone(), field.clone())?;
        }
        for constraint in &other.constraints {
            if !schema.constraints.contains(constraint) {
                schema.constraints.push(constraint.clone());
            }
        }
        Ok(schema)
    }

    /// Returns the same schema under another name.
    #[must_use]
    pub fn rename(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the schema name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves a [`Field`] by name.
    #[must_use]
    #[inline]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Iterates over all fields in declaration order.
    #[inline]
    pub fn fields(&self) -> Iter<'_, Cow<'static, str>, Field> {
        self.fields.iter()
    }

    /// Returns all cross-field constraints.
    #[must_use]
    #[inline]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns the name and the declared type of the field declaring the
    /// instance identifier.
    ///
    /// The [`ID_FIELD`] is preferred; otherwise the first top-level
    /// [`FieldKind::DeclareId`] field is used.
    #[must_use]
    pub fn id_field(&self) -> Option<(&str, &str)> {
        fn declared_type(field: &Field) -> Option<&str> {
            match &field.kind {
                FieldKind::DeclareId { type_name, .. } => Some(type_name.as_ref()),
                _ => None,
            }
        }

        self.fields
            .get(ID_FIELD)
            .and_then(declared_type)
            .map(|type_name| (ID_FIELD, type_name))
            .or_else(|| {
                self.fields
                    .iter()
                    .find_map(|(name, field)| declared_type(field).map(|t| (name.as_ref(), t)))
            })
    }

    fn merge_field(&mut self, name: Cow<'static, str>, mut field: Field) -> Result<()> {
        if let Some(default) = &field.default {
            let default = convert(&field.kind, default, &ConfigPath::root().field(&name), &name)
                .map_err(|_| {
                    Error::new(
                        ErrorKind::SchemaConflict,
                        format!(
                            "the default of `{name}` in `{}` is not a valid `{}`",
                            self.name,
                            field.kind.name()
                        ),
                    )
                })?;
            field.default = Some(default);
        }

        if let Some(previous) = self.fields.get_mut(&name) {
            if !previous.kind.is_compatible(&field.kind) {
                return Err(Error::new(
                    ErrorKind::SchemaConflict,
                    format!(
                        "`{}` redefines the field `{name}` from `{}` to `{}`",
                        self.name,
                        previous.kind.name(),
                        field.kind.name()
                    ),
                ));
            }
            *previous = field;
        } else {
            self.fields.insert(name, field);
        }
        Ok(())
    }
}

map! {
  /// A registry associating each component kind with its [`Schema`].
  ///
  /// The registry is populated before a generation run and never mutated
  /// during it.
  #[derive(Debug, Clone, PartialEq)]
  pub struct SchemaRegistry(IndexMap<Cow<'static, str>, Schema, DefaultHashBuilder>);
}

impl SchemaRegistry {
    /// Defines the [`Schema`] of a kind, optionally on top of a base schema.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SchemaConflict`] when the kind is already
    /// defined or when `fields` incompatibly redefine a base field.
    pub fn define_schema(
        &mut self,
        kind: impl Into<Cow<'static, str>>,
        fields: Fields,
        base: Option<&Schema>,
    ) -> Result<Schema> {
        let kind = kind.into();
        if self.0.contains_key(&kind) {
            return Err(Error::new(
                ErrorKind::SchemaConflict,
                format!("the schema of `{kind}` is already defined"),
            ));
        }

        let schema = match base {
            Some(base) => base.clone().rename(kind.clone()).extend(fields)?,
            None => Schema::from_fields(kind.clone(), fields)?,
        };

        log::debug!("Defined the schema of `{kind}`");
        self.0.insert(kind, schema.clone());
        Ok(schema)
    }

    /// Merges `more` fields into a [`Schema`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::SchemaConflict`] on an incompatible
    /// redefinition.
    #[inline]
    pub fn extend(&self, schema: &Schema, more: Fields) -> Result<Schema> {
        schema.extend(more)
    }

    /// Retrieves the [`Schema`] of a kind.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::UnknownKind`] when the kind is not defined.
    pub fn get(&self, kind: &str) -> Result<&Schema> {
        self.0.get(kind).ok_or_else(|| {
            Error::new(
                ErrorKind::UnknownKind,
                format!("no schema is defined for `{kind}`"),
            )
        })
    }

    /// Checks whether a kind is defined.
    #[must_use]
    #[inline]
    pub fn contains(&self, kind: &str) -> bool {
        self.0.contains_key(kind)
    }
}

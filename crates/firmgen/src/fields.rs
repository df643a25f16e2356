use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use hashbrown::DefaultHashBuilder;

use indexmap::map::{IndexMap, IntoIter, Iter, Keys};

use serde::Serialize;

use crate::schema::Schema;
use crate::value::ConfigValue;

fn is_i64_min(value: &i64) -> bool {
    *value == i64::MIN
}

fn is_i64_max(value: &i64) -> bool {
    *value == i64::MAX
}

fn is_f64_min(value: &f64) -> bool {
    (f64::MIN - *value) == 0.0
}

fn is_f64_max(value: &f64) -> bool {
    (f64::MAX - *value) == 0.0
}

type CheckFn = dyn Fn(&ConfigValue) -> Result<ConfigValue, String> + Send + Sync;

/// A user-provided conversion for [`FieldKind::Custom`] fields.
///
/// The check receives the raw value and returns either the normalized value
/// or the reason why the value is rejected.
#[derive(Clone)]
pub struct CustomCheck(Arc<CheckFn>);

impl CustomCheck {
    /// Creates a [`CustomCheck`].
    #[must_use]
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&ConfigValue) -> Result<ConfigValue, String> + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    /// Runs the check on a value.
    ///
    /// # Errors
    ///
    /// Returns the reason why the value is rejected.
    #[inline]
    pub fn check(&self, value: &ConfigValue) -> Result<ConfigValue, String> {
        (self.0)(value)
    }
}

impl core::fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("CustomCheck")
    }
}

impl PartialEq for CustomCheck {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// All supported field kinds.
///
/// Every kind describes both the accepted raw values and the normalized
/// value produced by the validator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum FieldKind {
    /// A [`bool`] value. `"on"`, `"off"`, `"yes"`, `"no"`, `"true"`,
    /// `"false"`, `"enable"` and `"disable"` are accepted as well.
    Boolean,
    /// An [`i64`] value.
    Integer {
        /// The minimum allowed value.
        #[serde(skip_serializing_if = "is_i64_min")]
        min: i64,
        /// The maximum allowed value.
        #[serde(skip_serializing_if = "is_i64_max")]
        max: i64,
    },
    /// A [`f64`] value. Integers are widened.
    Float {
        /// The minimum allowed value.
        #[serde(skip_serializing_if = "is_f64_min")]
        min: f64,
        /// The maximum allowed value.
        #[serde(skip_serializing_if = "is_f64_max")]
        max: f64,
    },
    /// A characters sequence. Scalars are converted to their textual form.
    String,
    /// One of a closed set of options, compared case-insensitively.
    OneOf {
        /// All accepted options.
        options: Vec<Cow<'static, str>>,
    },
    /// A duration such as `"60s"`, `"500ms"`, `"1min"`, `"2h"` or a number
    /// of milliseconds, normalized to milliseconds.
    TimePeriod,
    /// Declares an identifier of the given native type.
    ///
    /// When the value is absent, an automatic identifier is requested.
    DeclareId {
        /// The native type of the declared object.
        type_name: Cow<'static, str>,
        /// The preferred base for automatic names.
        #[serde(skip_serializing_if = "Option::is_none")]
        base: Option<Cow<'static, str>>,
    },
    /// References an identifier declared elsewhere in the configuration.
    UseId {
        /// The expected native type of the referenced object.
        type_name: Cow<'static, str>,
    },
    /// A nested mapping validated against its own [`Schema`].
    Nested {
        /// The schema of the nested mapping.
        schema: Schema,
    },
    /// A sequence whose elements share the same kind.
    ///
    /// A single value is accepted as a sequence of one element.
    SequenceOf {
        /// The kind of every element.
        item: Box<FieldKind>,
    },
    /// A user-provided conversion.
    Custom {
        /// A name describing the accepted values.
        name: Cow<'static, str>,
        /// The conversion.
        #[serde(skip)]
        check: CustomCheck,
    },
}

impl FieldKind {
    /// Creates an unbounded [`FieldKind::Integer`].
    #[must_use]
    pub const fn integer() -> Self {
        Self::Integer {
            min: i64::MIN,
            max: i64::MAX,
        }
    }

    /// Creates an unbounded [`FieldKind::Float`].
    #[must_use]
    pub const fn float() -> Self {
        Self::Float {
            min: f64::MIN,
            max: f64::MAX,
        }
    }

    /// Creates a [`FieldKind::OneOf`] from a list of options.
    #[must_use]
    pub fn one_of<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        Self::OneOf {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a [`FieldKind::DeclareId`] with automatic names derived
    /// from the type name.
    #[must_use]
    pub fn declare_id(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self::DeclareId {
            type_name: type_name.into(),
            base: None,
        }
    }

    /// Creates a [`FieldKind::UseId`].
    #[must_use]
    pub fn use_id(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self::UseId {
            type_name: type_name.into(),
        }
    }

    /// Creates a [`FieldKind::SequenceOf`].
    #[must_use]
    pub fn sequence_of(kind: Self) -> Self {
        Self::SequenceOf {
            item: Box::new(kind),
        }
    }

    /// Creates a [`FieldKind::Nested`].
    #[must_use]
    pub const fn nested(schema: Schema) -> Self {
        Self::Nested { schema }
    }

    /// Creates a [`FieldKind::Custom`].
    #[must_use]
    pub fn custom(name: impl Into<Cow<'static, str>>, check: CustomCheck) -> Self {
        Self::Custom {
            name: name.into(),
            check,
        }
    }

    /// Returns the name associated with a [`FieldKind`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Integer { .. } => "Integer",
            Self::Float { .. } => "Float",
            Self::String => "String",
            Self::OneOf { .. } => "OneOf",
            Self::TimePeriod => "TimePeriod",
            Self::DeclareId { .. } => "DeclareId",
            Self::UseId { .. } => "UseId",
            Self::Nested { .. } => "Nested",
            Self::SequenceOf { .. } => "SequenceOf",
            Self::Custom { .. } => "Custom",
        }
    }

    /// Checks whether a field of this kind may be redefined with `other`.
    ///
    /// Redefinitions may tighten limits, change options or defaults, but
    /// never the kind itself.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::SequenceOf { item: a }, Self::SequenceOf { item: b }) => a.is_compatible(b),
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// A field specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// The field kind.
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
    /// The value used when an optional field is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
}

impl Field {
    /// Creates a required [`Field`].
    #[must_use]
    pub const fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            required: true,
            default: None,
        }
    }

    /// Creates an optional [`Field`] without a default value.
    #[must_use]
    pub const fn optional(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            default: None,
        }
    }

    /// Creates an optional [`Field`] with a default value.
    #[must_use]
    pub fn with_default(kind: FieldKind, default: impl Into<ConfigValue>) -> Self {
        Self {
            kind,
            required: false,
            default: Some(default.into()),
        }
    }
}

/// An ordered collection of named [`Field`]s.
///
/// Adding a field with an existing name replaces the previous definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Fields(IndexMap<Cow<'static, str>, Field, DefaultHashBuilder>);

impl Default for Fields {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoIterator for Fields {
    type Item = (Cow<'static, str>, Field);
    type IntoIter = IntoIter<Cow<'static, str>, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Fields {
    type Item = (&'a Cow<'static, str>, &'a Field);
    type IntoIter = Iter<'a, Cow<'static, str>, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Fields {
    /// Creates an empty [`Fields`].
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self(IndexMap::with_hasher(DefaultHashBuilder::default()))
    }

    /// Adds a [`Field`].
    #[must_use]
    #[inline]
    pub fn field(mut self, name: impl Into<Cow<'static, str>>, field: Field) -> Self {
        self.0.insert(name.into(), field);
        self
    }

    /// Adds a required field.
    #[must_use]
    #[inline]
    pub fn required(self, name: impl Into<Cow<'static, str>>, kind: FieldKind) -> Self {
        self.field(name, Field::required(kind))
    }

    /// Adds an optional field without a default value.
    #[must_use]
    #[inline]
    pub fn optional(self, name: impl Into<Cow<'static, str>>, kind: FieldKind) -> Self {
        self.field(name, Field::optional(kind))
    }

    /// Adds an optional field with a default value.
    #[must_use]
    #[inline]
    pub fn optional_with_default(
        self,
        name: impl Into<Cow<'static, str>>,
        kind: FieldKind,
        default: impl Into<ConfigValue>,
    ) -> Self {
        self.field(name, Field::with_default(kind, default))
    }

    /// Adds an optional [`bool`] field.
    #[must_use]
    #[inline]
    pub fn boolean(self, name: impl Into<Cow<'static, str>>, default: bool) -> Self {
        self.optional_with_default(name, FieldKind::Boolean, default)
    }

    /// Adds an optional [`i64`] field with limits.
    #[must_use]
    #[inline]
    pub fn integer_with_limits(
        self,
        name: impl Into<Cow<'static, str>>,
        default: i64,
        min: i64,
        max: i64,
    ) -> Self {
        self.optional_with_default(name, FieldKind::Integer { min, max }, default)
    }

    /// Adds an optional [`f64`] field with limits.
    #[must_use]
    #[inline]
    pub fn float_with_limits(
        self,
        name: impl Into<Cow<'static, str>>,
        default: f64,
        min: f64,
        max: f64,
    ) -> Self {
        self.optional_with_default(name, FieldKind::Float { min, max }, default)
    }

    /// Adds an optional characters sequence.
    #[must_use]
    #[inline]
    pub fn string(
        self,
        name: impl Into<Cow<'static, str>>,
        default: impl Into<String>,
    ) -> Self {
        self.optional_with_default(name, FieldKind::String, default.into())
    }

    /// Adds an optional duration.
    #[must_use]
    #[inline]
    pub fn time_period(self, name: impl Into<Cow<'static, str>>, default: &str) -> Self {
        self.optional_with_default(name, FieldKind::TimePeriod, default)
    }

    /// Adds the `id` field declaring an identifier of the given type.
    #[must_use]
    #[inline]
    pub fn declare_id(self, type_name: impl Into<Cow<'static, str>>) -> Self {
        self.optional(crate::schema::ID_FIELD, FieldKind::declare_id(type_name))
    }

    /// Adds the `id` field declaring an identifier of the given type, whose
    /// automatic names derive from `base`.
    #[must_use]
    #[inline]
    pub fn declare_id_with_base(
        self,
        type_name: impl Into<Cow<'static, str>>,
        base: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.optional(
            crate::schema::ID_FIELD,
            FieldKind::DeclareId {
                type_name: type_name.into(),
                base: Some(base.into()),
            },
        )
    }

    /// Adds an optional reference to an identifier of the given type.
    #[must_use]
    #[inline]
    pub fn use_id(
        self,
        name: impl Into<Cow<'static, str>>,
        type_name: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.optional(name, FieldKind::use_id(type_name))
    }

    /// Retrieves a [`Field`] by name.
    #[must_use]
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.0.get(name)
    }

    /// Checks whether [`Fields`] is empty.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all field names.
    #[must_use]
    #[inline]
    pub fn names(&self) -> Keys<'_, Cow<'static, str>, Field> {
        self.0.keys()
    }
}

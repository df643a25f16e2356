use alloc::borrow::Cow;
use alloc::format;
use alloc::vec::Vec;

use crate::path::ConfigPath;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A schema redefines a field with an incompatible kind.
    SchemaConflict,
    /// A component kind is not registered.
    UnknownKind,
    /// A configuration document is not well-formed.
    Syntax,
    /// A required field is absent.
    MissingField,
    /// A field value cannot be converted to its declared kind.
    InvalidValue,
    /// A key is not declared by the schema.
    UnknownField,
    /// A cross-field constraint does not hold.
    ConstraintViolation,
    /// An identifier is declared twice.
    DuplicateId,
    /// An identifier reference does not match any declaration.
    UnresolvedId,
    /// A component depends on a kind which is not configured.
    UnsatisfiedDependency,
    /// Components depend on each other in a cycle.
    DependencyCycle,
    /// Two mutually exclusive components are configured together.
    ConflictingComponents,
    /// A failure raised while emitting code.
    Emission,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::SchemaConflict => "Schema Conflict",
            Self::UnknownKind => "Unknown Kind",
            Self::Syntax => "Syntax",
            Self::MissingField => "Missing Field",
            Self::InvalidValue => "Invalid Value",
            Self::UnknownField => "Unknown Field",
            Self::ConstraintViolation => "Constraint Violation",
            Self::DuplicateId => "Duplicate Id",
            Self::UnresolvedId => "Unresolved Id",
            Self::UnsatisfiedDependency => "Unsatisfied Dependency",
            Self::DependencyCycle => "Dependency Cycle",
            Self::ConflictingComponents => "Conflicting Components",
            Self::Emission => "Emission",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.description().fmt(f)
    }
}

/// A configuration error.
///
/// Every error may carry the [`ConfigPath`] of the configuration value
/// which caused it.
#[derive(Clone, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    path: Option<ConfigPath>,
    description: Cow<'static, str>,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.format(f)
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.format(f)
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[inline]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            path: None,
            description: description.into(),
        }
    }

    /// Attaches the [`ConfigPath`] of the offending value.
    #[must_use]
    #[inline]
    pub fn at(mut self, path: ConfigPath) -> Self {
        self.path = Some(path);
        self
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the [`ConfigPath`] of the offending value, if known.
    #[must_use]
    #[inline]
    pub const fn path(&self) -> Option<&ConfigPath> {
        self.path.as_ref()
    }

    /// Returns the error description.
    #[must_use]
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn missing_field(path: &ConfigPath, field: &str) -> Self {
        Self::new(
            ErrorKind::MissingField,
            format!("required field `{field}` is missing"),
        )
        .at(path.clone())
    }

    pub(crate) fn invalid_value(path: &ConfigPath, field: &str, reason: &str) -> Self {
        Self::new(
            ErrorKind::InvalidValue,
            format!("invalid value for `{field}`: {reason}"),
        )
        .at(path.clone())
    }

    pub(crate) fn unknown_field(path: &ConfigPath, key: &str) -> Self {
        Self::new(ErrorKind::UnknownField, format!("unknown field `{key}`")).at(path.clone())
    }

    fn format(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} at `{path}`: {}", self.kind, self.description),
            None => write!(f, "{}: {}", self.kind, self.description),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Syntax, format!("{e}"))
    }
}

/// An ordered batch of [`Error`]s.
///
/// Validation reports every problem found in a run at once, so most
/// operations return [`Errors`] rather than a single [`Error`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Errors(Vec<Error>);

impl Errors {
    /// Creates an empty [`Errors`].
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds an [`Error`].
    #[inline]
    pub fn push(&mut self, error: Error) {
        log::debug!("{error}");
        self.0.push(error);
    }

    /// Moves all errors of `other` into this batch.
    #[inline]
    pub fn append(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Checks whether there are no errors.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over errors in the order they were reported.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// Checks whether an error of the given [`ErrorKind`] was reported.
    #[must_use]
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.0.iter().any(|error| error.kind == kind)
    }

    /// Returns `value` when there are no errors, otherwise the batch itself.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one error was reported.
    #[inline]
    pub fn into_result<T>(self, value: T) -> core::result::Result<T, Self> {
        if self.0.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl From<Error> for Errors {
    fn from(error: Error) -> Self {
        Self(alloc::vec![error])
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = alloc::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = core::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl core::fmt::Display for Errors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (position, error) in self.0.iter().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl core::error::Error for Errors {}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

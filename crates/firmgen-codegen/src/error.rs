use std::borrow::Cow;

use firmgen::error::Errors;

use tracing::error;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Errors encountered while reading a configuration document.
    Parse,
    /// Errors encountered while registering components.
    Registry,
    /// Errors caused by configuration values which do not match their
    /// schemas.
    Validation,
    /// Errors encountered while allocating and resolving identifiers.
    Identifiers,
    /// Errors encountered while ordering instances.
    Ordering,
    /// Errors raised by emission routines.
    Emission,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Parse => "Parse",
            Self::Registry => "Registry",
            Self::Validation => "Validation",
            Self::Identifiers => "Identifiers",
            Self::Ordering => "Ordering",
            Self::Emission => "Emission",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.description().fmt(f)
    }
}

/// Code generation error.
///
/// A generation run stops at its first failing stage. The configuration
/// errors which made the stage fail are available through
/// [`Error::causes`].
#[derive(PartialEq)]
pub struct Error {
    kind: ErrorKind,
    description: Cow<'static, str>,
    causes: Errors,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.format(f)
    }
}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    #[inline]
    pub fn new(kind: ErrorKind, description: impl Into<Cow<'static, str>>) -> Self {
        let description = description.into();
        error!("{}", description.as_ref());
        Self {
            kind,
            description,
            causes: Errors::new(),
        }
    }

    /// Creates an [`Error`] for a stage failed because of configuration
    /// errors.
    pub fn stage(kind: ErrorKind, causes: impl Into<Errors>) -> Self {
        let causes = causes.into();
        let description = match causes.len() {
            1 => Cow::Borrowed("1 configuration error"),
            count => Cow::Owned(format!("{count} configuration errors")),
        };
        for cause in &causes {
            error!("{cause}");
        }
        Self {
            kind,
            description,
            causes,
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the configuration errors which caused this error.
    #[must_use]
    #[inline]
    pub const fn causes(&self) -> &Errors {
        &self.causes
    }

    /// Checks whether a configuration error of the given kind caused this
    /// error.
    #[must_use]
    #[inline]
    pub fn caused_by(&self, kind: firmgen::error::ErrorKind) -> bool {
        self.causes.contains_kind(kind)
    }

    fn format(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.description)?;
        for cause in &self.causes {
            write!(f, "\n  {cause}")?;
        }
        Ok(())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::stage(ErrorKind::Parse, firmgen::error::Error::from(e))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.causes.iter().next().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

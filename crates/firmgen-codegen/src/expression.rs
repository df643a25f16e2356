//! A small model of the C++ constructs emitted by components.

use std::fmt::{Display, Formatter, Result as FmtResult};

use firmgen::id::Identifier;
use firmgen::value::ConfigValue;

use serde::Serialize;

/// A C++ expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "String")]
pub enum Expression {
    /// Verbatim text.
    Raw(String),
    /// A `bool` literal.
    Bool(bool),
    /// An integer literal.
    Integer(i64),
    /// A `float` literal.
    Float(f64),
    /// A string literal.
    Str(String),
    /// A named variable.
    Variable {
        /// Variable name.
        name: String,
        /// Whether the variable is a pointer, so members are accessed
        /// through `->`.
        is_pointer: bool,
    },
    /// A heap allocation, `new Type(args)`.
    New {
        /// The allocated type.
        type_name: String,
        /// Constructor arguments.
        args: Vec<Expression>,
    },
    /// A free function call.
    Call {
        /// The function name.
        function: String,
        /// Call arguments.
        args: Vec<Expression>,
    },
    /// A method call on a target expression.
    MethodCall {
        /// The object receiving the call.
        target: Box<Expression>,
        /// The method name.
        method: String,
        /// Call arguments.
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Creates a [`Expression::Raw`].
    #[must_use]
    #[inline]
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    /// Creates a [`Expression::Call`].
    #[must_use]
    #[inline]
    pub fn call(function: impl Into<String>, args: Vec<Self>) -> Self {
        Self::Call {
            function: function.into(),
            args,
        }
    }

    /// Creates a [`Expression::New`].
    #[must_use]
    #[inline]
    pub fn new_object(type_name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::New {
            type_name: type_name.into(),
            args,
        }
    }

    /// Calls a method on this expression.
    #[must_use]
    #[inline]
    pub fn method(self, method: impl Into<String>, args: Vec<Self>) -> Self {
        Self::MethodCall {
            target: Box::new(self),
            method: method.into(),
            args,
        }
    }

    /// Converts a normalized configuration value into a literal.
    ///
    /// Mappings and sequences have no literal form.
    #[must_use]
    pub fn literal(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(v) => Some(Self::Bool(*v)),
            ConfigValue::Integer(v) => Some(Self::Integer(*v)),
            ConfigValue::Float(v) => Some(Self::Float(*v)),
            ConfigValue::String(v) => Some(Self::Str(v.clone())),
            ConfigValue::TimePeriod(millis) => i64::try_from(*millis).ok().map(Self::Integer),
            ConfigValue::Id(id) => id.name.as_ref().map(|name| Self::Variable {
                name: name.clone(),
                is_pointer: true,
            }),
            ConfigValue::Null | ConfigValue::Node(_) | ConfigValue::Sequence(_) => None,
        }
    }
}

impl From<&Identifier> for Expression {
    fn from(id: &Identifier) -> Self {
        Self::Variable {
            name: id.name().into(),
            is_pointer: id.is_pointer(),
        }
    }
}

impl From<Expression> for String {
    fn from(expression: Expression) -> Self {
        expression.to_string()
    }
}

fn write_args(f: &mut Formatter<'_>, args: &[Expression]) -> FmtResult {
    f.write_str("(")?;
    for (position, arg) in args.iter().enumerate() {
        if position > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

fn write_escaped(f: &mut Formatter<'_>, text: &str) -> FmtResult {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Raw(text) => f.write_str(text),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}f"),
            Self::Str(v) => write_escaped(f, v),
            Self::Variable { name, .. } => f.write_str(name),
            Self::New { type_name, args } => {
                write!(f, "new {type_name}")?;
                write_args(f, args)
            }
            Self::Call { function, args } => {
                f.write_str(function)?;
                write_args(f, args)
            }
            Self::MethodCall {
                target,
                method,
                args,
            } => {
                let arrow = matches!(
                    target.as_ref(),
                    Self::Variable {
                        is_pointer: true,
                        ..
                    }
                );
                write!(f, "{target}{}{method}", if arrow { "->" } else { "." })?;
                write_args(f, args)
            }
        }
    }
}

/// A C++ statement inside `setup()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "String")]
pub enum Statement {
    /// An expression evaluated for its side effects.
    Expression(Expression),
    /// An assignment to a variable.
    Assignment {
        /// The assigned variable.
        target: String,
        /// The assigned value.
        value: Expression,
    },
    /// A comment line.
    Comment(String),
}

impl Statement {
    /// Creates a [`Statement::Assignment`].
    #[must_use]
    #[inline]
    pub fn assign(target: impl Into<String>, value: Expression) -> Self {
        Self::Assignment {
            target: target.into(),
            value,
        }
    }

    /// Creates a [`Statement::Comment`].
    #[must_use]
    #[inline]
    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment(text.into())
    }
}

impl From<Expression> for Statement {
    fn from(expression: Expression) -> Self {
        Self::Expression(expression)
    }
}

impl From<Statement> for String {
    fn from(statement: Statement) -> Self {
        statement.to_string()
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Expression(expression) => write!(f, "{expression};"),
            Self::Assignment { target, value } => write!(f, "{target} = {value};"),
            Self::Comment(text) => write!(f, "// {text}"),
        }
    }
}

/// A global variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct Global {
    type_name: String,
    name: String,
    is_pointer: bool,
}

impl Global {
    /// Creates a [`Global`].
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>, is_pointer: bool) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            is_pointer,
        }
    }

    /// Returns the declared variable name.
    #[must_use]
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<&Identifier> for Global {
    fn from(id: &Identifier) -> Self {
        Self::new(id.type_name(), id.name(), id.is_pointer())
    }
}

impl From<Global> for String {
    fn from(global: Global) -> Self {
        global.to_string()
    }
}

impl Display for Global {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.is_pointer {
            write!(f, "{} *{};", self.type_name, self.name)
        } else {
            write!(f, "{} {};", self.type_name, self.name)
        }
    }
}

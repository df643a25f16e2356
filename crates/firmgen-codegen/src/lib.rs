//! The `firmgen-codegen` crate turns firmware configuration documents into
//! C++ source code.
//!
//! A [`Generator`] runs every document through the same pipeline:
//!
//! 1. Each instance is validated against the schema of its component kind,
//!    and all the problems found are reported together.
//! 2. Identifiers are declared, allocated and resolved.
//! 3. Instances are ordered according to their dependencies.
//! 4. The emission routine of each instance runs on a cooperative
//!    scheduler, where a routine may wait for a variable declared by
//!    another one.
//!
//! Component kinds are registered as [`Component`]s: a declaration from
//! the `firmgen` crate plus an `async` emission routine writing code
//! through an [`EmitContext`].

#![deny(unsafe_code)]
#![deny(missing_docs)]

/// Generated code and its rendering.
pub mod buffer;
/// Component kinds and their registry.
pub mod component;
/// The built-in component kinds.
pub mod components;
/// The handle emission routines write code through.
pub mod context;
/// Error handling.
pub mod error;
/// C++ expressions, statements and globals.
pub mod expression;
/// The generation pipeline.
pub mod generator;
/// The cooperative emission scheduler.
pub mod scheduler;

pub use buffer::GeneratedCode;
pub use component::{Component, Components};
pub use context::EmitContext;
pub use error::{Error, ErrorKind, Result};
pub use generator::Generator;

//! `firmgen` is the description layer of a firmware code generator.
//!
//! A firmware is described by a configuration document listing the
//! component instances it contains. Every component kind publishes a
//! [`schema::Schema`] describing the fields it accepts, and this crate
//! turns a raw document into a deterministic, validated set of instances:
//!
//! 1. every raw node is checked against the schema of its kind and
//!    normalized, with all problems reported together;
//! 2. every declared identifier is assigned a unique name, and every
//!    reference is checked against the declarations;
//! 3. the instances are ordered so that each one comes after the instances
//!    it depends on.
//!
//! The produced instances are consumed by an emission layer which turns
//! them into source code.
//!
//! This crate is `no_std` and only requires an allocator.

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

/// Component declarations and configured instances.
pub mod component;
/// Error management.
pub mod error;
/// Field specifications and their kinds.
pub mod fields;
pub mod graph;
/// Identifiers and their allocation.
pub mod id;
/// Locations inside a configuration document.
pub mod path;
/// Schemas and the schema registry.
pub mod schema;
pub mod validate;
/// Raw and normalized configuration values.
pub mod value;

mod macros;

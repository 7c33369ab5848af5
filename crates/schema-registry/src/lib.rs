//! Schema registry access for kbridge.
//!
//! - [`store`]: the [`SchemaStore`] trait and its HTTP implementation
//!   speaking the Confluent schema registry REST API.
//! - [`descriptor`]: compiled type descriptors and the per-format
//!   [`DescriptorBuilder`] trait.
//! - [`cache`]: the per-id [`SchemaCache`] that fetches and compiles each
//!   schema at most once per connection.

pub mod cache;
pub mod descriptor;
pub mod error;
pub mod store;

pub use cache::{SchemaCache, SchemaEntry};
pub use descriptor::{
    AvroDescriptorBuilder, DescriptorBuilder, JsonSchemaDescriptorBuilder, TypeDescriptor,
};
pub use error::{Error, Result};
pub use store::{subject_name, HttpSchemaStore, RegisteredSchema, SchemaStore};

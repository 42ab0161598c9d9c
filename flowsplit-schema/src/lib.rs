//! Schema for a resolved vascular network.
//!
//! The schema describes a network whose elements, connectivity and areas have already been
//! resolved from centerline geometry. Elements refer to each other by their stable id.
//!
//! Serializing and deserializing is accomplished using [`serde`].
//!
pub mod element;
pub mod network;

pub use element::{ElementRoleSchema, ElementSchema};
pub use network::{NetworkSchema, NetworkSchemaBuildError, NetworkSchemaReadError};

/// The JSON schema of a network description.
pub fn json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(NetworkSchema)
}

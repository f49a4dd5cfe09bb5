//! Core model for fixtura.
//!
//! This crate defines entities, value specifications, the dynamic-expression
//! syntax, and the schema documents they are loaded from.

pub mod document;
pub mod entity;
pub mod error;
pub mod expression;
pub mod graph;
pub mod schema;
pub mod spec;
pub mod translate;
pub mod value;

pub use document::{EntityDocument, FakerDocument, FieldDocument, FieldDocuments, SchemaDocument};
pub use entity::Entity;
pub use error::{Error, Result};
pub use expression::{Expression, Piece, Reference, SELF_ANCHOR};
pub use graph::{RelationGraphReport, RelationGraphSummary, build_relation_graph_report, toposort};
pub use schema::Schema;
pub use spec::{RelationSpec, RelationStrategy, RelationType, ValueSpec, ValueSpecKind};
pub use translate::{parse_json_schema, parse_schema, parse_yaml_schema, provider_for_type};
pub use value::{InstanceId, Value};

//! Instance generation for fixtura.
//!
//! A run seeds instances for every entity, links their relations pass by
//! pass, resolves the references of every field cell and finally evaluates
//! the cells in dependency order. The result can be exported as JSON
//! records or CSV files.

pub mod engine;
pub mod errors;
pub mod evaluate;
pub mod export;
pub mod instance;
pub mod model;
pub mod output;
pub mod params;
pub mod planner;
pub mod pool;
pub mod provider;
pub mod relations;
pub mod resolver;

pub use engine::{GeneratedGraph, GenerationEngine, GenerationResult};
pub use errors::GenerationError;
pub use instance::{CellId, CellState, FieldCell, Instance, InstanceArena, ResolvedTarget};
pub use model::{EntityReport, GenerateOptions, GenerationReport, RelatedMode};
pub use provider::{FakeProvider, LocaleKey, ValueProvider};

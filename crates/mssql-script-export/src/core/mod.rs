//! Core types and traits shared by every stage of the export pipeline.
//!
//! - [`category`]: the object categories that can be exported
//! - [`record`]: definition records, per-unit outcomes and batch results
//! - [`traits`]: the definition source and script sink abstractions

pub mod category;
pub mod record;
pub mod traits;

pub use category::ObjectCategory;
pub use record::{BatchResult, DefinitionRecord, ErrorKind, ExportOutcome};
pub use traits::{DefinitionSource, DefinitionStream, ScriptSink};

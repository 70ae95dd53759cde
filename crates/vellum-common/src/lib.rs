//! Common utilities for the Vellum layout engine.
//!
//! This crate provides shared infrastructure used by all layout components:
//! - **Warning System** - deduplicated, colored terminal output for
//!   recoverable degradations
//! - **Diagnostics** - structured events emitted at layout decision points
//!   and delivered to a pluggable sink

pub mod diagnostics;
pub mod warning;

pub use diagnostics::{
    Category, ConsoleSink, DiagnosticEvent, DiagnosticSink, Diagnostics, MemorySink, NullSink,
    SinkError,
};
pub use warning::Warnings;

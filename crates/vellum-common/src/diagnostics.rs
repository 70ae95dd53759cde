//! Structured diagnostics emitted at layout decision points.
//!
//! Layout code never writes diagnostics directly. It builds a
//! [`DiagnosticEvent`] and hands it to a [`Diagnostics`] handle, which
//! forwards it to whatever [`DiagnosticSink`] the host plugged in. A sink
//! that fails is reported once through the handle's [`Warnings`] and
//! otherwise ignored: a broken sink must never abort layout.
//!
//! The handle also carries the warning set recoverable conditions are
//! reported through. [`Diagnostics::for_document`] keeps the sink and starts
//! a fresh set.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::warning::Warnings;

/// The subsystem that produced a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Box generation and block layout.
    Layout,
    /// Width/height resolution, including percentage fallbacks.
    Dimension,
    /// Structural validation of the box tree.
    Validation,
    /// Fragment construction stages.
    Fragment,
    /// Document-level orchestration and page assembly.
    Document,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Layout => "layout",
            Self::Dimension => "dimension",
            Self::Validation => "validation",
            Self::Fragment => "fragment",
            Self::Document => "document",
        };
        f.write_str(name)
    }
}

/// A single structured diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    /// Producing subsystem.
    pub category: Category,
    /// Short kebab-case event name, e.g. `percentage-fallback`.
    pub kind: String,
    /// Wall-clock time the event was created.
    pub timestamp: SystemTime,
    /// Free-form key/value payload, ordered by key.
    pub payload: BTreeMap<String, String>,
}

impl DiagnosticEvent {
    /// Create an event with an empty payload, timestamped now.
    #[must_use]
    pub fn new(category: Category, kind: impl Into<String>) -> Self {
        Self {
            category,
            kind: kind.into(),
            timestamp: SystemTime::now(),
            payload: BTreeMap::new(),
        }
    }

    /// Add a payload entry, replacing any previous value for `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let _previous = self.payload.insert(key.into(), value.to_string());
        self
    }

    /// Look up a payload value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.payload.get(key).map(String::as_str)
    }
}

/// Failure reported by a [`DiagnosticSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink no longer accepts events.
    #[error("diagnostic sink is closed")]
    Closed,
    /// The sink tried to record the event and failed.
    #[error("diagnostic sink failed: {0}")]
    Failed(String),
}

/// Destination for diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    /// Record one event.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the event could not be recorded. Callers
    /// going through [`Diagnostics::emit`] never see this error.
    fn record(&self, event: &DiagnosticEvent) -> Result<(), SinkError>;
}

/// Cheap, cloneable handle to an optional sink and a warning set.
///
/// The default handle has no sink and drops every event. Clones share the
/// sink and the warning set.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<dyn DiagnosticSink>>,
    warnings: Arc<Warnings>,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl Diagnostics {
    /// A handle that forwards events to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink: Some(sink),
            warnings: Arc::default(),
        }
    }

    /// A handle that drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A handle on the same sink with an empty warning set, for one
    /// document.
    #[must_use]
    pub fn for_document(&self) -> Self {
        Self {
            sink: self.sink.clone(),
            warnings: Arc::default(),
        }
    }

    /// Warnings reported through this handle.
    #[must_use]
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Print a recoverable condition once per handle.
    pub fn warn_once(&self, component: &str, message: &str) {
        self.warnings.warn_once(component, message);
    }

    /// Whether a sink is attached.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Deliver an event to the sink, if any.
    ///
    /// Sink failures are reported once on stderr and otherwise swallowed.
    pub fn emit(&self, event: DiagnosticEvent) {
        let Some(sink) = &self.sink else { return };
        if let Err(err) = sink.record(&event) {
            self.warn_once(
                "diagnostics",
                &format!("dropped {}/{} event: {err}", event.category, event.kind),
            );
        }
    }
}

/// Sink that keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded event kinds, in arrival order.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.kind).collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, event: &DiagnosticEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError::Failed("event buffer lock poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}

/// Sink that prints each distinct event once.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    printed: Warnings,
}

impl ConsoleSink {
    /// A sink that has printed nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for ConsoleSink {
    fn record(&self, event: &DiagnosticEvent) -> Result<(), SinkError> {
        let payload = event
            .payload
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.printed.warn_once(
            &event.category.to_string(),
            &format!("{} {{{payload}}}", event.kind),
        );
        Ok(())
    }
}

/// Sink that accepts and discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _event: &DiagnosticEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

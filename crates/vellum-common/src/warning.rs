//! Layout warnings with colored terminal output.
//!
//! Provides deduplication to avoid spamming the same warning multiple times.
//! Used by the box builder, the dimension resolver, and the fragment
//! pipeline to report degraded-but-recoverable conditions.
//!
//! A [`Warnings`] set is owned by whoever reports, usually through a
//! [`crate::Diagnostics`] handle, so two documents converted at the same
//! time never share or clear each other's state.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use owo_colors::OwoColorize;

/// Warnings already printed by one owner.
#[derive(Debug, Default)]
pub struct Warnings {
    seen: Mutex<HashSet<String>>,
}

impl Warnings {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Warn about a recoverable condition (prints once per unique message).
    ///
    /// # Example
    /// ```ignore
    /// warnings.warn_once("image", "missing image 'logo.png', drawing placeholder");
    /// ```
    pub fn warn_once(&self, component: &str, message: &str) {
        let key = format!("[{component}] {message}");
        let should_print = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);

        if should_print {
            eprintln!("{}", format!("[Vellum {component}] ⚠ {message}").yellow());
        }
    }

    /// Whether this exact warning has been printed.
    #[must_use]
    pub fn has_warned(&self, component: &str, message: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&format!("[{component}] {message}"))
    }

    /// Number of distinct warnings printed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing has been printed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every recorded warning.
    pub fn clear(&self) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

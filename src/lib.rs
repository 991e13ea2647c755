//! Tour runner - drives UI tours against a live document
//!
//! A tour is an ordered list of steps. Each step waits for a trigger selector
//! to match a visible element, then optionally clicks it or types into it.
//! The runner polls triggers with a per-step timeout and reports the outcome
//! as a run that ends `passed` or `failed`.

pub mod cli;
pub mod commands;
pub mod common;
pub mod document;
pub mod testing;
pub mod tour;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use document::{Action, Document, ElementRef, MemoryDocument, Selector};
pub use tour::{Run, RunError, RunOptions, RunStatus, Step, Tour, TourRegistry, TourRunner};

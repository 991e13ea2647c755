//! Document interfaces consumed by the tour runner
//!
//! The runner never touches markup directly: it asks a [`Document`] whether a
//! trigger currently matches, and hands it an [`Action`] to perform on the
//! element that matched.

pub mod memory;
pub mod selector;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::common::{Error, Result};

pub use memory::{Effect, ElementFixture, EventKind, MemoryDocument, Reaction};
pub use selector::Selector;

/// Opaque handle to an element, valid for the document that returned it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ElementRef(pub usize);

/// Effect a step performs on the element that satisfied its trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Action {
    /// Dispatch a click
    Click,
    /// Set the element's value and dispatch an input event
    SetText(String),
}

impl Action {
    /// Parse a tour `run` instruction: `click` or `text <value>`
    pub fn parse(run: &str) -> Result<Self> {
        let run = run.trim();
        let (verb, rest) = match run.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (run, None),
        };

        match (verb, rest) {
            ("click", None) => Ok(Action::Click),
            ("text", Some(value)) => Ok(Action::SetText(value.to_string())),
            ("text", None) => Ok(Action::SetText(String::new())),
            _ => Err(Error::InvalidStep(format!(
                "Unknown run instruction '{}'. Supported: 'click', 'text <value>'",
                run
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click => write!(f, "click"),
            Action::SetText(value) => write!(f, "text {}", value),
        }
    }
}

/// A live document the runner polls and acts upon
///
/// `query` must be side-effect free; the runner calls it on every poll tick.
/// `dispatch` returns once the action is fired and does not wait for its
/// downstream effects.
#[async_trait]
pub trait Document: Send + Sync {
    /// First visible element matching `selector`, if any
    async fn query(&self, selector: &Selector) -> Option<ElementRef>;

    /// Perform `action` on `element`
    async fn dispatch(&self, element: ElementRef, action: &Action) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_instructions() {
        assert_eq!(Action::parse("click").unwrap(), Action::Click);
        assert_eq!(
            Action::parse("text My feedback").unwrap(),
            Action::SetText("My feedback".to_string())
        );
        assert_eq!(Action::parse("text").unwrap(), Action::SetText(String::new()));
        assert!(matches!(
            Action::parse("drag_and_drop #a"),
            Err(Error::InvalidStep(_))
        ));
        assert!(Action::parse("click #other").is_err());
    }

    #[test]
    fn test_action_display_round_trips_run_syntax() {
        let action = Action::SetText("hello world".to_string());
        assert_eq!(Action::parse(&action.to_string()).unwrap(), action);
    }
}

//! In-memory document
//!
//! An element tree that stands in for a rendered page and the application
//! behind it. Behaviour is scripted with [`Reaction`]s: when an element
//! matching `on` receives a click or text input, the reaction's effects are
//! applied, immediately or after `delay_ms`. Delayed effects land on the first
//! query or dispatch after they fall due, the way an asynchronous page update
//! would.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, trace};

use super::selector::{ElementTree, Selector};
use super::{Action, Document, ElementRef};
use crate::common::{Error, Result};

/// Declarative description of an element and its subtree
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ElementFixture {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Space separated class list
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub children: Vec<ElementFixture>,
}

fn default_visible() -> bool {
    true
}

impl ElementFixture {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            id: None,
            class: None,
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            children: Vec::new(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn child(mut self, child: ElementFixture) -> Self {
        self.children.push(child);
        self
    }
}

/// Which dispatched action fires a reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    Click,
    Input,
}

impl EventKind {
    fn of(action: &Action) -> Self {
        match action {
            Action::Click => EventKind::Click,
            Action::SetText(_) => EventKind::Input,
        }
    }
}

/// Scripted page behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct Reaction {
    /// Elements whose events fire this reaction
    pub on: Selector,
    #[serde(default)]
    pub event: EventKind,
    /// Delay before the effects become observable
    #[serde(default)]
    pub delay_ms: u64,
    /// Fire at most once
    #[serde(default)]
    pub once: bool,
    pub effects: Vec<Effect>,
}

/// A single document mutation, applied to every element matching `target`
/// (hidden ones included)
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Effect {
    SetText {
        target: Selector,
        text: String,
    },
    SetAttr {
        target: Selector,
        name: String,
        #[serde(default)]
        value: String,
    },
    RemoveAttr {
        target: Selector,
        name: String,
    },
    Show {
        target: Selector,
    },
    Hide {
        target: Selector,
    },
    Append {
        target: Selector,
        element: ElementFixture,
    },
    ReplaceChildren {
        target: Selector,
        children: Vec<ElementFixture>,
    },
    Remove {
        target: Selector,
    },
}

impl Effect {
    fn target(&self) -> &Selector {
        match self {
            Effect::SetText { target, .. }
            | Effect::SetAttr { target, .. }
            | Effect::RemoveAttr { target, .. }
            | Effect::Show { target }
            | Effect::Hide { target }
            | Effect::Append { target, .. }
            | Effect::ReplaceChildren { target, .. }
            | Effect::Remove { target } => target,
        }
    }
}

/// One action the document received
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRecord {
    pub element: ElementRef,
    pub action: Action,
}

#[derive(Debug)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    visible: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    attached: bool,
}

/// Arena of nodes; detached nodes stay allocated so stale handles fail cleanly
#[derive(Debug)]
struct Dom {
    nodes: Vec<Node>,
    root: usize,
}

impl Dom {
    fn new(root: &ElementFixture) -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            root: 0,
        };
        dom.root = dom.build(root, None);
        dom
    }

    fn build(&mut self, fixture: &ElementFixture, parent: Option<usize>) -> usize {
        let mut attrs = fixture.attrs.clone();
        if let Some(id) = &fixture.id {
            attrs.insert("id".to_string(), id.clone());
        }
        if let Some(class) = &fixture.class {
            attrs.insert("class".to_string(), class.clone());
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            tag: fixture.tag.clone(),
            attrs,
            text: fixture.text.clone(),
            visible: fixture.visible,
            parent,
            children: Vec::new(),
            attached: true,
        });
        if let Some(parent) = parent {
            self.nodes[parent].children.push(index);
        }
        for child in &fixture.children {
            self.build(child, Some(index));
        }
        index
    }

    /// Attached elements in document order
    fn document_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            order.push(index);
            stack.extend(self.nodes[index].children.iter().rev());
        }
        order
    }

    fn select_all(&self, selector: &Selector) -> Vec<usize> {
        self.document_order()
            .into_iter()
            .filter(|&index| selector.matches(self, index))
            .collect()
    }

    fn first_visible(&self, selector: &Selector) -> Option<usize> {
        self.document_order()
            .into_iter()
            .find(|&index| self.is_visible(index) && selector.matches(self, index))
    }

    fn detach(&mut self, index: usize) {
        if index == self.root {
            return;
        }
        if let Some(parent) = self.nodes[index].parent.take() {
            self.nodes[parent].children.retain(|&c| c != index);
        }
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            self.nodes[i].attached = false;
            stack.extend(self.nodes[i].children.iter().copied());
        }
    }

    fn apply(&mut self, effect: &Effect) {
        let targets = self.select_all(effect.target());
        trace!(?effect, matched = targets.len(), "applying effect");

        for index in targets {
            // An earlier target's Remove/ReplaceChildren may have detached this one
            if !self.nodes[index].attached {
                continue;
            }
            match effect {
                Effect::SetText { text, .. } => self.nodes[index].text = text.clone(),
                Effect::SetAttr { name, value, .. } => {
                    self.nodes[index].attrs.insert(name.clone(), value.clone());
                }
                Effect::RemoveAttr { name, .. } => {
                    self.nodes[index].attrs.remove(name);
                }
                Effect::Show { .. } => self.nodes[index].visible = true,
                Effect::Hide { .. } => self.nodes[index].visible = false,
                Effect::Append { element, .. } => {
                    self.build(element, Some(index));
                }
                Effect::ReplaceChildren { children, .. } => {
                    for child in self.nodes[index].children.clone() {
                        self.detach(child);
                    }
                    for child in children {
                        self.build(child, Some(index));
                    }
                }
                Effect::Remove { .. } => self.detach(index),
            }
        }
    }
}

impl ElementTree for Dom {
    type Id = usize;

    fn parent(&self, id: usize) -> Option<usize> {
        self.nodes[id].parent
    }

    fn children(&self, id: usize) -> Vec<usize> {
        self.nodes[id].children.clone()
    }

    fn tag(&self, id: usize) -> &str {
        &self.nodes[id].tag
    }

    fn attr(&self, id: usize, name: &str) -> Option<&str> {
        self.nodes[id].attrs.get(name).map(String::as_str)
    }

    fn text_content(&self, id: usize) -> String {
        let mut text = self.nodes[id].text.clone();
        for &child in &self.nodes[id].children {
            let child_text = self.text_content(child);
            if !child_text.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&child_text);
            }
        }
        text
    }

    fn is_visible(&self, id: usize) -> bool {
        let mut current = Some(id);
        while let Some(index) = current {
            if !self.nodes[index].visible {
                return false;
            }
            current = self.nodes[index].parent;
        }
        true
    }
}

#[derive(Debug)]
struct Pending {
    due: Instant,
    effects: Vec<Effect>,
}

#[derive(Debug)]
struct State {
    dom: Dom,
    reactions: Vec<(Reaction, bool)>,
    pending: Vec<Pending>,
    log: Vec<DispatchRecord>,
}

impl State {
    fn apply_due(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let now = Instant::now();
        let (due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.due <= now);
        self.pending = waiting;

        let mut due = due;
        due.sort_by_key(|p| p.due);
        for pending in due {
            for effect in &pending.effects {
                self.dom.apply(effect);
            }
        }
    }
}

/// Thread-safe, scriptable in-memory [`Document`]
#[derive(Debug)]
pub struct MemoryDocument {
    state: Mutex<State>,
}

impl MemoryDocument {
    /// Create a document whose root element is `root`
    pub fn new(root: ElementFixture) -> Self {
        Self {
            state: Mutex::new(State {
                dom: Dom::new(&root),
                reactions: Vec::new(),
                pending: Vec::new(),
                log: Vec::new(),
            }),
        }
    }

    /// Create a document with reactions installed
    pub fn with_reactions(root: ElementFixture, reactions: Vec<Reaction>) -> Self {
        let document = Self::new(root);
        for reaction in reactions {
            document.add_reaction(reaction);
        }
        document
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_reaction(&self, reaction: Reaction) {
        self.state().reactions.push((reaction, false));
    }

    /// Mutate the document from outside, as the application would
    pub fn apply(&self, effect: &Effect) {
        let mut state = self.state();
        state.apply_due();
        state.dom.apply(effect);
    }

    /// Every action dispatched so far, in order
    pub fn dispatch_log(&self) -> Vec<DispatchRecord> {
        self.state().log.clone()
    }

    /// Text content of the first element matching `selector`, hidden or not
    pub fn text_of(&self, selector: &Selector) -> Option<String> {
        let mut state = self.state();
        state.apply_due();
        let index = state.dom.select_all(selector).into_iter().next()?;
        Some(state.dom.text_content(index))
    }

    /// Attribute of the first element matching `selector`
    pub fn attr_of(&self, selector: &Selector, name: &str) -> Option<String> {
        let mut state = self.state();
        state.apply_due();
        let index = state.dom.select_all(selector).into_iter().next()?;
        state.dom.attr(index, name).map(str::to_string)
    }
}

#[async_trait]
impl Document for MemoryDocument {
    async fn query(&self, selector: &Selector) -> Option<ElementRef> {
        let mut state = self.state();
        state.apply_due();
        state.dom.first_visible(selector).map(ElementRef)
    }

    async fn dispatch(&self, element: ElementRef, action: &Action) -> Result<()> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.apply_due();

        let index = element.0;
        match state.dom.nodes.get(index) {
            Some(node) if node.attached => {}
            _ => {
                return Err(Error::Dispatch(format!(
                    "element {} is no longer attached to the document",
                    index
                )))
            }
        }

        state.log.push(DispatchRecord {
            element,
            action: action.clone(),
        });

        if let Action::SetText(value) = action {
            state.dom.nodes[index]
                .attrs
                .insert("value".to_string(), value.clone());
        }

        // Disabled controls swallow clicks
        if *action == Action::Click && state.dom.attr(index, "disabled").is_some() {
            debug!(element = index, "click on disabled element ignored");
            return Ok(());
        }

        let event = EventKind::of(action);
        let now = Instant::now();
        let mut fired = Vec::new();
        for (reaction, spent) in state.reactions.iter_mut() {
            if *spent || reaction.event != event || !reaction.on.matches(&state.dom, index) {
                continue;
            }
            if reaction.once {
                *spent = true;
            }
            fired.push((reaction.delay_ms, reaction.effects.clone()));
        }

        for (delay_ms, effects) in fired {
            if delay_ms == 0 {
                for effect in &effects {
                    state.dom.apply(effect);
                }
            } else {
                state.pending.push(Pending {
                    due: now + Duration::from_millis(delay_ms),
                    effects,
                });
            }
        }

        Ok(())
    }
}

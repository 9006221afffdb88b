//! Merges button edges from several input sources.
//!
//! The touch controller and the keyboard can hold the same button at once.
//! The core sees a press when the first source goes down and a release
//! when the last one lets go.

use std::collections::BTreeMap;

use rustico_types::input::VirtualButton;

use crate::controller::InputEdge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InputSource {
    Touch,
    Keyboard,
}

#[derive(Debug, Default)]
pub struct InputLatch {
    holders: BTreeMap<VirtualButton, Vec<InputSource>>,
}

impl InputLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an edge from `source`. Returns the edge to forward, if any.
    pub fn apply(&mut self, source: InputSource, edge: InputEdge) -> Option<InputEdge> {
        let holders = self.holders.entry(edge.button).or_default();
        let was_held = !holders.is_empty();
        if edge.pressed {
            if !holders.contains(&source) {
                holders.push(source);
            }
        } else {
            holders.retain(|s| *s != source);
        }
        let now_held = !holders.is_empty();
        if !now_held {
            self.holders.remove(&edge.button);
        }
        (now_held != was_held).then_some(edge)
    }
}

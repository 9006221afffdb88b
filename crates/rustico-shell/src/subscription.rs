//! Owned event subscriptions.
//!
//! Hosts attach a native listener for a topic only while some owner holds a
//! subscription to it. Releasing an owner drops all of its subscriptions at
//! once, so a deactivated mode leaves nothing behind.

use std::collections::BTreeSet;

use crate::mode::Mode;

/// Host event sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Pointer presses on the controller's hit regions.
    PointerPress,
    /// Global pointer up/cancel, so releases outside a button still land.
    PointerRelease,
    /// Resize and orientation change.
    Viewport,
    Fullscreen,
    Keyboard,
    Focus,
    /// Display-refresh callbacks.
    AnimationFrame,
}

/// Who holds a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Shell,
    Controller,
    Mode(Mode),
}

#[derive(Debug, Default)]
pub struct Subscriptions {
    entries: BTreeSet<(Owner, Topic)>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `owner` to `topic`. Returns false if it already held it.
    pub fn ensure(&mut self, owner: Owner, topic: Topic) -> bool {
        self.entries.insert((owner, topic))
    }

    /// Drop every subscription held by `owner`. Returns how many were removed.
    pub fn release(&mut self, owner: Owner) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(o, _)| *o != owner);
        before - self.entries.len()
    }

    pub fn holds(&self, owner: Owner, topic: Topic) -> bool {
        self.entries.contains(&(owner, topic))
    }

    /// Topics with at least one subscriber.
    pub fn live_topics(&self) -> BTreeSet<Topic> {
        self.entries.iter().map(|&(_, t)| t).collect()
    }
}

//! RAII DOM listeners.
//!
//! A listener is attached for as long as its handle lives. [`ListenerSet`]
//! keeps the attached set equal to the shell's live topics.

use std::collections::{BTreeMap, BTreeSet};

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{Event, EventTarget};

use rustico_shell::error::Result;
use rustico_shell::subscription::Topic;

use crate::{dom, js_error};

pub struct EventListener {
    target: EventTarget,
    event: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl EventListener {
    pub fn new(
        target: &EventTarget,
        event: &'static str,
        handler: impl FnMut(Event) + 'static,
    ) -> Result<Self> {
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(Event)>);
        target
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(|e| js_error(event, e))?;
        Ok(Self {
            target: target.clone(),
            event,
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let removed = self
            .target
            .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
        if let Err(e) = removed {
            log::warn!("removing {} listener failed: {e:?}", self.event);
        }
    }
}

#[derive(Default)]
pub struct ListenerSet {
    attached: BTreeMap<Topic, Vec<EventListener>>,
}

impl ListenerSet {
    /// Detach listeners of topics that are no longer live and attach the
    /// newly live ones. A topic's handler must never end its own topic.
    pub fn sync(
        &mut self,
        live: &BTreeSet<Topic>,
        mut attach: impl FnMut(Topic) -> Result<Vec<EventListener>>,
    ) -> Result<()> {
        self.attached.retain(|topic, _| {
            let keep = live.contains(topic);
            if !keep {
                log::debug!("detaching {topic:?} listeners");
            }
            keep
        });
        for &topic in live {
            if self.attached.contains_key(&topic) || dom::dom_events(topic).is_empty() {
                continue;
            }
            log::debug!("attaching {topic:?} listeners");
            let listeners = attach(topic)?;
            self.attached.insert(topic, listeners);
        }
        Ok(())
    }
}

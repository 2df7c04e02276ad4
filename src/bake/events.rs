use slotmap::SlotMap;

use crate::host::ids::ObjectId;
use crate::host::{HostEvent, HostEventKind};

slotmap::new_key_type! {
    /// Registration handle returned by [`EventRegistry::register`].
    pub struct HandlerKey;
}

/// What a registered handler has observed so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HandlerState {
    #[default]
    Created,
    Pre,
    Canceled,
    Complete,
}

impl HandlerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Complete)
    }

    fn advance(self, kind: HostEventKind) -> Self {
        if self.is_terminal() {
            return self;
        }
        match kind {
            HostEventKind::Pre => Self::Pre,
            HostEventKind::Cancel => Self::Canceled,
            HostEventKind::Complete => Self::Complete,
        }
    }
}

#[derive(Debug)]
struct Subscription {
    object: ObjectId,
    state: HandlerState,
}

/// Bake callbacks routed to the jobs that asked for them.
///
/// A handler only sees events of the object it was registered for. Handlers stay registered
/// until explicitly removed.
#[derive(Debug, Default)]
pub struct EventRegistry {
    subs: SlotMap<HandlerKey, Subscription>,
}

impl EventRegistry {
    pub fn register(&mut self, object: ObjectId) -> HandlerKey {
        self.subs.insert(Subscription {
            object,
            state: HandlerState::Created,
        })
    }

    /// Returns `false` when the handler was already gone.
    pub fn deregister(&mut self, key: HandlerKey) -> bool {
        self.subs.remove(key).is_some()
    }

    pub fn dispatch(&mut self, events: &[HostEvent]) {
        for event in events {
            for sub in self.subs.values_mut().filter(|s| s.object == event.object) {
                sub.state = sub.state.advance(event.kind);
            }
        }
    }

    pub fn state(&self, key: HandlerKey) -> Option<HandlerState> {
        self.subs.get(key).map(|s| s.state)
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bake/events.rs"]
mod tests;

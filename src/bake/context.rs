use std::cell::{Cell, RefCell};

use tracing::trace;

use crate::bake::events::EventRegistry;
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::Host;
use crate::material::editor::GraphLedger;
use crate::recipe::library::RecipeLibrary;

/// Marks one logical resource as taken.
///
/// Acquiring a taken flag fails instead of waiting: the baker runs on a single cooperative
/// thread, so a second holder can only be a re-entrant call.
#[derive(Debug)]
pub struct ExclusiveFlag {
    name: &'static str,
    taken: Cell<bool>,
}

impl ExclusiveFlag {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            taken: Cell::new(false),
        }
    }

    pub fn acquire(&self) -> BakeResult<()> {
        if self.taken.replace(true) {
            return Err(BakeError::precondition(format!(
                "{} already running",
                self.name
            )));
        }
        Ok(())
    }

    pub fn release(&self) {
        self.taken.set(false);
    }

    pub fn is_running(&self) -> bool {
        self.taken.get()
    }
}

/// Non-blocking lock around one poll tick.
#[derive(Debug, Default)]
pub struct TickLock {
    held: Cell<bool>,
}

impl TickLock {
    /// `None` while another tick is still executing.
    pub fn try_lock(&self) -> Option<TickGuard<'_>> {
        if self.held.replace(true) {
            return None;
        }
        Some(TickGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        self.held.get()
    }
}

pub struct TickGuard<'a> {
    lock: &'a TickLock,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.set(false);
    }
}

/// Process-wide baking state, passed by reference to every component that needs it.
///
/// Owns the single-flight flags of the bake manager and the orchestrator, the tick lock, the
/// registry of bake callbacks and the ledger of nodes added to material graphs.
#[derive(Debug)]
pub struct OrchestratorContext {
    pub manager: ExclusiveFlag,
    pub orchestrator: ExclusiveFlag,
    pub tick: TickLock,
    pub events: RefCell<EventRegistry>,
    pub ledger: RefCell<GraphLedger>,
    pub recipes: RecipeLibrary,
}

impl Default for OrchestratorContext {
    fn default() -> Self {
        Self::with_recipes(RecipeLibrary::default())
    }
}

impl OrchestratorContext {
    pub fn with_recipes(recipes: RecipeLibrary) -> Self {
        Self {
            manager: ExclusiveFlag::new("bake manager"),
            orchestrator: ExclusiveFlag::new("texture set bake"),
            tick: TickLock::default(),
            events: RefCell::new(EventRegistry::default()),
            ledger: RefCell::new(GraphLedger::default()),
            recipes,
        }
    }

    /// Drain host callbacks into the registry.
    pub fn pump_events(&self, host: &mut dyn Host) {
        let events = host.poll_events();
        if !events.is_empty() {
            trace!(count = events.len(), "host events");
            self.events.borrow_mut().dispatch(&events);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bake/context.rs"]
mod tests;

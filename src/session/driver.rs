use tracing::{debug, warn};

use crate::bake::context::OrchestratorContext;
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::Host;

/// What woke the cooperative loop up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopEvent {
    /// Periodic timer; the only event that advances a bake.
    Timer,
    /// User asked to stop.
    Escape,
    /// Anything else the host forwards. Passed through.
    Other,
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    Finished,
    Cancelled,
}

impl TickStatus {
    pub fn is_done(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A long-running bake advanced by host loop events.
pub trait BakeTask {
    fn tick(
        &mut self,
        host: &mut dyn Host,
        ctx: &OrchestratorContext,
        event: LoopEvent,
    ) -> BakeResult<TickStatus>;

    /// Stop right away and release everything held. Safe to call repeatedly.
    fn cancel(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext);
}

/// Feed timer ticks into `task` until it reports a terminal status.
///
/// A hung render job keeps a task running forever. `max_ticks` bounds that: once exceeded the
/// task is cancelled and a [`BakeError::Host`] is returned.
pub fn drive(
    host: &mut dyn Host,
    ctx: &OrchestratorContext,
    task: &mut dyn BakeTask,
    max_ticks: Option<u64>,
) -> BakeResult<TickStatus> {
    let mut ticks: u64 = 0;
    loop {
        let status = task.tick(host, ctx, LoopEvent::Timer)?;
        ticks += 1;
        if status.is_done() {
            debug!(ticks, ?status, "bake task stopped");
            return Ok(status);
        }
        if let Some(max) = max_ticks
            && ticks >= max
        {
            warn!(ticks, "bake task did not finish in time, cancelling");
            task.cancel(host, ctx);
            return Err(BakeError::host(format!(
                "bake did not finish within {max} ticks"
            )));
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/driver.rs"]
mod tests;

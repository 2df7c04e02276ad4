use tracing::{error, info, warn};

use crate::bake::context::OrchestratorContext;
use crate::bake::job::{BakeJob, BakeJobState};
use crate::bake::manager::remove_scratch_scene;
use crate::bake::objects::{BakeObjects, image_name_and_path};
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::Host;
use crate::session::driver::{BakeTask, LoopEvent, TickStatus};

/// Set name used for images of a selection bake.
pub const SELECTION_SET_NAME: &str = "simple";

/// Bake the host's active and selected objects with the project's simple settings.
#[derive(Debug)]
pub struct SelectionBake {
    job: BakeJob,
    outcome: Option<TickStatus>,
}

impl SelectionBake {
    pub fn start(host: &mut dyn Host, ctx: &OrchestratorContext) -> BakeResult<Self> {
        if ctx.manager.is_running() {
            return Err(BakeError::precondition("bake manager already running"));
        }
        if host.is_job_running() {
            return Err(BakeError::precondition("a render job is already running"));
        }
        let active = host
            .active_object()
            .ok_or_else(|| BakeError::precondition("no active object to bake"))?;
        let objects = BakeObjects::new(active, host.selected_objects())?;

        let project = host.project();
        let settings = project.simple_settings.clone();
        settings.validate()?;
        let (name, path) = image_name_and_path(
            &settings,
            SELECTION_SET_NAME,
            None,
            &project.output_directory,
        )?;

        let mut job = BakeJob::new(objects, settings, name, path);
        job.on_execute(host, ctx)?;
        Ok(Self { job, outcome: None })
    }

    pub fn job(&self) -> &BakeJob {
        &self.job
    }

    fn finish(&mut self, host: &mut dyn Host, status: TickStatus) -> TickStatus {
        remove_scratch_scene(host);
        self.outcome = Some(status);
        status
    }
}

impl BakeTask for SelectionBake {
    #[tracing::instrument(skip(self, host, ctx), fields(image = %self.job.image_name()))]
    fn tick(
        &mut self,
        host: &mut dyn Host,
        ctx: &OrchestratorContext,
        event: LoopEvent,
    ) -> BakeResult<TickStatus> {
        if let Some(outcome) = self.outcome {
            return Ok(outcome);
        }
        match event {
            LoopEvent::Escape => {
                self.cancel(host, ctx);
                return Ok(TickStatus::Cancelled);
            }
            LoopEvent::Other => return Ok(TickStatus::Running),
            LoopEvent::Timer => {}
        }

        let Some(_guard) = ctx.tick.try_lock() else {
            return Ok(TickStatus::Running);
        };
        match self.job.on_modal(host, ctx) {
            Ok(BakeJobState::Running) => Ok(TickStatus::Running),
            Ok(BakeJobState::Finished) => {
                info!(path = %self.job.image_path().display(), "selection baked");
                Ok(self.finish(host, TickStatus::Finished))
            }
            Ok(BakeJobState::Canceled) => {
                warn!("selection bake was cancelled by the host");
                self.job.cancel(host, ctx);
                Ok(self.finish(host, TickStatus::Cancelled))
            }
            Err(e) => {
                error!(error = %e, "selection bake failed");
                self.job.cancel(host, ctx);
                self.finish(host, TickStatus::Cancelled);
                Err(e)
            }
        }
    }

    fn cancel(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if self.outcome.is_some() {
            return;
        }
        self.job.cancel(host, ctx);
        self.finish(host, TickStatus::Cancelled);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/selected.rs"]
mod tests;

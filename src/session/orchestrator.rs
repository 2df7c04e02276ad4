use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::bake::context::OrchestratorContext;
use crate::bake::job::{BakeJob, BakeJobState};
use crate::bake::manager::remove_scratch_scene;
use crate::bake::objects::{BakeObjects, MeshGroup, image_name_and_path, mesh_groups};
use crate::foundation::core::{BakeState, StableId, format_elapsed};
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::{Host, require_object};
use crate::scene::settings::{BakeMode, BakeSettings};
use crate::scene::texture_set::TextureSet;
use crate::session::driver::{BakeTask, LoopEvent, TickStatus};
use crate::session::materials;

#[derive(Debug)]
struct TextureWork {
    id: StableId,
    settings: BakeSettings,
    groups: VecDeque<MeshGroup>,
}

#[derive(Debug)]
struct ActiveTexture {
    work: TextureWork,
    started: Instant,
}

/// Bakes every enabled texture of a texture set, one mesh group at a time.
///
/// Created by [`start`](Self::start) and advanced by [`tick`](BakeTask::tick) until it reports
/// [`TickStatus::Finished`] or [`TickStatus::Cancelled`]. Progress is written into the texture
/// set's persisted texture and mesh states as it goes.
#[derive(Debug)]
pub struct BakeOrchestrator {
    set_id: StableId,
    set_name: String,
    mode: BakeMode,
    output_directory: PathBuf,
    queue: VecDeque<TextureWork>,
    current: Option<ActiveTexture>,
    job: Option<BakeJob>,
    clear_image: bool,
    holds_flag: bool,
    outcome: Option<TickStatus>,
    jobs_started: usize,
}

impl BakeOrchestrator {
    /// Validate the texture set and queue its textures.
    ///
    /// `set_key` is a texture set id or display name. With `texture` only that texture is baked,
    /// enabled or not. Fails without touching the document when anything is off.
    pub fn start(
        host: &mut dyn Host,
        ctx: &OrchestratorContext,
        set_key: &str,
        texture: Option<&StableId>,
    ) -> BakeResult<Self> {
        if ctx.orchestrator.is_running() {
            return Err(BakeError::precondition("texture set bake already running"));
        }
        if ctx.manager.is_running() {
            return Err(BakeError::precondition("bake manager already running"));
        }
        if host.is_job_running() {
            return Err(BakeError::precondition("a render job is already running"));
        }

        let project = host.project();
        let set = project.find_texture_set(set_key).ok_or_else(|| {
            BakeError::precondition(format!("texture set {set_key:?} not found"))
        })?;
        let queue = build_queue(&*host, set, texture)?;
        let set_id = set.id.clone();
        let set_name = set.display_name.clone();
        let mode = set.mode;
        let output_directory = project.output_directory.clone();

        ctx.orchestrator.acquire()?;
        if let Some(set) = host.project_mut().texture_set_mut(&set_id) {
            for work in &queue {
                if let Some(t) = set.texture_mut(&work.id) {
                    t.state = BakeState::Queued;
                }
            }
        }
        info!(
            set = %set_name,
            textures = queue.len(),
            ?mode,
            "texture set bake queued"
        );

        Ok(Self {
            set_id,
            set_name,
            mode,
            output_directory,
            queue,
            current: None,
            job: None,
            clear_image: true,
            holds_flag: true,
            outcome: None,
            jobs_started: 0,
        })
    }

    pub fn set_id(&self) -> &StableId {
        &self.set_id
    }

    /// Terminal status once the run has stopped.
    pub fn outcome(&self) -> Option<TickStatus> {
        self.outcome
    }

    /// Number of bake jobs started so far.
    pub fn jobs_started(&self) -> usize {
        self.jobs_started
    }

    fn step(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) -> BakeResult<TickStatus> {
        if let Some(job) = self.job.as_mut() {
            match job.on_modal(host, ctx)? {
                BakeJobState::Running => return Ok(TickStatus::Running),
                BakeJobState::Canceled => {
                    warn!("bake job was cancelled by the host");
                    self.job = None;
                    self.abort(host, ctx);
                    return Ok(TickStatus::Cancelled);
                }
                BakeJobState::Finished => {
                    self.job = None;
                    self.complete_group(host);
                }
            }
        }

        if self
            .current
            .as_ref()
            .is_some_and(|c| c.work.groups.is_empty())
        {
            self.complete_texture(host);
        }
        if self.current.is_none() {
            match self.queue.pop_front() {
                Some(work) => self.begin_texture(host, work),
                None => return self.finish(host, ctx),
            }
        }

        if take_pause(host) {
            debug!("paused between mesh groups");
            return Ok(TickStatus::Running);
        }
        if host.is_job_running() || ctx.manager.is_running() {
            debug!("waiting for another render job to stop");
            return Ok(TickStatus::Running);
        }
        self.start_group(host, ctx)?;
        Ok(TickStatus::Running)
    }

    fn begin_texture(&mut self, host: &mut dyn Host, work: TextureWork) {
        info!(
            texture = work.settings.texture_type.key(),
            groups = work.groups.len(),
            "baking texture"
        );
        let id = work.id.clone();
        let meshes: Vec<String> = work
            .groups
            .iter()
            .flat_map(|g| g.selected.iter().cloned())
            .collect();
        self.update_set(host, |set| {
            if let Some(t) = set.texture_mut(&id) {
                t.state = BakeState::Running;
            }
            set.mark_meshes(meshes.iter().map(String::as_str), BakeState::Queued);
        });
        self.clear_image = true;
        self.current = Some(ActiveTexture {
            work,
            started: Instant::now(),
        });
    }

    fn start_group(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) -> BakeResult<()> {
        let Some(current) = self.current.as_ref() else {
            return Ok(());
        };
        let Some(group) = current.work.groups.front() else {
            return Ok(());
        };
        let settings = &current.work.settings;

        let view: &dyn Host = &*host;
        let active = require_object(view, &group.active)?;
        let selected = group
            .selected
            .iter()
            .map(|name| require_object(view, name))
            .collect::<BakeResult<Vec<_>>>()?;
        let objects = BakeObjects::new(active, selected)?;

        let suffix = (self.mode == BakeMode::PerObject).then_some(group.active.as_str());
        let (name, path) =
            image_name_and_path(settings, &self.set_name, suffix, &self.output_directory)?;
        let last_group = current.work.groups.len() == 1;
        let scale = self.mode == BakeMode::PerObject || last_group;

        let mut job = BakeJob::new(objects, settings.clone(), name, path)
            .clear_image(self.clear_image)
            .scale_image(scale);

        let meshes = group.selected.clone();
        self.update_set(host, |set| {
            set.mark_meshes(meshes.iter().map(String::as_str), BakeState::Running);
        });
        debug!(
            active = %group.active,
            meshes = meshes.len(),
            clear = self.clear_image,
            scale,
            "starting mesh group"
        );
        job.on_execute(host, ctx)?;
        self.jobs_started += 1;
        self.job = Some(job);
        Ok(())
    }

    fn complete_group(&mut self, host: &mut dyn Host) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let Some(group) = current.work.groups.pop_front() else {
            return;
        };
        if self.mode == BakeMode::Single {
            self.clear_image = false;
        }
        self.update_set(host, |set| {
            set.mark_meshes(group.selected.iter().map(String::as_str), BakeState::Finished);
        });
    }

    fn complete_texture(&mut self, host: &mut dyn Host) {
        let Some(done) = self.current.take() else {
            return;
        };
        let elapsed = format_elapsed(done.started.elapsed());
        info!(
            texture = done.work.settings.texture_type.key(),
            elapsed = %elapsed,
            "texture baked"
        );
        let id = done.work.id;
        self.update_set(host, |set| {
            if let Some(t) = set.texture_mut(&id) {
                t.state = BakeState::Finished;
                t.last_bake_time = elapsed;
            }
        });
        self.clear_image = true;
    }

    fn finish(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) -> BakeResult<TickStatus> {
        remove_scratch_scene(host);
        let policy = host
            .project()
            .texture_set(&self.set_id)
            .map(|s| s.create_materials.enabled)
            .unwrap_or(false);
        let created = if policy {
            materials::create_materials(host, &self.set_id).map(|m| m.len())
        } else {
            Ok(0)
        };
        self.release(ctx);
        self.outcome = Some(TickStatus::Finished);
        let created = created?;
        info!(
            set = %self.set_name,
            jobs = self.jobs_started,
            materials = created,
            "texture set baked"
        );
        Ok(TickStatus::Finished)
    }

    /// Cancel the in-flight job and mark everything not finished as cancelled.
    fn abort(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if let Some(mut job) = self.job.take() {
            job.cancel(host, ctx);
        }

        let mut textures: Vec<StableId> = self.queue.drain(..).map(|w| w.id).collect();
        let mut meshes: Vec<String> = Vec::new();
        if let Some(current) = self.current.take() {
            textures.push(current.work.id);
            meshes.extend(current.work.groups.into_iter().flat_map(|g| g.selected));
        }
        self.update_set(host, |set| {
            for id in &textures {
                if let Some(t) = set.texture_mut(id) {
                    t.state = BakeState::Cancelled;
                }
            }
            set.mark_meshes(meshes.iter().map(String::as_str), BakeState::Cancelled);
        });

        remove_scratch_scene(host);
        self.release(ctx);
        if self.outcome.is_none() {
            info!(set = %self.set_name, "texture set bake cancelled");
        }
        self.outcome = Some(TickStatus::Cancelled);
    }

    fn release(&mut self, ctx: &OrchestratorContext) {
        if self.holds_flag {
            self.holds_flag = false;
            ctx.orchestrator.release();
        }
    }

    fn update_set(&self, host: &mut dyn Host, f: impl FnOnce(&mut TextureSet)) {
        match host.project_mut().texture_set_mut(&self.set_id) {
            Some(set) => f(set),
            None => warn!(set = %self.set_name, "texture set disappeared during bake"),
        }
    }
}

impl BakeTask for BakeOrchestrator {
    #[tracing::instrument(skip(self, host, ctx), fields(set = %self.set_name))]
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
                self.abort(host, ctx);
                return Ok(TickStatus::Cancelled);
            }
            LoopEvent::Other => return Ok(TickStatus::Running),
            LoopEvent::Timer => {}
        }

        let Some(_guard) = ctx.tick.try_lock() else {
            debug!("previous tick still in progress, skipping");
            return Ok(TickStatus::Running);
        };
        match self.step(host, ctx) {
            Ok(status) => Ok(status),
            Err(e) => {
                error!(error = %e, "texture set bake failed");
                if self.outcome != Some(TickStatus::Finished) {
                    self.abort(host, ctx);
                }
                Err(e)
            }
        }
    }

    fn cancel(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if self.outcome.is_none() || self.holds_flag {
            self.abort(host, ctx);
        }
    }
}

/// Consume the single-step toggle or report that advancing is on hold.
fn take_pause(host: &mut dyn Host) -> bool {
    let utils = &mut host.project_mut().utils;
    if !utils.debug_pause {
        return false;
    }
    if utils.debug_pause_continue {
        utils.debug_pause_continue = false;
        return false;
    }
    true
}

/// Per-texture work list, or the reason the set can not be baked.
fn build_queue(
    host: &dyn Host,
    set: &TextureSet,
    texture: Option<&StableId>,
) -> BakeResult<VecDeque<TextureWork>> {
    let textures: Vec<_> = match texture {
        Some(id) => vec![set.texture(id).ok_or_else(|| {
            BakeError::precondition(format!(
                "texture {id} not found in texture set {:?}",
                set.display_name
            ))
        })?],
        None => set.enabled_textures().collect(),
    };
    if textures.is_empty() {
        return Err(BakeError::precondition(format!(
            "texture set {:?} has no enabled textures",
            set.display_name
        )));
    }

    let meshes: Vec<&str> = set.enabled_meshes().map(|m| m.name.as_str()).collect();
    if meshes.is_empty() {
        return Err(BakeError::precondition(format!(
            "texture set {:?} has no enabled meshes",
            set.display_name
        )));
    }
    for name in &meshes {
        require_object(host, name)?;
    }

    let require_high = set.mode == BakeMode::PerObject;
    textures
        .into_iter()
        .map(|t| {
            t.settings.validate()?;
            let groups = mesh_groups(&meshes, t.settings.bake_high_to_low(), require_high)?;
            if groups.is_empty() {
                return Err(BakeError::precondition(format!(
                    "no mesh to bake for texture {:?}",
                    t.settings.texture_type.key()
                )));
            }
            Ok(TextureWork {
                id: t.id.clone(),
                settings: t.settings.clone(),
                groups: groups.into(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/session/orchestrator.rs"]
mod tests;

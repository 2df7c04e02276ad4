use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bake::context::OrchestratorContext;
use crate::bake::events::{HandlerKey, HandlerState};
use crate::bake::manager::BakeManager;
use crate::bake::objects::BakeObjects;
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::Host;
use crate::host::ids::ImageId;
use crate::scene::settings::BakeSettings;

/// Externally visible state of a [`BakeJob`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BakeJobState {
    Running,
    Canceled,
    Finished,
}

/// One render invocation into one image.
///
/// Created, executed once, polled until it reports a terminal state, then dropped.
#[derive(Debug)]
pub struct BakeJob {
    objects: BakeObjects,
    settings: BakeSettings,
    image_name: String,
    image_path: PathBuf,
    clear_image: bool,
    scale_image: bool,
    image: Option<ImageId>,
    manager: Option<BakeManager>,
    handler: Option<HandlerKey>,
}

impl BakeJob {
    pub fn new(
        objects: BakeObjects,
        settings: BakeSettings,
        image_name: impl Into<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            objects,
            settings,
            image_name: image_name.into(),
            image_path: image_path.into(),
            clear_image: true,
            scale_image: true,
            image: None,
            manager: None,
            handler: None,
        }
    }

    /// Start from a blank image instead of accumulating into the existing pixels.
    pub fn clear_image(mut self, clear: bool) -> Self {
        self.clear_image = clear;
        self
    }

    /// Scale a supersampled image down to its nominal size before saving.
    pub fn scale_image(mut self, scale: bool) -> Self {
        self.scale_image = scale;
        self
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn objects(&self) -> &BakeObjects {
        &self.objects
    }

    /// Prepare the target image, register for bake callbacks and start the render job.
    #[tracing::instrument(skip_all, fields(image = %self.image_name))]
    pub fn on_execute(
        &mut self,
        host: &mut dyn Host,
        ctx: &OrchestratorContext,
    ) -> BakeResult<BakeJobState> {
        if self.manager.is_some() {
            return Err(BakeError::precondition("bake job was already executed"));
        }
        if host.is_job_running() {
            return Err(BakeError::precondition("a render job is already running"));
        }
        if ctx.manager.is_running() {
            return Err(BakeError::precondition("bake manager already running"));
        }
        ctx.recipes.recipe_for(self.settings.texture_type)?;

        let image = self.prepare_image(host)?;
        self.image = Some(image);
        if host.project().utils.show_image_in_editor {
            host.show_image(image);
        }

        let keep_scene = host.project().utils.keep_scene;
        let manager = self.manager.insert(BakeManager::new(
            self.objects.clone(),
            self.settings.clone(),
            image,
            self.clear_image,
            keep_scene,
        ));
        // Events still queued from earlier jobs must not reach this job's handler.
        ctx.pump_events(host);
        self.handler = Some(ctx.events.borrow_mut().register(self.objects.active()));

        if let Err(e) = manager.on_execute(host, ctx) {
            self.release_handler(ctx);
            return Err(e);
        }
        info!(clear = self.clear_image, "bake started");
        Ok(BakeJobState::Running)
    }

    /// Advance the job by one cooperative tick.
    pub fn on_modal(
        &mut self,
        host: &mut dyn Host,
        ctx: &OrchestratorContext,
    ) -> BakeResult<BakeJobState> {
        let Some(manager) = self.manager.as_mut() else {
            return Err(BakeError::precondition("bake job was never executed"));
        };
        ctx.pump_events(host);
        manager.on_modal(host, ctx);
        if manager.is_running() {
            return Ok(BakeJobState::Running);
        }

        let state = self
            .handler
            .and_then(|key| ctx.events.borrow().state(key))
            .unwrap_or_default();
        match state {
            HandlerState::Pre => {
                debug!("render job stopped but its final callback was not seen yet");
                return Ok(BakeJobState::Running);
            }
            HandlerState::Canceled => {
                self.release_handler(ctx);
                return Ok(BakeJobState::Canceled);
            }
            HandlerState::Complete => {
                if let Some(image) = self.image
                    && host.image_info(image)?.is_dirty
                {
                    let finalized = self.finalize(host, image);
                    self.release_handler(ctx);
                    finalized?;
                    return Ok(BakeJobState::Finished);
                }
            }
            HandlerState::Created => {}
        }

        self.release_handler(ctx);
        Err(BakeError::host(
            "bake went wrong: render job is not running but the image appears unchanged",
        ))
    }

    /// Stop the render job, clean up and drop the callback registration.
    pub fn cancel(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if let Some(manager) = self.manager.as_mut() {
            manager.cancel(host, ctx);
        }
        self.release_handler(ctx);
    }

    fn release_handler(&mut self, ctx: &OrchestratorContext) {
        if let Some(key) = self.handler.take()
            && !ctx.events.borrow_mut().deregister(key)
        {
            warn!("bake callback handler was already removed");
        }
    }

    /// Find, load or create the target image and make it match the settings.
    fn prepare_image(&self, host: &mut dyn Host) -> BakeResult<ImageId> {
        let info = self.settings.texture_type.info();
        let size = self.settings.real_size();

        let mut existing = host.image_by_name(&self.image_name);
        if existing.is_none() && self.image_path.exists() {
            debug!(path = %self.image_path.display(), "loading image from disk");
            existing = Some(host.load_image(&self.image_path)?);
        }

        let image = match existing {
            None => {
                debug!("creating new image");
                let image = host.create_image(&self.image_name, size, size, info.is_float)?;
                host.set_image_filepath(image, &self.image_path)?;
                image
            }
            Some(image) => {
                let current = host.image_info(image)?;
                let stored = current.filepath.as_deref().unwrap_or(Path::new(""));
                if !same_path(stored, &self.image_path) {
                    return Err(BakeError::image_conflict(format!(
                        "existing image {:?} has a different file path: expected '{}', got '{}'",
                        self.image_name,
                        self.image_path.display(),
                        stored.display()
                    )));
                }
                if self.clear_image {
                    debug!("clearing existing image");
                    let blank = host.create_image(&self.image_name, size, size, info.is_float)?;
                    host.set_image_filepath(blank, &self.image_path)?;
                    host.save_image(blank)?;
                    host.remove_image(blank)?;
                    host.reload_image(image)?;
                } else if current.width != size
                    || current.height != size
                    || current.is_float != info.is_float
                {
                    return Err(BakeError::image_conflict(format!(
                        "image {:?} already exists but its parameters don't match: \
                         {}x{} float={}, expected {size}x{size} float={}",
                        self.image_name,
                        current.width,
                        current.height,
                        current.is_float,
                        info.is_float
                    )));
                }
                image
            }
        };
        host.set_image_colorspace(image, info.colorspace)?;
        Ok(image)
    }

    fn finalize(&self, host: &mut dyn Host, image: ImageId) -> BakeResult<()> {
        if self.scale_image && self.settings.sampling > 1 {
            host.scale_image(image, self.settings.size, self.settings.size)?;
        }
        host.save_image(image)?;
        info!(path = %self.image_path.display(), "image saved");

        let (unlink, show) = {
            let utils = &host.project().utils;
            (utils.unlink_baked_image, utils.show_image_in_editor)
        };
        if unlink {
            host.remove_image(image)?;
        } else if show {
            host.show_image(image);
        }
        Ok(())
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (std::path::absolute(a), std::path::absolute(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bake/job.rs"]
mod tests;

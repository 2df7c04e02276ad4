use tracing::{debug, error, warn};

use crate::bake::context::OrchestratorContext;
use crate::bake::objects::BakeObjects;
use crate::foundation::core::generate_color_set;
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::ids::{ImageId, MaterialId, SceneId};
use crate::host::{BakeLaunch, BakeParams, Host, RenderSettings, objects_materials};
use crate::material::editor::{self, SetupRequest};
use crate::scene::settings::BakeSettings;

/// Name of the scene objects are moved into while baking.
pub const SCRATCH_SCENE: &str = "texbake_tmp";
/// Name of the collection holding the baked objects inside [`SCRATCH_SCENE`].
pub const SCRATCH_COLLECTION: &str = "texbake_tmp";

const RENDER_ENGINE: &str = "cycles";
const RENDER_DEVICE: &str = "GPU";

#[derive(Debug)]
struct SavedState {
    render: RenderSettings,
    scene: SceneId,
}

/// Prepares the scratch scene, materials and renderer for one bake and undoes all of it after.
#[derive(Debug)]
pub struct BakeManager {
    objects: BakeObjects,
    settings: BakeSettings,
    image: ImageId,
    clear_image: bool,
    keep_scene: bool,
    saved: Option<SavedState>,
    /// Materials whose graphs were rewritten for this bake.
    materials: Vec<MaterialId>,
    holds_flag: bool,
}

impl BakeManager {
    pub fn new(
        objects: BakeObjects,
        settings: BakeSettings,
        image: ImageId,
        clear_image: bool,
        keep_scene: bool,
    ) -> Self {
        Self {
            objects,
            settings,
            image,
            clear_image,
            keep_scene,
            saved: None,
            materials: Vec::new(),
            holds_flag: false,
        }
    }

    /// `true` from a successful [`on_execute`](Self::on_execute) until cleanup.
    pub fn is_running(&self) -> bool {
        self.holds_flag
    }

    /// Set everything up and start the render job without waiting for it.
    ///
    /// On any failure the partial setup is cleaned up before the error is returned.
    pub fn on_execute(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) -> BakeResult<()> {
        if ctx.manager.is_running() {
            return Err(BakeError::precondition("bake manager already running"));
        }
        if host.is_job_running() {
            return Err(BakeError::precondition("a render job is already running"));
        }

        self.saved = Some(SavedState {
            render: host.render_settings(),
            scene: host.active_scene(),
        });
        ctx.manager.acquire()?;
        self.holds_flag = true;

        match self.start(host, ctx) {
            Ok(BakeLaunch::Running) => Ok(()),
            Ok(BakeLaunch::Failed(reason)) => {
                self.cleanup(host, ctx);
                Err(BakeError::host(format!("failed to start baking: {reason}")))
            }
            Err(e) => {
                error!(error = %e, "failed to start baking, cleaning up");
                self.cleanup(host, ctx);
                Err(e)
            }
        }
    }

    fn start(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) -> BakeResult<BakeLaunch> {
        let mut render = host.render_settings();
        render.engine = RENDER_ENGINE.to_string();
        render.device = RENDER_DEVICE.to_string();
        if self.settings.samples > 0 {
            render.samples = self.settings.samples;
        }
        render.use_denoising = self.settings.use_denoising;
        render.lock_interface = true;
        host.set_render_settings(render);

        let scene = prepare_scratch_scene(host)?;
        host.set_active_scene(scene)?;
        self.set_up_objects(host, scene)?;

        let materials = objects_materials(host, self.objects.selected())?;
        let material_count = materials.len();
        let recipe = ctx.recipes.recipe_for(self.settings.texture_type)?;
        if recipe.is_native() {
            debug!(texture = self.settings.texture_type.key(), "native pass, graphs untouched");
        } else {
            self.materials = materials;
            let colors = generate_color_set(self.materials.len());
            let mut ledger = ctx.ledger.borrow_mut();
            for mat in &self.materials {
                editor::cleanup(host, &mut ledger, *mat);
            }
            for (mat, color) in self.materials.iter().zip(colors) {
                editor::setup(
                    host,
                    &mut ledger,
                    *mat,
                    &SetupRequest {
                        recipe,
                        mat_id_color: color,
                        target_image: self.image,
                        settings: &self.settings,
                    },
                )?;
            }
        }

        let s = &self.settings;
        let size = s.real_size();
        debug!(
            objects = self.objects.selected().len(),
            materials = material_count,
            size,
            clear = self.clear_image,
            "starting render job"
        );
        Ok(host.bake_async(&BakeParams {
            pass: s.texture_type.info().pass,
            target: self.image,
            width: size,
            height: size,
            margin: s.real_margin(),
            margin_type: s.margin_type,
            use_selected_to_active: s.use_selected_to_active,
            use_cage: s.use_cage,
            cage_extrusion: s.cage_extrusion,
            max_ray_distance: s.max_ray_distance,
            use_clear: self.clear_image,
        }))
    }

    fn set_up_objects(&self, host: &mut dyn Host, scene: SceneId) -> BakeResult<()> {
        for obj in host.selected_objects() {
            host.set_selected(obj, false)?;
        }
        let root = host.scene_collection(scene)?;
        let coll = host.create_collection(SCRATCH_COLLECTION, root)?;
        for obj in self.objects.selected() {
            host.link_object(coll, *obj)?;
            host.reveal_object(*obj)?;
            host.set_selected(*obj, true)?;
        }
        host.set_active_object(Some(self.objects.active()))
    }

    /// Clean up once the render job has stopped.
    pub fn on_modal(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if !self.holds_flag || host.is_job_running() {
            return;
        }
        self.cleanup(host, ctx);
    }

    /// Undo everything [`on_execute`](Self::on_execute) did. Safe to call repeatedly.
    ///
    /// Runs in a fixed order: renderer settings and scene, material graphs, scratch collection
    /// and scene, then the single-flight flag. Failures are logged and the remaining steps still
    /// run.
    pub fn cleanup(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if let Some(saved) = self.saved.take() {
            host.set_render_settings(saved.render);
            if let Err(e) = host.set_active_scene(saved.scene) {
                warn!(error = %e, "could not restore the active scene");
            }
        }

        let materials = std::mem::take(&mut self.materials);
        if !materials.is_empty() {
            let mut ledger = ctx.ledger.borrow_mut();
            for mat in materials {
                editor::cleanup(host, &mut ledger, mat);
            }
        }

        cleanup_scratch(host, self.keep_scene);

        if self.holds_flag {
            self.holds_flag = false;
            ctx.manager.release();
        }
    }

    /// Stop the render job if it is still going, then clean up.
    pub fn cancel(&mut self, host: &mut dyn Host, ctx: &OrchestratorContext) {
        if self.holds_flag && host.is_job_running() {
            host.cancel_job();
        }
        self.cleanup(host, ctx);
    }
}

fn prepare_scratch_scene(host: &mut dyn Host) -> BakeResult<SceneId> {
    if let Some(stale) = host.collection_by_name(SCRATCH_COLLECTION) {
        host.remove_collection(stale)?;
    }
    match host.scene_by_name(SCRATCH_SCENE) {
        Some(scene) => Ok(scene),
        None => {
            debug!(scene = SCRATCH_SCENE, "creating scratch scene");
            host.create_scene(SCRATCH_SCENE)
        }
    }
}

fn cleanup_scratch(host: &mut dyn Host, keep_scene: bool) {
    if let Some(coll) = host.collection_by_name(SCRATCH_COLLECTION) {
        let objects = host.collection_objects(coll).unwrap_or_default();
        for obj in objects {
            if let Err(e) = host.unlink_object(coll, obj) {
                warn!(error = %e, "could not unlink object from scratch collection");
            }
        }
        if let Err(e) = host.remove_collection(coll) {
            warn!(error = %e, "could not remove scratch collection");
        }
    }
    if !keep_scene {
        remove_scratch_scene(host);
    }
}

/// Remove the scratch scene if it exists. Failures are logged.
pub fn remove_scratch_scene(host: &mut dyn Host) {
    let Some(scene) = host.scene_by_name(SCRATCH_SCENE) else {
        return;
    };
    if let Err(e) = host.remove_scene(scene) {
        warn!(error = %e, "could not remove scratch scene");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/bake/manager.rs"]
mod tests;

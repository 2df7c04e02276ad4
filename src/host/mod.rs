//! Narrow contract between the baker and the 3D host.
//!
//! The baker never reaches into host internals. Everything it needs (an opaque asynchronous bake
//! primitive, image storage, material graphs, scenes and collections, and the persisted
//! [`Project`]) goes through the traits in this module. [`sim::SimHost`] is an in-memory
//! implementation used by the CLI and the tests.

use std::path::{Path, PathBuf};

use crate::foundation::core::Rgb;
use crate::foundation::error::BakeResult;
use crate::scene::project::Project;
use crate::scene::settings::{Colorspace, MarginType, RenderPass};

pub mod graph;
pub mod ids;
pub mod sim;

use graph::{NodeInfo, NodeKind, SocketRef, SocketValue};
use ids::{CollectionId, ImageId, MaterialId, NodeId, ObjectId, SceneId};

/// User-visible renderer settings touched while baking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderSettings {
    pub engine: String,
    pub device: String,
    pub samples: u32,
    pub use_denoising: bool,
    pub lock_interface: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            engine: "eevee".to_string(),
            device: "CPU".to_string(),
            samples: 64,
            use_denoising: true,
            lock_interface: false,
        }
    }
}

/// Arguments of one invocation of the opaque bake primitive.
///
/// Sizes and margins are already multiplied by the supersampling factor.
#[derive(Clone, Debug, PartialEq)]
pub struct BakeParams {
    pub pass: RenderPass,
    pub target: ImageId,
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub margin_type: MarginType,
    pub use_selected_to_active: bool,
    pub use_cage: bool,
    pub cage_extrusion: f32,
    pub max_ray_distance: f32,
    /// Clear the target before writing. `false` accumulates into it.
    pub use_clear: bool,
}

/// Immediate result of [`RenderJobs::bake_async`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BakeLaunch {
    /// The job is now running in the background.
    Running,
    /// The host refused or failed to start the job.
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    Pre,
    Cancel,
    Complete,
}

/// Bake callback fired by the host, keyed by the object being baked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostEvent {
    pub kind: HostEventKind,
    pub object: ObjectId,
}

/// Procedural helper maps the host can generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratedKind {
    UvGrid,
    ColorGrid,
}

/// Snapshot of an image datablock.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageInfo {
    pub name: String,
    pub filepath: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub is_float: bool,
    pub colorspace: Colorspace,
    /// Pixels changed since the image was created, loaded, reloaded or saved.
    pub is_dirty: bool,
}

/// Opaque asynchronous bake primitive plus the renderer settings it reads.
pub trait RenderJobs {
    /// Start a bake of the active scene's selection without blocking.
    fn bake_async(&mut self, params: &BakeParams) -> BakeLaunch;
    fn is_job_running(&self) -> bool;
    fn cancel_job(&mut self);
    /// Drain the bake callbacks fired since the last call.
    fn poll_events(&mut self) -> Vec<HostEvent>;
    fn render_settings(&self) -> RenderSettings;
    fn set_render_settings(&mut self, settings: RenderSettings);
}

pub trait ImageStore {
    fn image_by_name(&self, name: &str) -> Option<ImageId>;
    fn image_info(&self, image: ImageId) -> BakeResult<ImageInfo>;
    fn create_image(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        is_float: bool,
    ) -> BakeResult<ImageId>;
    fn create_generated(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        kind: GeneratedKind,
    ) -> BakeResult<ImageId>;
    /// Load an image file. The datablock is named after the file name.
    fn load_image(&mut self, path: &Path) -> BakeResult<ImageId>;
    /// Write the image to its file path.
    fn save_image(&mut self, image: ImageId) -> BakeResult<()>;
    /// Re-read the pixels from the file path.
    fn reload_image(&mut self, image: ImageId) -> BakeResult<()>;
    fn scale_image(&mut self, image: ImageId, width: u32, height: u32) -> BakeResult<()>;
    fn remove_image(&mut self, image: ImageId) -> BakeResult<()>;
    fn set_image_filepath(&mut self, image: ImageId, path: &Path) -> BakeResult<()>;
    fn set_image_colorspace(&mut self, image: ImageId, colorspace: Colorspace) -> BakeResult<()>;
    /// Surface the image in a viewer, if the host has one.
    fn show_image(&mut self, _image: ImageId) {}
}

pub trait ShaderGraphStore {
    fn material_by_name(&self, name: &str) -> Option<MaterialId>;
    fn material_name(&self, material: MaterialId) -> BakeResult<String>;
    fn create_material(&mut self, name: &str) -> BakeResult<MaterialId>;
    /// Deep copy of a material, graph included.
    fn copy_material(&mut self, material: MaterialId, name: &str) -> BakeResult<MaterialId>;
    fn remove_material(&mut self, material: MaterialId) -> BakeResult<()>;

    fn material_nodes(&self, material: MaterialId) -> BakeResult<Vec<NodeInfo>>;
    /// Add a node. The host may alter `name` to keep names unique.
    fn add_node(&mut self, material: MaterialId, kind: NodeKind, name: &str)
    -> BakeResult<NodeId>;
    fn remove_node(&mut self, material: MaterialId, node: NodeId) -> BakeResult<()>;
    /// Connect an output socket to an input socket, replacing any existing link into `input`.
    fn link(
        &mut self,
        material: MaterialId,
        from: &SocketRef,
        to: NodeId,
        input: &str,
    ) -> BakeResult<()>;
    /// Output socket linked into `input`, if any.
    fn upstream(
        &self,
        material: MaterialId,
        node: NodeId,
        input: &str,
    ) -> BakeResult<Option<SocketRef>>;
    fn input_default(
        &self,
        material: MaterialId,
        node: NodeId,
        input: &str,
    ) -> BakeResult<Option<SocketValue>>;
    fn set_input_default(
        &mut self,
        material: MaterialId,
        node: NodeId,
        input: &str,
        value: SocketValue,
    ) -> BakeResult<()>;
    fn set_node_image(
        &mut self,
        material: MaterialId,
        node: NodeId,
        image: Option<ImageId>,
    ) -> BakeResult<()>;
    fn set_node_muted(&mut self, material: MaterialId, node: NodeId, muted: bool)
    -> BakeResult<()>;
    /// Node the bake primitive writes through.
    fn set_active_node(&mut self, material: MaterialId, node: NodeId) -> BakeResult<()>;
    /// Material output the renderer evaluates.
    fn set_active_output(&mut self, material: MaterialId, node: NodeId) -> BakeResult<()>;
}

pub trait SceneStore {
    fn object_by_name(&self, name: &str) -> Option<ObjectId>;
    fn object_name(&self, object: ObjectId) -> BakeResult<String>;
    /// Distinct materials in slot order. Empty slots are skipped.
    fn object_materials(&self, object: ObjectId) -> BakeResult<Vec<MaterialId>>;
    fn material_slot_count(&self, object: ObjectId) -> BakeResult<usize>;
    /// Assign a material to a slot. A slot past the end appends one.
    fn assign_material(
        &mut self,
        object: ObjectId,
        slot: usize,
        material: Option<MaterialId>,
    ) -> BakeResult<()>;
    fn object_color(&self, object: ObjectId) -> BakeResult<Rgb>;
    fn set_object_color(&mut self, object: ObjectId, color: Rgb) -> BakeResult<()>;
    /// Make the object visible and renderable.
    fn reveal_object(&mut self, object: ObjectId) -> BakeResult<()>;

    /// Selected objects of the active scene.
    fn selected_objects(&self) -> Vec<ObjectId>;
    fn set_selected(&mut self, object: ObjectId, selected: bool) -> BakeResult<()>;
    fn active_object(&self) -> Option<ObjectId>;
    fn set_active_object(&mut self, object: Option<ObjectId>) -> BakeResult<()>;

    fn active_scene(&self) -> SceneId;
    fn set_active_scene(&mut self, scene: SceneId) -> BakeResult<()>;
    fn scene_by_name(&self, name: &str) -> Option<SceneId>;
    fn scene_names(&self) -> Vec<String>;
    fn create_scene(&mut self, name: &str) -> BakeResult<SceneId>;
    fn remove_scene(&mut self, scene: SceneId) -> BakeResult<()>;
    /// Root collection of a scene.
    fn scene_collection(&self, scene: SceneId) -> BakeResult<CollectionId>;

    fn collection_by_name(&self, name: &str) -> Option<CollectionId>;
    fn create_collection(&mut self, name: &str, parent: CollectionId)
    -> BakeResult<CollectionId>;
    /// Remove a collection. Objects in it are unlinked, never deleted.
    fn remove_collection(&mut self, collection: CollectionId) -> BakeResult<()>;
    /// Link by reference. Linking twice is a no-op.
    fn link_object(&mut self, collection: CollectionId, object: ObjectId) -> BakeResult<()>;
    fn unlink_object(&mut self, collection: CollectionId, object: ObjectId) -> BakeResult<()>;
    fn collection_objects(&self, collection: CollectionId) -> BakeResult<Vec<ObjectId>>;
}

/// Persisted document state owned by the host.
pub trait DocumentStore {
    fn project(&self) -> &Project;
    fn project_mut(&mut self) -> &mut Project;
}

/// Everything the baker needs from a host.
pub trait Host: RenderJobs + ImageStore + ShaderGraphStore + SceneStore + DocumentStore {}

impl<T> Host for T where
    T: RenderJobs + ImageStore + ShaderGraphStore + SceneStore + DocumentStore + ?Sized
{
}

/// Resolve an object by name, failing hard when it is gone.
pub fn require_object(host: &dyn Host, name: &str) -> BakeResult<ObjectId> {
    host.object_by_name(name).ok_or_else(|| {
        crate::foundation::error::BakeError::host(format!("can not find object {name:?}"))
    })
}

/// Distinct materials of several objects, first-seen order.
pub fn objects_materials(host: &dyn Host, objects: &[ObjectId]) -> BakeResult<Vec<MaterialId>> {
    let mut out: Vec<MaterialId> = Vec::new();
    for &obj in objects {
        for mat in host.object_materials(obj)? {
            if !out.contains(&mat) {
                out.push(mat);
            }
        }
    }
    Ok(out)
}

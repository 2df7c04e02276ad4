//! In-memory reference host.
//!
//! `SimHost` implements the whole [`Host`](crate::host::Host) contract on slotmap arenas. Its bake
//! job runs for a configurable number of polls, fires `Pre` then `Complete` (or `Cancel`) for the
//! active object, and paints a flat colour derived from what the active material output is wired
//! to. Images are written and read as PNG files.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgba, Rgba32FImage};
use slotmap::SlotMap;

use crate::foundation::core::Rgb;
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::graph::{NodeInfo, NodeKind, SocketRef, SocketValue};
use crate::host::ids::{CollectionId, ImageId, MaterialId, NodeId, ObjectId, SceneId};
use crate::host::{
    BakeLaunch, BakeParams, DocumentStore, GeneratedKind, HostEvent, HostEventKind, ImageInfo,
    ImageStore, RenderJobs, RenderSettings, SceneStore, ShaderGraphStore,
};
use crate::scene::project::Project;
use crate::scene::settings::{Colorspace, RenderPass};

const DEFAULT_SCENE: &str = "Scene";
const DEFAULT_JOB_POLLS: u32 = 2;
const MAX_EVAL_DEPTH: usize = 32;

/// Failure modes that can be switched on for tests.
#[derive(Clone, Debug, Default)]
pub struct SimFaults {
    /// `bake_async` returns [`BakeLaunch::Failed`].
    pub refuse_start: bool,
    /// The job reports completion without touching the image.
    pub silent_failure: bool,
    /// Every job also fires a `Complete` for an unrelated object when it starts.
    pub foreign_events: bool,
    /// Jobs end with `Cancel`, as if the user aborted them in the host.
    pub external_cancel: bool,
    /// The final callback is delivered one poll after the job stopped running.
    pub late_events: bool,
}

/// One call of the bake primitive, as seen by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct BakeRecord {
    pub image: String,
    pub active: String,
    pub selected: Vec<String>,
    pub pass: RenderPass,
    pub use_clear: bool,
    pub width: u32,
    pub height: u32,
}

/// Scene description accepted by [`SimHost::from_description`].
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimSceneDesc {
    pub materials: Vec<SimMaterialDesc>,
    pub objects: Vec<SimObjectDesc>,
    /// Names of initially selected objects.
    pub selected: Vec<String>,
    pub active: Option<String>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SimMaterialDesc {
    pub name: String,
    #[serde(default = "default_base_color")]
    pub base_color: Rgb,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
    #[serde(default)]
    pub metallic: f32,
    /// Shader wired into the output. Anything but `principled` is unsupported by the baker.
    #[serde(default = "default_shader")]
    pub shader: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SimObjectDesc {
    pub name: String,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub color: Option<Rgb>,
}

fn default_base_color() -> Rgb {
    Rgb::new(0.8, 0.8, 0.8)
}

fn default_roughness() -> f32 {
    0.5
}

fn default_shader() -> String {
    "principled".to_string()
}

#[derive(Debug)]
struct SimObject {
    name: String,
    slots: Vec<Option<MaterialId>>,
    color: Rgb,
    hidden: bool,
}

#[derive(Debug)]
struct SimLink {
    from: SocketRef,
    to: NodeId,
    input: String,
}

#[derive(Debug, Default)]
struct SimMaterial {
    name: String,
    nodes: Vec<NodeId>,
    links: Vec<SimLink>,
    active_node: Option<NodeId>,
    active_output: Option<NodeId>,
}

#[derive(Debug)]
struct SimNode {
    material: MaterialId,
    name: String,
    kind: NodeKind,
    inputs: Vec<(String, Option<SocketValue>)>,
    image: Option<ImageId>,
    muted: bool,
}

#[derive(Debug)]
struct SimImage {
    name: String,
    filepath: Option<PathBuf>,
    pixels: Rgba32FImage,
    is_float: bool,
    colorspace: Colorspace,
    dirty: bool,
}

#[derive(Debug)]
struct SimScene {
    name: String,
    root: CollectionId,
    active: Option<ObjectId>,
    selected: Vec<ObjectId>,
}

#[derive(Debug)]
struct SimCollection {
    name: String,
    objects: Vec<ObjectId>,
    children: Vec<CollectionId>,
    is_root: bool,
}

#[derive(Debug)]
struct SimJob {
    params: BakeParams,
    active: ObjectId,
    source: ObjectId,
    polls_left: u32,
    pre_sent: bool,
}

/// In-memory [`Host`](crate::host::Host) implementation.
#[derive(Debug)]
pub struct SimHost {
    objects: SlotMap<ObjectId, SimObject>,
    materials: SlotMap<MaterialId, SimMaterial>,
    nodes: SlotMap<NodeId, SimNode>,
    images: SlotMap<ImageId, SimImage>,
    scenes: SlotMap<SceneId, SimScene>,
    collections: SlotMap<CollectionId, SimCollection>,
    active_scene: SceneId,
    render: RenderSettings,
    job: Option<SimJob>,
    late: Vec<HostEvent>,
    job_polls: u32,
    faults: SimFaults,
    bakes: Vec<BakeRecord>,
    project: Project,
}

impl SimHost {
    /// Empty host with one scene.
    pub fn new(project: Project) -> Self {
        let mut collections = SlotMap::with_key();
        let root = collections.insert(SimCollection {
            name: format!("{DEFAULT_SCENE} Collection"),
            objects: Vec::new(),
            children: Vec::new(),
            is_root: true,
        });
        let mut scenes = SlotMap::with_key();
        let active_scene = scenes.insert(SimScene {
            name: DEFAULT_SCENE.to_string(),
            root,
            active: None,
            selected: Vec::new(),
        });
        Self {
            objects: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            nodes: SlotMap::with_key(),
            images: SlotMap::with_key(),
            scenes,
            collections,
            active_scene,
            render: RenderSettings::default(),
            job: None,
            late: Vec::new(),
            job_polls: DEFAULT_JOB_POLLS,
            faults: SimFaults::default(),
            bakes: Vec::new(),
            project,
        }
    }

    /// Build a host from a scene description.
    pub fn from_description(project: Project, desc: &SimSceneDesc) -> BakeResult<Self> {
        let mut host = Self::new(project);
        for m in &desc.materials {
            if m.shader != "principled" {
                host.add_material_with_shader(&m.name, NodeKind::Other(m.shader.clone()))?;
                continue;
            }
            let mat = host.add_principled_material(&m.name, m.base_color)?;
            if let Some(shader) = host.shader_of(mat) {
                host.set_input_default(mat, shader, "Roughness", SocketValue::Float(m.roughness))?;
                host.set_input_default(mat, shader, "Metallic", SocketValue::Float(m.metallic))?;
            }
        }
        for o in &desc.objects {
            let obj = host.add_object(&o.name);
            if let Some(color) = o.color {
                host.set_object_color(obj, color)?;
            }
            for (slot, name) in o.materials.iter().enumerate() {
                let mat = host.material_by_name(name).ok_or_else(|| {
                    BakeError::validation(format!(
                        "object {:?} references unknown material {name:?}",
                        o.name
                    ))
                })?;
                host.assign_material(obj, slot, Some(mat))?;
            }
        }
        for name in &desc.selected {
            let obj = host
                .object_by_name(name)
                .ok_or_else(|| BakeError::validation(format!("unknown selected object {name:?}")))?;
            host.set_selected(obj, true)?;
        }
        if let Some(name) = &desc.active {
            let obj = host
                .object_by_name(name)
                .ok_or_else(|| BakeError::validation(format!("unknown active object {name:?}")))?;
            host.set_active_object(Some(obj))?;
        }
        Ok(host)
    }

    /// Add an object linked to the active scene.
    pub fn add_object(&mut self, name: &str) -> ObjectId {
        let name = unique_name(name, self.objects.values().map(|o| o.name.as_str()));
        let obj = self.objects.insert(SimObject {
            name,
            slots: Vec::new(),
            color: Rgb::WHITE,
            hidden: false,
        });
        let root = self.scenes[self.active_scene].root;
        self.collections[root].objects.push(obj);
        obj
    }

    /// Material with a principled shader wired into a material output.
    pub fn add_principled_material(
        &mut self,
        name: &str,
        base_color: Rgb,
    ) -> BakeResult<MaterialId> {
        let mat = self.add_material_with_shader(name, NodeKind::PrincipledBsdf)?;
        if let Some(shader) = self.shader_of(mat) {
            self.set_input_default(mat, shader, "Base Color", SocketValue::Color(base_color))?;
        }
        Ok(mat)
    }

    pub fn add_material_with_shader(
        &mut self,
        name: &str,
        shader: NodeKind,
    ) -> BakeResult<MaterialId> {
        let mat = self.create_material(name)?;
        let out = self.add_node(
            mat,
            NodeKind::MaterialOutput {
                target: crate::host::graph::OutputTarget::All,
            },
            "Material Output",
        )?;
        let output_socket = shader.outputs().first().copied().unwrap_or("Output");
        let shader_node = self.add_node(mat, shader, "Shader")?;
        self.link(mat, &SocketRef::new(shader_node, output_socket), out, "Surface")?;
        Ok(mat)
    }

    pub fn faults_mut(&mut self) -> &mut SimFaults {
        &mut self.faults
    }

    /// Number of polls a job stays running after its `Pre` callback.
    pub fn set_job_polls(&mut self, polls: u32) {
        self.job_polls = polls;
    }

    pub fn bakes(&self) -> &[BakeRecord] {
        &self.bakes
    }

    pub fn image_names(&self) -> Vec<String> {
        self.images.values().map(|i| i.name.clone()).collect()
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections
            .values()
            .filter(|c| !c.is_root)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn image_pixel(&self, image: ImageId, x: u32, y: u32) -> Option<[f32; 4]> {
        let img = self.images.get(image)?;
        (x < img.pixels.width() && y < img.pixels.height()).then(|| img.pixels.get_pixel(x, y).0)
    }

    /// Overwrite every pixel, marking the image dirty.
    pub fn paint_image(&mut self, image: ImageId, color: Rgb) -> BakeResult<()> {
        let img = self.image_mut(image)?;
        fill(&mut img.pixels, color);
        img.dirty = true;
        Ok(())
    }

    fn shader_of(&self, mat: MaterialId) -> Option<NodeId> {
        self.materials.get(mat)?.nodes.iter().copied().find(|n| {
            self.nodes
                .get(*n)
                .is_some_and(|n| !matches!(n.kind, NodeKind::MaterialOutput { .. }))
        })
    }

    fn object(&self, id: ObjectId) -> BakeResult<&SimObject> {
        self.objects
            .get(id)
            .ok_or_else(|| BakeError::host("object no longer exists"))
    }

    fn object_mut(&mut self, id: ObjectId) -> BakeResult<&mut SimObject> {
        self.objects
            .get_mut(id)
            .ok_or_else(|| BakeError::host("object no longer exists"))
    }

    fn material(&self, id: MaterialId) -> BakeResult<&SimMaterial> {
        self.materials
            .get(id)
            .ok_or_else(|| BakeError::host("material no longer exists"))
    }

    fn node_in(&self, mat: MaterialId, node: NodeId) -> BakeResult<&SimNode> {
        match self.nodes.get(node) {
            Some(n) if n.material == mat => Ok(n),
            _ => Err(BakeError::host("node does not belong to the material")),
        }
    }

    fn node_in_mut(&mut self, mat: MaterialId, node: NodeId) -> BakeResult<&mut SimNode> {
        match self.nodes.get_mut(node) {
            Some(n) if n.material == mat => Ok(n),
            _ => Err(BakeError::host("node does not belong to the material")),
        }
    }

    fn image(&self, id: ImageId) -> BakeResult<&SimImage> {
        self.images
            .get(id)
            .ok_or_else(|| BakeError::host("image no longer exists"))
    }

    fn image_mut(&mut self, id: ImageId) -> BakeResult<&mut SimImage> {
        self.images
            .get_mut(id)
            .ok_or_else(|| BakeError::host("image no longer exists"))
    }

    fn scene(&self, id: SceneId) -> BakeResult<&SimScene> {
        self.scenes
            .get(id)
            .ok_or_else(|| BakeError::host("scene no longer exists"))
    }

    fn collection(&self, id: CollectionId) -> BakeResult<&SimCollection> {
        self.collections
            .get(id)
            .ok_or_else(|| BakeError::host("collection no longer exists"))
    }

    fn collection_contains(&self, coll: CollectionId, obj: ObjectId) -> bool {
        let Some(c) = self.collections.get(coll) else {
            return false;
        };
        c.objects.contains(&obj)
            || c
                .children
                .iter()
                .any(|child| self.collection_contains(*child, obj))
    }

    fn scene_contains(&self, scene: SceneId, obj: ObjectId) -> bool {
        self.scenes
            .get(scene)
            .is_some_and(|s| self.collection_contains(s.root, obj))
    }

    fn effective_output(&self, mat: MaterialId) -> Option<NodeId> {
        let m = self.materials.get(mat)?;
        m.active_output.or_else(|| {
            m.nodes.iter().copied().find(|n| {
                matches!(
                    self.nodes.get(*n).map(|n| &n.kind),
                    Some(NodeKind::MaterialOutput { target }) if target.feeds_baking()
                )
            })
        })
    }

    fn upstream_of(&self, mat: MaterialId, node: NodeId, input: &str) -> Option<&SocketRef> {
        self.materials
            .get(mat)?
            .links
            .iter()
            .find(|l| l.to == node && l.input == input)
            .map(|l| &l.from)
    }

    fn eval_input(
        &self,
        mat: MaterialId,
        node: NodeId,
        input: &str,
        ctx: &EvalCtx,
        depth: usize,
    ) -> Rgb {
        if let Some(from) = self.upstream_of(mat, node, input) {
            return self.eval_socket(mat, from, ctx, depth + 1);
        }
        self.nodes
            .get(node)
            .and_then(|n| n.inputs.iter().find(|(name, _)| name == input))
            .and_then(|(_, v)| v.as_ref())
            .map(SocketValue::as_rgb)
            .unwrap_or(Rgb::BLACK)
    }

    fn eval_socket(&self, mat: MaterialId, from: &SocketRef, ctx: &EvalCtx, depth: usize) -> Rgb {
        if depth > MAX_EVAL_DEPTH {
            return Rgb::BLACK;
        }
        let Some(node) = self.nodes.get(from.node) else {
            return Rgb::BLACK;
        };
        if node.muted {
            return Rgb::BLACK;
        }
        match &node.kind {
            NodeKind::Value => self.eval_input(mat, from.node, "Value", ctx, depth),
            NodeKind::Rgb => self.eval_input(mat, from.node, "Color", ctx, depth),
            NodeKind::ImageTexture => node
                .image
                .and_then(|img| self.images.get(img))
                .map(|img| {
                    let [r, g, b, _] = img.pixels.get_pixel(0, 0).0;
                    Rgb::new(r, g, b)
                })
                .unwrap_or(Rgb::new(1.0, 0.0, 1.0)),
            NodeKind::AmbientOcclusion if from.socket == "AO" => Rgb::WHITE,
            NodeKind::AmbientOcclusion => self.eval_input(mat, from.node, "Color", ctx, depth),
            NodeKind::CombineColor => Rgb::new(
                self.eval_input(mat, from.node, "Red", ctx, depth).r,
                self.eval_input(mat, from.node, "Green", ctx, depth).r,
                self.eval_input(mat, from.node, "Blue", ctx, depth).r,
            ),
            NodeKind::ObjectInfo => ctx.object_color,
            NodeKind::PrincipledBsdf => self.eval_input(mat, from.node, "Base Color", ctx, depth),
            NodeKind::MaterialOutput { .. } | NodeKind::Other(_) => Rgb::BLACK,
        }
    }

    /// Evaluate an input of the principled shader behind the first baking output.
    fn principled_input(&self, mat: MaterialId, input: &str, ctx: &EvalCtx) -> Option<Rgb> {
        let m = self.materials.get(mat)?;
        m.nodes.iter().find_map(|out| {
            let is_output = matches!(
                self.nodes.get(*out).map(|n| &n.kind),
                Some(NodeKind::MaterialOutput { target }) if target.feeds_baking()
            );
            if !is_output {
                return None;
            }
            let shader = self.upstream_of(mat, *out, "Surface")?;
            let node = self.nodes.get(shader.node)?;
            matches!(node.kind, NodeKind::PrincipledBsdf)
                .then(|| self.eval_input(mat, shader.node, input, ctx, 0))
        })
    }

    /// Colour the running job writes, from the first material of the source object.
    fn bake_color(&self, job: &SimJob) -> Rgb {
        let Some(obj) = self.objects.get(job.source) else {
            return Rgb::BLACK;
        };
        let ctx = EvalCtx {
            object_color: obj.color,
        };
        let Some(mat) = obj.slots.iter().flatten().next().copied() else {
            return Rgb::BLACK;
        };
        match job.params.pass {
            RenderPass::Emit => self
                .effective_output(mat)
                .and_then(|out| self.upstream_of(mat, out, "Surface").cloned())
                .map(|from| self.eval_socket(mat, &from, &ctx, 0))
                .unwrap_or(Rgb::BLACK),
            RenderPass::Diffuse => self
                .principled_input(mat, "Base Color", &ctx)
                .unwrap_or(Rgb::BLACK),
            RenderPass::Roughness => self
                .principled_input(mat, "Roughness", &ctx)
                .unwrap_or(Rgb::WHITE),
            RenderPass::Normal => Rgb::new(0.5, 0.5, 1.0),
        }
    }

    fn finish_job(&mut self, job: SimJob) -> HostEvent {
        if self.faults.external_cancel {
            return HostEvent {
                kind: HostEventKind::Cancel,
                object: job.active,
            };
        }
        if !self.faults.silent_failure {
            let color = self.bake_color(&job);
            if let Some(img) = self.images.get_mut(job.params.target) {
                fill(&mut img.pixels, color);
                img.dirty = true;
            }
        }
        HostEvent {
            kind: HostEventKind::Complete,
            object: job.active,
        }
    }
}

struct EvalCtx {
    object_color: Rgb,
}

fn fill(pixels: &mut Rgba32FImage, color: Rgb) {
    let px = Rgba(color.to_rgba());
    for p in pixels.pixels_mut() {
        *p = px;
    }
}

fn unique_name<'a>(wanted: &str, existing: impl Iterator<Item = &'a str> + Clone) -> String {
    if !existing.clone().any(|n| n == wanted) {
        return wanted.to_string();
    }
    (1..)
        .map(|i| format!("{wanted}.{i:03}"))
        .find(|candidate| !existing.clone().any(|n| n == candidate))
        .unwrap_or_else(|| wanted.to_string())
}

fn generated_pixels(width: u32, height: u32, kind: GeneratedKind) -> Rgba32FImage {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    Rgba32FImage::from_fn(width, height, |x, y| match kind {
        GeneratedKind::UvGrid => {
            let checker = if ((x * 8 / width.max(1)) + (y * 8 / height.max(1))) % 2 == 0 {
                0.25
            } else {
                0.75
            };
            Rgba([x as f32 / w, y as f32 / h, checker, 1.0])
        }
        GeneratedKind::ColorGrid => {
            let cell = (x * 8 / width.max(1)) + 8 * (y * 8 / height.max(1));
            let c = Rgb::from_hsv(cell as f32 / 64.0, 0.8, 0.9);
            Rgba(c.to_rgba())
        }
    })
}

fn read_png(path: &Path) -> BakeResult<(Rgba32FImage, bool)> {
    let img = image::open(path)
        .map_err(|e| BakeError::host(format!("read image '{}': {e}", path.display())))?;
    let is_float = matches!(
        img.color(),
        image::ColorType::L16
            | image::ColorType::La16
            | image::ColorType::Rgb16
            | image::ColorType::Rgba16
            | image::ColorType::Rgb32F
            | image::ColorType::Rgba32F
    );
    Ok((img.to_rgba32f(), is_float))
}

fn write_png(pixels: &Rgba32FImage, is_float: bool, path: &Path) -> BakeResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let img = DynamicImage::ImageRgba32F(pixels.clone());
    let out = if is_float {
        DynamicImage::ImageRgba16(img.to_rgba16())
    } else {
        DynamicImage::ImageRgba8(img.to_rgba8())
    };
    out.save_with_format(path, ImageFormat::Png)
        .map_err(|e| BakeError::host(format!("write image '{}': {e}", path.display())))
}

impl RenderJobs for SimHost {
    fn bake_async(&mut self, params: &BakeParams) -> BakeLaunch {
        if self.faults.refuse_start {
            return BakeLaunch::Failed("bake refused by host".to_string());
        }
        if self.job.is_some() {
            return BakeLaunch::Failed("a bake job is already running".to_string());
        }
        let Some(target) = self.images.get(params.target) else {
            return BakeLaunch::Failed("target image does not exist".to_string());
        };
        let scene = &self.scenes[self.active_scene];
        let Some(active) = scene.active else {
            return BakeLaunch::Failed("no active object".to_string());
        };
        if !scene.selected.contains(&active) {
            return BakeLaunch::Failed("active object is not selected".to_string());
        }
        let source = if params.use_selected_to_active {
            scene
                .selected
                .iter()
                .copied()
                .find(|o| *o != active)
                .unwrap_or(active)
        } else {
            active
        };
        let name_of = |o: &ObjectId| {
            self.objects
                .get(*o)
                .map(|o| o.name.clone())
                .unwrap_or_default()
        };
        self.bakes.push(BakeRecord {
            image: target.name.clone(),
            active: name_of(&active),
            selected: scene.selected.iter().map(name_of).collect(),
            pass: params.pass,
            use_clear: params.use_clear,
            width: params.width,
            height: params.height,
        });
        self.job = Some(SimJob {
            params: params.clone(),
            active,
            source,
            polls_left: self.job_polls,
            pre_sent: false,
        });
        BakeLaunch::Running
    }

    fn is_job_running(&self) -> bool {
        self.job.is_some()
    }

    fn cancel_job(&mut self) {
        if let Some(job) = self.job.take() {
            self.late.push(HostEvent {
                kind: HostEventKind::Cancel,
                object: job.active,
            });
        }
    }

    fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events = std::mem::take(&mut self.late);
        let Some(mut job) = self.job.take() else {
            return events;
        };
        if !job.pre_sent {
            job.pre_sent = true;
            events.push(HostEvent {
                kind: HostEventKind::Pre,
                object: job.active,
            });
            if self.faults.foreign_events {
                events.push(HostEvent {
                    kind: HostEventKind::Complete,
                    object: ObjectId::default(),
                });
            }
            self.job = Some(job);
        } else if job.polls_left > 0 {
            job.polls_left -= 1;
            self.job = Some(job);
        } else {
            let event = self.finish_job(job);
            if self.faults.late_events {
                self.late.push(event);
            } else {
                events.push(event);
            }
        }
        events
    }

    fn render_settings(&self) -> RenderSettings {
        self.render.clone()
    }

    fn set_render_settings(&mut self, settings: RenderSettings) {
        self.render = settings;
    }
}

impl ImageStore for SimHost {
    fn image_by_name(&self, name: &str) -> Option<ImageId> {
        self.images
            .iter()
            .find(|(_, i)| i.name == name)
            .map(|(id, _)| id)
    }

    fn image_info(&self, image: ImageId) -> BakeResult<ImageInfo> {
        let img = self.image(image)?;
        Ok(ImageInfo {
            name: img.name.clone(),
            filepath: img.filepath.clone(),
            width: img.pixels.width(),
            height: img.pixels.height(),
            is_float: img.is_float,
            colorspace: img.colorspace,
            is_dirty: img.dirty,
        })
    }

    fn create_image(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        is_float: bool,
    ) -> BakeResult<ImageId> {
        if width == 0 || height == 0 {
            return Err(BakeError::host(format!("image {name:?} must have a non-zero size")));
        }
        let name = unique_name(name, self.images.values().map(|i| i.name.as_str()));
        Ok(self.images.insert(SimImage {
            name,
            filepath: None,
            pixels: Rgba32FImage::from_pixel(width, height, Rgba([0.0, 0.0, 0.0, 1.0])),
            is_float,
            colorspace: Colorspace::Srgb,
            dirty: false,
        }))
    }

    fn create_generated(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        kind: GeneratedKind,
    ) -> BakeResult<ImageId> {
        let id = self.create_image(name, width, height, false)?;
        let img = self.image_mut(id)?;
        img.pixels = generated_pixels(width, height, kind);
        Ok(id)
    }

    fn load_image(&mut self, path: &Path) -> BakeResult<ImageId> {
        let (pixels, is_float) = read_png(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| BakeError::host(format!("'{}' has no file name", path.display())))?;
        let name = unique_name(&file_name, self.images.values().map(|i| i.name.as_str()));
        Ok(self.images.insert(SimImage {
            name,
            filepath: Some(path.to_path_buf()),
            pixels,
            is_float,
            colorspace: Colorspace::Srgb,
            dirty: false,
        }))
    }

    fn save_image(&mut self, image: ImageId) -> BakeResult<()> {
        let img = self.image(image)?;
        let path = img
            .filepath
            .clone()
            .ok_or_else(|| BakeError::host(format!("image {:?} has no file path", img.name)))?;
        write_png(&img.pixels, img.is_float, &path)?;
        self.image_mut(image)?.dirty = false;
        Ok(())
    }

    fn reload_image(&mut self, image: ImageId) -> BakeResult<()> {
        let img = self.image(image)?;
        let path = img
            .filepath
            .clone()
            .ok_or_else(|| BakeError::host(format!("image {:?} has no file path", img.name)))?;
        let (pixels, is_float) = read_png(&path)?;
        let img = self.image_mut(image)?;
        img.pixels = pixels;
        img.is_float = is_float;
        img.dirty = false;
        Ok(())
    }

    fn scale_image(&mut self, image: ImageId, width: u32, height: u32) -> BakeResult<()> {
        if width == 0 || height == 0 {
            return Err(BakeError::host("cannot scale an image to zero size"));
        }
        let img = self.image_mut(image)?;
        img.pixels = image::imageops::resize(
            &img.pixels,
            width,
            height,
            image::imageops::FilterType::Triangle,
        );
        img.dirty = true;
        Ok(())
    }

    fn remove_image(&mut self, image: ImageId) -> BakeResult<()> {
        self.images
            .remove(image)
            .ok_or_else(|| BakeError::host("image no longer exists"))?;
        for node in self.nodes.values_mut() {
            if node.image == Some(image) {
                node.image = None;
            }
        }
        Ok(())
    }

    fn set_image_filepath(&mut self, image: ImageId, path: &Path) -> BakeResult<()> {
        self.image_mut(image)?.filepath = Some(path.to_path_buf());
        Ok(())
    }

    fn set_image_colorspace(&mut self, image: ImageId, colorspace: Colorspace) -> BakeResult<()> {
        self.image_mut(image)?.colorspace = colorspace;
        Ok(())
    }
}

impl ShaderGraphStore for SimHost {
    fn material_by_name(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .find(|(_, m)| m.name == name)
            .map(|(id, _)| id)
    }

    fn material_name(&self, material: MaterialId) -> BakeResult<String> {
        Ok(self.material(material)?.name.clone())
    }

    fn create_material(&mut self, name: &str) -> BakeResult<MaterialId> {
        let name = unique_name(name, self.materials.values().map(|m| m.name.as_str()));
        Ok(self.materials.insert(SimMaterial {
            name,
            ..SimMaterial::default()
        }))
    }

    fn copy_material(&mut self, material: MaterialId, name: &str) -> BakeResult<MaterialId> {
        let src = self.material(material)?;
        let src_nodes = src.nodes.clone();
        let src_links: Vec<(SocketRef, NodeId, String)> = src
            .links
            .iter()
            .map(|l| (l.from.clone(), l.to, l.input.clone()))
            .collect();
        let (src_active, src_output) = (src.active_node, src.active_output);

        let copy = self.create_material(name)?;
        let mut map = Vec::with_capacity(src_nodes.len());
        for old in src_nodes {
            let n = &self.nodes[old];
            let node = SimNode {
                material: copy,
                name: n.name.clone(),
                kind: n.kind.clone(),
                inputs: n.inputs.clone(),
                image: n.image,
                muted: n.muted,
            };
            let new = self.nodes.insert(node);
            self.materials[copy].nodes.push(new);
            map.push((old, new));
        }
        let remap = |id: NodeId| map.iter().find(|(o, _)| *o == id).map(|(_, n)| *n);
        let links: Vec<SimLink> = src_links
            .into_iter()
            .filter_map(|(from, to, input)| {
                Some(SimLink {
                    from: SocketRef::new(remap(from.node)?, from.socket),
                    to: remap(to)?,
                    input,
                })
            })
            .collect();
        let m = &mut self.materials[copy];
        m.links = links;
        m.active_node = src_active.and_then(remap);
        m.active_output = src_output.and_then(remap);
        Ok(copy)
    }

    fn remove_material(&mut self, material: MaterialId) -> BakeResult<()> {
        let m = self
            .materials
            .remove(material)
            .ok_or_else(|| BakeError::host("material no longer exists"))?;
        for node in m.nodes {
            self.nodes.remove(node);
        }
        for obj in self.objects.values_mut() {
            for slot in &mut obj.slots {
                if *slot == Some(material) {
                    *slot = None;
                }
            }
        }
        Ok(())
    }

    fn material_nodes(&self, material: MaterialId) -> BakeResult<Vec<NodeInfo>> {
        let m = self.material(material)?;
        let active_output = self.effective_output(material);
        Ok(m.nodes
            .iter()
            .filter_map(|id| {
                let n = self.nodes.get(*id)?;
                Some(NodeInfo {
                    id: *id,
                    name: n.name.clone(),
                    kind: n.kind.clone(),
                    image: n.image,
                    muted: n.muted,
                    is_active_output: active_output == Some(*id),
                })
            })
            .collect())
    }

    fn add_node(&mut self, material: MaterialId, kind: NodeKind, name: &str) -> BakeResult<NodeId> {
        let m = self.material(material)?;
        let name = unique_name(
            name,
            m.nodes
                .iter()
                .filter_map(|n| self.nodes.get(*n))
                .map(|n| n.name.as_str()),
        );
        let inputs = kind
            .inputs()
            .into_iter()
            .map(|(s, v)| (s.to_string(), v))
            .collect();
        let id = self.nodes.insert(SimNode {
            material,
            name,
            kind,
            inputs,
            image: None,
            muted: false,
        });
        self.materials[material].nodes.push(id);
        Ok(id)
    }

    fn remove_node(&mut self, material: MaterialId, node: NodeId) -> BakeResult<()> {
        self.node_in(material, node)?;
        self.nodes.remove(node);
        let m = &mut self.materials[material];
        m.nodes.retain(|n| *n != node);
        m.links.retain(|l| l.to != node && l.from.node != node);
        if m.active_node == Some(node) {
            m.active_node = None;
        }
        if m.active_output == Some(node) {
            m.active_output = None;
        }
        Ok(())
    }

    fn link(
        &mut self,
        material: MaterialId,
        from: &SocketRef,
        to: NodeId,
        input: &str,
    ) -> BakeResult<()> {
        let src = self.node_in(material, from.node)?;
        if !src.kind.outputs().contains(&from.socket.as_str()) {
            return Err(BakeError::graph(format!(
                "node {:?} has no output {:?}",
                src.name, from.socket
            )));
        }
        let dst = self.node_in(material, to)?;
        if !dst.inputs.iter().any(|(name, _)| name == input) {
            return Err(BakeError::graph(format!(
                "node {:?} has no input {input:?}",
                dst.name
            )));
        }
        let m = &mut self.materials[material];
        m.links.retain(|l| !(l.to == to && l.input == input));
        m.links.push(SimLink {
            from: from.clone(),
            to,
            input: input.to_string(),
        });
        Ok(())
    }

    fn upstream(
        &self,
        material: MaterialId,
        node: NodeId,
        input: &str,
    ) -> BakeResult<Option<SocketRef>> {
        self.node_in(material, node)?;
        Ok(self.upstream_of(material, node, input).cloned())
    }

    fn input_default(
        &self,
        material: MaterialId,
        node: NodeId,
        input: &str,
    ) -> BakeResult<Option<SocketValue>> {
        let n = self.node_in(material, node)?;
        n.inputs
            .iter()
            .find(|(name, _)| name == input)
            .map(|(_, v)| *v)
            .ok_or_else(|| BakeError::graph(format!("node {:?} has no input {input:?}", n.name)))
    }

    fn set_input_default(
        &mut self,
        material: MaterialId,
        node: NodeId,
        input: &str,
        value: SocketValue,
    ) -> BakeResult<()> {
        let n = self.node_in_mut(material, node)?;
        let name = n.name.clone();
        let slot = n
            .inputs
            .iter_mut()
            .find(|(s, _)| s == input)
            .ok_or_else(|| BakeError::graph(format!("node {name:?} has no input {input:?}")))?;
        if let Some(current) = &slot.1
            && current.kind() != value.kind()
        {
            return Err(BakeError::graph(format!(
                "socket {input:?} of node {name:?} holds {:?}, got {:?}",
                current.kind(),
                value.kind()
            )));
        }
        slot.1 = Some(value);
        Ok(())
    }

    fn set_node_image(
        &mut self,
        material: MaterialId,
        node: NodeId,
        image: Option<ImageId>,
    ) -> BakeResult<()> {
        if let Some(img) = image {
            self.image(img)?;
        }
        let n = self.node_in_mut(material, node)?;
        if n.kind != NodeKind::ImageTexture {
            return Err(BakeError::graph(format!("node {:?} is not an image texture", n.name)));
        }
        n.image = image;
        Ok(())
    }

    fn set_node_muted(
        &mut self,
        material: MaterialId,
        node: NodeId,
        muted: bool,
    ) -> BakeResult<()> {
        self.node_in_mut(material, node)?.muted = muted;
        Ok(())
    }

    fn set_active_node(&mut self, material: MaterialId, node: NodeId) -> BakeResult<()> {
        self.node_in(material, node)?;
        self.materials[material].active_node = Some(node);
        Ok(())
    }

    fn set_active_output(&mut self, material: MaterialId, node: NodeId) -> BakeResult<()> {
        let n = self.node_in(material, node)?;
        if !matches!(n.kind, NodeKind::MaterialOutput { .. }) {
            return Err(BakeError::graph(format!("node {:?} is not a material output", n.name)));
        }
        self.materials[material].active_output = Some(node);
        Ok(())
    }
}

impl SceneStore for SimHost {
    fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name)
            .map(|(id, _)| id)
    }

    fn object_name(&self, object: ObjectId) -> BakeResult<String> {
        Ok(self.object(object)?.name.clone())
    }

    fn object_materials(&self, object: ObjectId) -> BakeResult<Vec<MaterialId>> {
        let mut out = Vec::new();
        for mat in self.object(object)?.slots.iter().flatten() {
            if !out.contains(mat) {
                out.push(*mat);
            }
        }
        Ok(out)
    }

    fn material_slot_count(&self, object: ObjectId) -> BakeResult<usize> {
        Ok(self.object(object)?.slots.len())
    }

    fn assign_material(
        &mut self,
        object: ObjectId,
        slot: usize,
        material: Option<MaterialId>,
    ) -> BakeResult<()> {
        if let Some(mat) = material {
            self.material(mat)?;
        }
        let obj = self.object_mut(object)?;
        if slot < obj.slots.len() {
            obj.slots[slot] = material;
        } else {
            obj.slots.push(material);
        }
        Ok(())
    }

    fn object_color(&self, object: ObjectId) -> BakeResult<Rgb> {
        Ok(self.object(object)?.color)
    }

    fn set_object_color(&mut self, object: ObjectId, color: Rgb) -> BakeResult<()> {
        self.object_mut(object)?.color = color;
        Ok(())
    }

    fn reveal_object(&mut self, object: ObjectId) -> BakeResult<()> {
        self.object_mut(object)?.hidden = false;
        Ok(())
    }

    fn selected_objects(&self) -> Vec<ObjectId> {
        self.scenes[self.active_scene].selected.clone()
    }

    fn set_selected(&mut self, object: ObjectId, selected: bool) -> BakeResult<()> {
        self.object(object)?;
        if selected && !self.scene_contains(self.active_scene, object) {
            return Err(BakeError::host(format!(
                "object {:?} is not in the active scene",
                self.objects[object].name
            )));
        }
        let scene = &mut self.scenes[self.active_scene];
        scene.selected.retain(|o| *o != object);
        if selected {
            scene.selected.push(object);
        }
        Ok(())
    }

    fn active_object(&self) -> Option<ObjectId> {
        self.scenes[self.active_scene].active
    }

    fn set_active_object(&mut self, object: Option<ObjectId>) -> BakeResult<()> {
        if let Some(obj) = object {
            self.object(obj)?;
            if !self.scene_contains(self.active_scene, obj) {
                return Err(BakeError::host(format!(
                    "object {:?} is not in the active scene",
                    self.objects[obj].name
                )));
            }
        }
        self.scenes[self.active_scene].active = object;
        Ok(())
    }

    fn active_scene(&self) -> SceneId {
        self.active_scene
    }

    fn set_active_scene(&mut self, scene: SceneId) -> BakeResult<()> {
        self.scene(scene)?;
        self.active_scene = scene;
        Ok(())
    }

    fn scene_by_name(&self, name: &str) -> Option<SceneId> {
        self.scenes
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    fn scene_names(&self) -> Vec<String> {
        self.scenes.values().map(|s| s.name.clone()).collect()
    }

    fn create_scene(&mut self, name: &str) -> BakeResult<SceneId> {
        if self.scene_by_name(name).is_some() {
            return Err(BakeError::host(format!("scene {name:?} already exists")));
        }
        let root = self.collections.insert(SimCollection {
            name: format!("{name} Collection"),
            objects: Vec::new(),
            children: Vec::new(),
            is_root: true,
        });
        Ok(self.scenes.insert(SimScene {
            name: name.to_string(),
            root,
            active: None,
            selected: Vec::new(),
        }))
    }

    fn remove_scene(&mut self, scene: SceneId) -> BakeResult<()> {
        self.scene(scene)?;
        if self.scenes.len() == 1 {
            return Err(BakeError::host("cannot remove the last scene"));
        }
        if let Some(s) = self.scenes.remove(scene) {
            // Child collections survive as orphans.
            self.collections.remove(s.root);
        }
        if self.active_scene == scene
            && let Some(next) = self.scenes.keys().next()
        {
            self.active_scene = next;
        }
        Ok(())
    }

    fn scene_collection(&self, scene: SceneId) -> BakeResult<CollectionId> {
        Ok(self.scene(scene)?.root)
    }

    fn collection_by_name(&self, name: &str) -> Option<CollectionId> {
        self.collections
            .iter()
            .find(|(_, c)| !c.is_root && c.name == name)
            .map(|(id, _)| id)
    }

    fn create_collection(&mut self, name: &str, parent: CollectionId) -> BakeResult<CollectionId> {
        self.collection(parent)?;
        let name = unique_name(
            name,
            self.collections
                .values()
                .filter(|c| !c.is_root)
                .map(|c| c.name.as_str()),
        );
        let id = self.collections.insert(SimCollection {
            name,
            objects: Vec::new(),
            children: Vec::new(),
            is_root: false,
        });
        self.collections[parent].children.push(id);
        Ok(id)
    }

    fn remove_collection(&mut self, collection: CollectionId) -> BakeResult<()> {
        let c = self.collection(collection)?;
        if c.is_root {
            return Err(BakeError::host("cannot remove a scene root collection"));
        }
        self.collections.remove(collection);
        for c in self.collections.values_mut() {
            c.children.retain(|child| *child != collection);
        }
        let scenes: Vec<SceneId> = self.scenes.keys().collect();
        for scene in scenes {
            let s = &self.scenes[scene];
            let (selected, active) = (s.selected.clone(), s.active);
            let still: Vec<ObjectId> = selected
                .into_iter()
                .filter(|o| self.scene_contains(scene, *o))
                .collect();
            let active = active.filter(|o| self.scene_contains(scene, *o));
            let s = &mut self.scenes[scene];
            s.selected = still;
            s.active = active;
        }
        Ok(())
    }

    fn link_object(&mut self, collection: CollectionId, object: ObjectId) -> BakeResult<()> {
        self.object(object)?;
        let c = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| BakeError::host("collection no longer exists"))?;
        if !c.objects.contains(&object) {
            c.objects.push(object);
        }
        Ok(())
    }

    fn unlink_object(&mut self, collection: CollectionId, object: ObjectId) -> BakeResult<()> {
        let c = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| BakeError::host("collection no longer exists"))?;
        c.objects.retain(|o| *o != object);
        Ok(())
    }

    fn collection_objects(&self, collection: CollectionId) -> BakeResult<Vec<ObjectId>> {
        Ok(self.collection(collection)?.objects.clone())
    }
}

impl DocumentStore for SimHost {
    fn project(&self) -> &Project {
        &self.project
    }

    fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }
}

#[cfg(test)]
#[path = "../../tests/unit/host/sim.rs"]
mod tests;

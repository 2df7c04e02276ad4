//! texbake drives a 3D host's renderer to bake texture maps for sets of meshes.
//!
//! While a bake runs, every participating material's shading graph is rewritten so the renderer
//! emits the requested signal (albedo, roughness, material id, packed AO/roughness/metalness and
//! so on) instead of the authored result, and restored afterwards. The public surface is:
//!
//! - A persisted [`Project`] holding [`TextureSet`]s (textures × meshes) and their bake states
//! - The [`Host`] contract the baker talks to, with [`SimHost`] as an in-memory implementation
//! - [`BakeJob`] for one render invocation and [`BakeOrchestrator`] for a whole texture set,
//!   both advanced cooperatively by host loop ticks through [`BakeTask`]
#![forbid(unsafe_code)]

mod foundation;

pub mod bake;
pub mod host;
pub mod material;
pub mod recipe;
pub mod scene;
pub mod session;

pub use crate::foundation::core::{BakeState, Rgb, StableId, format_elapsed, generate_color_set};
pub use crate::foundation::error::{BakeError, BakeResult};

pub use crate::bake::context::OrchestratorContext;
pub use crate::bake::job::{BakeJob, BakeJobState};
pub use crate::bake::objects::{BakeObjects, MeshGroup, image_name_and_path, mesh_groups};
pub use crate::host::Host;
pub use crate::host::sim::{SimHost, SimSceneDesc};
pub use crate::recipe::library::RecipeLibrary;
pub use crate::scene::project::Project;
pub use crate::scene::settings::{BakeMode, BakeSettings, TextureType};
pub use crate::scene::texture_set::{MeshEntry, TextureEntry, TextureSet};
pub use crate::session::driver::{BakeTask, LoopEvent, TickStatus, drive};
pub use crate::session::materials::{create_materials, randomize_object_colors};
pub use crate::session::orchestrator::BakeOrchestrator;
pub use crate::session::selected::SelectionBake;

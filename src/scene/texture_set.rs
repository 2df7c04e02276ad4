use crate::foundation::core::{BakeState, StableId};
use crate::scene::settings::{BakeMode, BakeSettings, TextureType};

/// Placeholder shown before a texture was baked.
pub const NO_BAKE_TIME: &str = "-";

/// One requested output map of a texture set.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextureEntry {
    #[serde(default = "StableId::generate")]
    pub id: StableId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub state: BakeState,
    /// Duration of the last bake, `MM:SS`.
    #[serde(default = "default_bake_time")]
    pub last_bake_time: String,
    #[serde(default)]
    pub settings: BakeSettings,
}

impl TextureEntry {
    pub fn new(settings: BakeSettings) -> Self {
        Self {
            id: StableId::generate(),
            enabled: true,
            state: BakeState::default(),
            last_bake_time: NO_BAKE_TIME.to_string(),
            settings,
        }
    }

    pub fn of_type(texture_type: TextureType) -> Self {
        Self::new(BakeSettings::with_type(texture_type))
    }
}

/// Mesh object participating in a texture set, referenced by name.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MeshEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub state: BakeState,
}

impl MeshEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            state: BakeState::default(),
        }
    }
}

/// What to do with the baked images once a texture set finishes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaterialCreationPolicy {
    pub enabled: bool,
    /// Re-apply images into the materials already on the meshes instead of creating new ones.
    pub reuse_existing: bool,
    /// Material copied for every new material; a plain default material when `None`.
    pub template: Option<String>,
    pub assign_to_objects: bool,
}

impl Default for MaterialCreationPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            reuse_existing: false,
            template: None,
            assign_to_objects: true,
        }
    }
}

/// Ordered textures × ordered meshes baked together.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextureSet {
    #[serde(default = "StableId::generate")]
    pub id: StableId,
    /// Used in image and file names. Distinct from `id`.
    pub display_name: String,
    #[serde(default)]
    pub mode: BakeMode,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub meshes: Vec<MeshEntry>,
    #[serde(default)]
    pub create_materials: MaterialCreationPolicy,
}

impl TextureSet {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: StableId::generate(),
            display_name: display_name.into(),
            mode: BakeMode::default(),
            textures: Vec::new(),
            meshes: Vec::new(),
            create_materials: MaterialCreationPolicy::default(),
        }
    }

    pub fn enabled_textures(&self) -> impl Iterator<Item = &TextureEntry> {
        self.textures.iter().filter(|t| t.enabled)
    }

    pub fn enabled_meshes(&self) -> impl Iterator<Item = &MeshEntry> {
        self.meshes.iter().filter(|m| m.enabled)
    }

    pub fn texture(&self, id: &StableId) -> Option<&TextureEntry> {
        self.textures.iter().find(|t| &t.id == id)
    }

    pub fn texture_mut(&mut self, id: &StableId) -> Option<&mut TextureEntry> {
        self.textures.iter_mut().find(|t| &t.id == id)
    }

    pub fn mesh_mut(&mut self, name: &str) -> Option<&mut MeshEntry> {
        self.meshes.iter_mut().find(|m| m.name == name)
    }

    /// Set the state of every named mesh entry. Unknown names are ignored.
    pub fn mark_meshes<'a>(&mut self, names: impl IntoIterator<Item = &'a str>, state: BakeState) {
        for name in names {
            if let Some(mesh) = self.mesh_mut(name) {
                mesh.state = state;
            }
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bake_time() -> String {
    NO_BAKE_TIME.to_string()
}

#[cfg(test)]
#[path = "../../tests/unit/scene/texture_set.rs"]
mod tests;

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::foundation::core::StableId;
use crate::foundation::error::{BakeError, BakeResult};
use crate::scene::settings::BakeSettings;
use crate::scene::texture_set::TextureSet;

/// Naming of materials created after a bake.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaterialCreationSettings {
    pub name_prefix: String,
    pub name_suffix: String,
}

impl Default for MaterialCreationSettings {
    fn default() -> Self {
        Self {
            name_prefix: String::new(),
            name_suffix: "_baked".to_string(),
        }
    }
}

/// Run-wide toggles shared by every texture set.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct UtilsSettings {
    /// Drop the image from the document after saving it to disk.
    pub unlink_baked_image: bool,
    pub show_image_in_editor: bool,
    /// Keep the scratch scene between jobs of one run.
    pub keep_scene: bool,
    /// Stop between mesh groups until cleared.
    pub debug_pause: bool,
    /// Advance exactly one job while paused. Reset by the orchestrator.
    pub debug_pause_continue: bool,
    pub material_creation: MaterialCreationSettings,
}

impl Default for UtilsSettings {
    fn default() -> Self {
        Self {
            unlink_baked_image: false,
            show_image_in_editor: true,
            keep_scene: true,
            debug_pause: false,
            debug_pause_continue: false,
            material_creation: MaterialCreationSettings::default(),
        }
    }
}

/// Persisted baking state of one host document.
///
/// This is the JSON-facing representation saved with the document. Runtime state (jobs, the
/// scratch scene, registered callbacks) never ends up in here.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Project {
    pub output_directory: PathBuf,
    pub utils: UtilsSettings,
    /// Settings used by the selection bake.
    pub simple_settings: BakeSettings,
    pub texture_sets: Vec<TextureSet>,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("textures"),
            utils: UtilsSettings::default(),
            simple_settings: BakeSettings::default(),
            texture_sets: Vec::new(),
        }
    }
}

impl Project {
    /// Parse a project from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> BakeResult<Self> {
        serde_json::from_reader(r).map_err(|e| BakeError::serde(format!("parse project JSON: {e}")))
    }

    /// Parse a project from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> BakeResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            BakeError::validation(format!("open project JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn to_writer<W: Write>(&self, w: W) -> BakeResult<()> {
        serde_json::to_writer_pretty(w, self)
            .map_err(|e| BakeError::serde(format!("write project JSON: {e}")))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> BakeResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut w = BufWriter::new(File::create(path)?);
        self.to_writer(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Check structural invariants: unique ids, usable names, valid settings.
    pub fn validate(&self) -> BakeResult<()> {
        self.simple_settings
            .validate()
            .map_err(|e| BakeError::validation(format!("simple_settings: {e}")))?;

        let mut set_ids = HashSet::new();
        for set in &self.texture_sets {
            let name = set.display_name.trim();
            if name.is_empty() {
                return Err(BakeError::validation(format!(
                    "texture set {} has an empty display name",
                    set.id
                )));
            }
            if name.contains(['/', '\\']) {
                return Err(BakeError::validation(format!(
                    "texture set name {name:?} must not contain path separators"
                )));
            }
            if !set_ids.insert(&set.id) {
                return Err(BakeError::validation(format!(
                    "duplicate texture set id {}",
                    set.id
                )));
            }
            let mut tex_ids = HashSet::new();
            for tex in &set.textures {
                if !tex_ids.insert(&tex.id) {
                    return Err(BakeError::validation(format!(
                        "duplicate texture id {} in set {name:?}",
                        tex.id
                    )));
                }
                tex.settings.validate().map_err(|e| {
                    BakeError::validation(format!("texture {} in set {name:?}: {e}", tex.id))
                })?;
            }
            let mut mesh_names = HashSet::new();
            for mesh in &set.meshes {
                if !mesh_names.insert(mesh.name.as_str()) {
                    return Err(BakeError::validation(format!(
                        "mesh {:?} listed twice in set {name:?}",
                        mesh.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn texture_set(&self, id: &StableId) -> Option<&TextureSet> {
        self.texture_sets.iter().find(|s| &s.id == id)
    }

    pub fn texture_set_mut(&mut self, id: &StableId) -> Option<&mut TextureSet> {
        self.texture_sets.iter_mut().find(|s| &s.id == id)
    }

    /// Resolve a set by id first, then by display name.
    pub fn find_texture_set(&self, key: &str) -> Option<&TextureSet> {
        self.texture_sets
            .iter()
            .find(|s| s.id.as_str() == key)
            .or_else(|| self.texture_sets.iter().find(|s| s.display_name == key))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/project.rs"]
mod tests;

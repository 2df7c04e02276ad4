use std::path::{Path, PathBuf};

use tracing::warn;

use crate::foundation::error::{BakeError, BakeResult};
use crate::host::ids::ObjectId;
use crate::scene::settings::BakeSettings;

pub const SUFFIX_LOW: &str = "_low";
pub const SUFFIX_HIGH: &str = "_high";
/// Extension of every baked image, part of the image name.
pub const IMAGE_EXTENSION: &str = "png";

/// Objects taking part in one render invocation. `active` is always one of `selected`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BakeObjects {
    active: ObjectId,
    selected: Vec<ObjectId>,
}

impl BakeObjects {
    pub fn new(active: ObjectId, selected: Vec<ObjectId>) -> BakeResult<Self> {
        if !selected.contains(&active) {
            return Err(BakeError::precondition(
                "active object is not among the selected objects",
            ));
        }
        Ok(Self { active, selected })
    }

    pub fn active(&self) -> ObjectId {
        self.active
    }

    pub fn selected(&self) -> &[ObjectId] {
        &self.selected
    }
}

/// A low-poly mesh and the high-poly meshes projected onto it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowHighGroup {
    pub low: String,
    pub high: Vec<String>,
}

/// Mesh names baked together. `selected` starts with `active`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshGroup {
    pub active: String,
    pub selected: Vec<String>,
}

impl MeshGroup {
    pub fn single(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            selected: vec![name.clone()],
            active: name,
        }
    }
}

fn low_base(lower: &str) -> Option<&str> {
    lower.rfind(SUFFIX_LOW).map(|at| &lower[..at])
}

/// Pair every `_low` mesh with the `_high` meshes sharing its base name.
///
/// Matching ignores case. `Foo_low` and `Foo_low.001` have the base `foo`, which matches
/// `Foo_high` and `foo_HIGH.002`. Lows keep their input order, and so do the highs of a group.
pub fn match_low_to_high<S: AsRef<str>>(names: &[S]) -> Vec<LowHighGroup> {
    let lowered: Vec<(String, &str)> = names
        .iter()
        .map(|n| (n.as_ref().to_lowercase(), n.as_ref()))
        .collect();
    lowered
        .iter()
        .filter_map(|(lower, original)| {
            let base = low_base(lower)?;
            let wanted = format!("{base}{SUFFIX_HIGH}");
            let high = lowered
                .iter()
                .filter(|(l, _)| l.starts_with(&wanted))
                .map(|(_, o)| o.to_string())
                .collect();
            Some(LowHighGroup {
                low: original.to_string(),
                high,
            })
        })
        .collect()
}

/// Split mesh names into the groups baked one after the other.
///
/// Without low/high matching every mesh is its own group. With it, each low mesh forms a group
/// with its high meshes; meshes that are neither low nor high are skipped. A low mesh without a
/// high match is an error when `require_high` is set, and baked alone otherwise.
pub fn mesh_groups<S: AsRef<str>>(
    names: &[S],
    high_to_low: bool,
    require_high: bool,
) -> BakeResult<Vec<MeshGroup>> {
    if !high_to_low {
        return Ok(names.iter().map(|n| MeshGroup::single(n.as_ref())).collect());
    }

    for name in names {
        let lower = name.as_ref().to_lowercase();
        if !lower.contains(SUFFIX_LOW) && !lower.contains(SUFFIX_HIGH) {
            warn!(mesh = name.as_ref(), "mesh has neither a low nor a high suffix, skipping");
        }
    }

    match_low_to_high(names)
        .into_iter()
        .map(|group| {
            if group.high.is_empty() && require_high {
                return Err(BakeError::precondition(format!(
                    "high poly mesh for {:?} not found in texture set mesh list",
                    group.low
                )));
            }
            let mut selected = vec![group.low.clone()];
            selected.extend(group.high);
            Ok(MeshGroup {
                active: group.low,
                selected,
            })
        })
        .collect()
}

/// Deterministic image name and file path of a bake target.
///
/// The name is the expanded template plus an optional `_{suffix}` and the extension; the file
/// lives in `{output_dir}/{set_name}/`.
pub fn image_name_and_path(
    settings: &BakeSettings,
    set_name: &str,
    suffix: Option<&str>,
    output_dir: &Path,
) -> BakeResult<(String, PathBuf)> {
    let mut name = settings.base_name(set_name)?;
    if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
        name.push('_');
        name.push_str(suffix);
    }
    name.push('.');
    name.push_str(IMAGE_EXTENSION);
    let path = output_dir.join(set_name).join(&name);
    Ok((name, path))
}

#[cfg(test)]
#[path = "../../tests/unit/bake/objects.rs"]
mod tests;

use std::path::Path;

use tracing::{debug, info};

use crate::bake::objects::{image_name_and_path, match_low_to_high};
use crate::foundation::core::{StableId, generate_color_set};
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::ids::{ImageId, MaterialId, ObjectId};
use crate::host::{Host, objects_materials, require_object};
use crate::material::import::{DEFAULT_RULES, assign_images_to_material, create_sample_material};
use crate::scene::project::MaterialCreationSettings;
use crate::scene::settings::BakeMode;
use crate::scene::texture_set::TextureSet;

/// Material copied when a texture set names no template.
pub const SAMPLE_MATERIAL: &str = "texbake_texture_import_sample";

/// Baked images of one material and the meshes it belongs to.
#[derive(Debug)]
struct MaterialPlan {
    name: String,
    meshes: Vec<ObjectId>,
    images: Vec<ImageId>,
}

/// Build materials from the images a texture set bake produced.
///
/// With `reuse_existing` the images go into the materials already on the meshes. Otherwise a
/// material named `{prefix}{[mesh_]set}{suffix}` is recreated from the template and optionally
/// assigned to every slot of its meshes. Every expected image must exist in the document or on
/// disk. Returns the materials that were created.
pub fn create_materials(host: &mut dyn Host, set_id: &StableId) -> BakeResult<Vec<MaterialId>> {
    let project = host.project();
    let set = project
        .texture_set(set_id)
        .ok_or_else(|| BakeError::precondition(format!("texture set {set_id} not found")))?
        .clone();
    let naming = project.utils.material_creation.clone();
    let output_dir = project.output_directory.clone();
    let policy = set.create_materials.clone();

    let plans = plan_materials(host, &set, &naming, &output_dir)?;
    let template = if policy.reuse_existing {
        None
    } else {
        Some(resolve_template(host, policy.template.as_deref())?)
    };

    let mut created = Vec::new();
    for plan in plans {
        let Some(template) = template else {
            for material in objects_materials(host, &plan.meshes)? {
                let assigned =
                    assign_images_to_material(host, material, &plan.images, &DEFAULT_RULES, true)?;
                debug!(material = ?material, assigned, "baked images applied to existing material");
            }
            continue;
        };

        if let Some(stale) = host.material_by_name(&plan.name) {
            debug!(material = %plan.name, "recreating material");
            host.remove_material(stale)?;
        }
        let material = host.copy_material(template, &plan.name)?;
        assign_images_to_material(host, material, &plan.images, &DEFAULT_RULES, true)?;

        if policy.assign_to_objects {
            for &mesh in &plan.meshes {
                let slots = host.material_slot_count(mesh)?.max(1);
                for slot in 0..slots {
                    host.assign_material(mesh, slot, Some(material))?;
                }
            }
        }
        info!(material = %plan.name, meshes = plan.meshes.len(), "material created");
        created.push(material);
    }
    Ok(created)
}

/// Give each object a distinct colour from the material-id palette.
pub fn randomize_object_colors(host: &mut dyn Host, objects: &[ObjectId]) -> BakeResult<()> {
    for (&object, color) in objects.iter().zip(generate_color_set(objects.len())) {
        host.set_object_color(object, color)?;
    }
    Ok(())
}

fn material_name(naming: &MaterialCreationSettings, set_name: &str, mesh: Option<&str>) -> String {
    match mesh {
        Some(mesh) => format!(
            "{}{mesh}_{set_name}{}",
            naming.name_prefix, naming.name_suffix
        ),
        None => format!("{}{set_name}{}", naming.name_prefix, naming.name_suffix),
    }
}

fn plan_materials(
    host: &mut dyn Host,
    set: &TextureSet,
    naming: &MaterialCreationSettings,
    output_dir: &Path,
) -> BakeResult<Vec<MaterialPlan>> {
    let high_to_low = set
        .enabled_textures()
        .next()
        .is_some_and(|t| t.settings.bake_high_to_low());
    let all: Vec<&str> = set.enabled_meshes().map(|m| m.name.as_str()).collect();
    let meshes: Vec<String> = if high_to_low {
        match_low_to_high(&all).into_iter().map(|g| g.low).collect()
    } else {
        all.iter().map(|m| m.to_string()).collect()
    };
    if meshes.is_empty() {
        return Err(BakeError::precondition(format!(
            "texture set {:?} has no meshes to create materials for",
            set.display_name
        )));
    }

    if set.mode == BakeMode::Single {
        let objects = meshes
            .iter()
            .map(|m| require_object(&*host, m))
            .collect::<BakeResult<Vec<_>>>()?;
        return Ok(vec![MaterialPlan {
            name: material_name(naming, &set.display_name, None),
            meshes: objects,
            images: baked_images(host, set, None, output_dir)?,
        }]);
    }

    let mut plans = Vec::with_capacity(meshes.len());
    for mesh in &meshes {
        plans.push(MaterialPlan {
            name: material_name(naming, &set.display_name, Some(mesh)),
            meshes: vec![require_object(&*host, mesh)?],
            images: baked_images(host, set, Some(mesh), output_dir)?,
        });
    }
    Ok(plans)
}

/// Images of every enabled texture, loading the ones only present on disk.
fn baked_images(
    host: &mut dyn Host,
    set: &TextureSet,
    suffix: Option<&str>,
    output_dir: &Path,
) -> BakeResult<Vec<ImageId>> {
    let mut images = Vec::new();
    let mut missing = Vec::new();
    for texture in set.enabled_textures() {
        let (name, path) =
            image_name_and_path(&texture.settings, &set.display_name, suffix, output_dir)?;
        if let Some(image) = host.image_by_name(&name) {
            images.push(image);
        } else if path.is_file() {
            images.push(host.load_image(&path)?);
        } else {
            missing.push(name);
        }
    }
    if images.is_empty() || !missing.is_empty() {
        return Err(BakeError::precondition(format!(
            "no baked images found, bake textures first; missing: {missing:?}"
        )));
    }
    Ok(images)
}

fn resolve_template(host: &mut dyn Host, template: Option<&str>) -> BakeResult<MaterialId> {
    match template {
        Some(name) => host.material_by_name(name).ok_or_else(|| {
            BakeError::validation(format!("template material {name:?} not found"))
        }),
        None => match host.material_by_name(SAMPLE_MATERIAL) {
            Some(material) => Ok(material),
            None => create_sample_material(host, SAMPLE_MATERIAL, &DEFAULT_RULES),
        },
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/materials.rs"]
mod tests;

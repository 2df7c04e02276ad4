use tracing::{debug, info};

use crate::foundation::error::BakeResult;
use crate::host::Host;
use crate::host::graph::{NodeKind, OutputTarget, SocketRef};
use crate::host::ids::{ImageId, MaterialId, NodeId};
use crate::scene::settings::Colorspace;

/// Matches image file names to image-texture slots of a material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureImportRule {
    pub name: &'static str,
    /// Image-texture nodes named with this prefix receive matching images.
    pub node_prefix: &'static str,
    /// Lowercase tokens recognised as `_{alias}` followed by `.`, `_`, `-` or whitespace.
    pub aliases: &'static [&'static str],
    pub non_color: bool,
    /// Principled input the slot feeds in the sample material.
    pub shader_input: Option<&'static str>,
}

const fn rule(
    name: &'static str,
    node_prefix: &'static str,
    aliases: &'static [&'static str],
    non_color: bool,
    shader_input: Option<&'static str>,
) -> TextureImportRule {
    TextureImportRule {
        name,
        node_prefix,
        aliases,
        non_color,
        shader_input,
    }
}

/// Built-in rules, in matching priority order.
pub const DEFAULT_RULES: [TextureImportRule; 14] = [
    rule(
        "albedo",
        "texture_albedo",
        &["albedo", "color", "base", "basecolor", "diffuse"],
        false,
        Some("Base Color"),
    ),
    rule(
        "metalness",
        "texture_metalness",
        &["metalness", "metallic", "metal"],
        true,
        Some("Metallic"),
    ),
    rule(
        "roughness",
        "texture_roughness",
        &["roughness", "rough"],
        true,
        Some("Roughness"),
    ),
    rule(
        "normal",
        "texture_normal",
        &["normalgl", "normal", "nor"],
        true,
        Some("Normal"),
    ),
    rule(
        "displacement",
        "texture_displacement",
        &["displacement", "height"],
        true,
        None,
    ),
    rule(
        "ambient_occlusion",
        "texture_ao",
        &["ambientocclusion", "oclussion", "ao"],
        true,
        None,
    ),
    rule("aorm", "texture_aorm", &["aorm", "orm"], true, None),
    rule(
        "opacity",
        "texture_opacity",
        &["opacity", "alpha"],
        true,
        Some("Alpha"),
    ),
    rule(
        "emission",
        "texture_emission",
        &["emission", "emissive", "emit"],
        false,
        Some("Emission Color"),
    ),
    rule("scattering", "texture_scattering", &["scattering"], true, None),
    rule("material_id", "texture_matid", &["matid"], false, None),
    rule("object_id", "texture_objid", &["objid", "id"], false, None),
    rule("position", "texture_position", &["position", "pos"], true, None),
    rule(
        "transmission",
        "texture_transmission",
        &["transmission"],
        true,
        None,
    ),
];

impl TextureImportRule {
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.aliases.iter().any(|alias| has_token(&lower, alias))
    }
}

fn has_token(name: &str, alias: &str) -> bool {
    let needle = format!("_{alias}");
    name.match_indices(&needle).any(|(at, _)| {
        name[at + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| matches!(c, '.' | '_' | '-') || c.is_whitespace())
    })
}

/// `texture_ao` names an AO slot, and so do `texture_ao.001` and `texture_ao_2`, but
/// `texture_aorm` does not.
fn is_slot(node_name: &str, prefix: &str) -> bool {
    node_name
        .strip_prefix(prefix)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_alphanumeric()))
}

/// First rule recognising `file_name`.
pub fn classify<'r>(
    file_name: &str,
    rules: &'r [TextureImportRule],
) -> Option<&'r TextureImportRule> {
    rules.iter().find(|r| r.matches(file_name))
}

/// Put images into the material's recognised slots.
///
/// Image-texture nodes are grouped by rule through their name prefix. Existing images are
/// unlinked first when `unlink_existing` is set, every image is assigned to all slots of the rule
/// its name matches, and slots left without an image are muted. Returns the number of slots that
/// received an image.
pub fn assign_images_to_material(
    host: &mut dyn Host,
    material: MaterialId,
    images: &[ImageId],
    rules: &[TextureImportRule],
    unlink_existing: bool,
) -> BakeResult<usize> {
    let nodes = host.material_nodes(material)?;
    let slots: Vec<Vec<NodeId>> = rules
        .iter()
        .map(|r| {
            nodes
                .iter()
                .filter(|n| n.kind == NodeKind::ImageTexture && is_slot(&n.name, r.node_prefix))
                .map(|n| n.id)
                .collect()
        })
        .collect();

    if unlink_existing {
        for node in slots.iter().flatten() {
            host.set_node_image(material, *node, None)?;
        }
    }

    let mut assigned = 0;
    for &image in images {
        let name = host.image_info(image)?.name;
        let Some(idx) = rules.iter().position(|r| r.matches(&name)) else {
            info!(image = %name, "unrecognized texture type");
            continue;
        };
        let rule = &rules[idx];
        let targets = &slots[idx];
        if targets.is_empty() {
            info!(image = %name, rule = rule.name, "no slot for texture type, ignoring");
            continue;
        }
        if rule.non_color {
            host.set_image_colorspace(image, Colorspace::NonColor)?;
        }
        for node in targets {
            host.set_node_image(material, *node, Some(image))?;
            assigned += 1;
        }
        debug!(image = %name, rule = rule.name, slots = targets.len(), "texture assigned");
    }

    let current = host.material_nodes(material)?;
    for node in slots.iter().flatten() {
        let empty = current
            .iter()
            .find(|n| n.id == *node)
            .is_none_or(|n| n.image.is_none());
        host.set_node_muted(material, *node, empty)?;
    }
    Ok(assigned)
}

/// Material with a principled shader and one named image-texture slot per rule.
///
/// Slots with a shader input are linked into it; the others are left unconnected.
pub fn create_sample_material(
    host: &mut dyn Host,
    name: &str,
    rules: &[TextureImportRule],
) -> BakeResult<MaterialId> {
    let material = host.create_material(name)?;
    let output = host.add_node(
        material,
        NodeKind::MaterialOutput {
            target: OutputTarget::All,
        },
        "Material Output",
    )?;
    let shader = host.add_node(material, NodeKind::PrincipledBsdf, "Principled BSDF")?;
    host.link(material, &SocketRef::new(shader, "BSDF"), output, "Surface")?;
    for r in rules {
        let slot = host.add_node(material, NodeKind::ImageTexture, r.node_prefix)?;
        if let Some(input) = r.shader_input {
            host.link(material, &SocketRef::new(slot, "Color"), shader, input)?;
        }
    }
    Ok(material)
}

#[cfg(test)]
#[path = "../../tests/unit/material/import.rs"]
mod tests;

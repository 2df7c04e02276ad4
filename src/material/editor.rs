use std::collections::HashMap;

use tracing::{debug, warn};

use crate::foundation::core::Rgb;
use crate::foundation::error::{BakeError, BakeResult};
use crate::host::{GeneratedKind, Host};
use crate::host::graph::{NodeKind, OutputTarget, SocketRef, SocketValue};
use crate::host::ids::{ImageId, MaterialId, NodeId};
use crate::recipe::library::{GridKind, Recipe, Signal};
use crate::scene::settings::BakeSettings;

/// Name prefix of every node created by [`setup`].
pub const NODE_PREFIX: &str = "texbake_utils_";
/// Name prefix of generated helper images.
pub const MAP_PREFIX: &str = "texbake_map_";

/// Nodes and helper images created while rewriting material graphs.
///
/// Every node is recorded the moment it is added, so a setup that fails halfway can still be
/// undone by [`cleanup`]. Helper images are shared between materials and only removed once the
/// last material using them is cleaned up.
#[derive(Debug, Default)]
pub struct GraphLedger {
    nodes: HashMap<MaterialId, Vec<NodeId>>,
    helper_users: HashMap<ImageId, Vec<MaterialId>>,
}

impl GraphLedger {
    pub fn owned_nodes(&self, material: MaterialId) -> &[NodeId] {
        self.nodes.get(&material).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn owns(&self, material: MaterialId, node: NodeId) -> bool {
        self.owned_nodes(material).contains(&node)
    }

    pub fn is_tracked(&self, material: MaterialId) -> bool {
        self.nodes.contains_key(&material)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.helper_users.is_empty()
    }

    pub fn helper_images(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.helper_users.keys().copied()
    }

    fn record_node(&mut self, material: MaterialId, node: NodeId) {
        self.nodes.entry(material).or_default().push(node);
    }

    fn record_helper(&mut self, image: ImageId, material: MaterialId) {
        let users = self.helper_users.entry(image).or_default();
        if !users.contains(&material) {
            users.push(material);
        }
        self.nodes.entry(material).or_default();
    }

    /// Forget a material. Returns its nodes and the helper images nobody uses any more.
    fn release(&mut self, material: MaterialId) -> (Vec<NodeId>, Vec<ImageId>) {
        let nodes = self.nodes.remove(&material).unwrap_or_default();
        let mut unused = Vec::new();
        self.helper_users.retain(|image, users| {
            users.retain(|m| *m != material);
            if users.is_empty() {
                unused.push(*image);
                false
            } else {
                true
            }
        });
        (nodes, unused)
    }
}

/// What a single [`setup`] call wires into a material.
#[derive(Clone, Copy, Debug)]
pub struct SetupRequest<'a> {
    pub recipe: &'a Recipe,
    pub mat_id_color: Rgb,
    pub target_image: ImageId,
    pub settings: &'a BakeSettings,
}

/// The single material output eligible as bake source.
pub fn natural_output(
    host: &dyn Host,
    ledger: &GraphLedger,
    material: MaterialId,
) -> BakeResult<NodeId> {
    let outputs: Vec<NodeId> = host
        .material_nodes(material)?
        .into_iter()
        .filter(|n| !ledger.owns(material, n.id))
        .filter(|n| matches!(n.kind, NodeKind::MaterialOutput { target } if target.feeds_baking()))
        .map(|n| n.id)
        .collect();
    match outputs.as_slice() {
        [one] => Ok(*one),
        [] => Err(BakeError::graph(format!(
            "material {:?} has no material output",
            host.material_name(material)?
        ))),
        _ => Err(BakeError::graph(format!(
            "material {:?} has more than one material output",
            host.material_name(material)?
        ))),
    }
}

/// Rewire `material` so the renderer emits the recipe's signal into the target image.
///
/// A material that is already set up is cleaned first. Native recipes leave the graph untouched.
pub fn setup(
    host: &mut dyn Host,
    ledger: &mut GraphLedger,
    material: MaterialId,
    req: &SetupRequest<'_>,
) -> BakeResult<()> {
    if ledger.is_tracked(material) {
        cleanup(host, ledger, material);
    }
    if req.recipe.is_native() {
        return Ok(());
    }

    let natural = natural_output(host, ledger, material)?;
    let shader = host
        .upstream(material, natural, "Surface")?
        .ok_or_else(|| BakeError::graph("material output has no shader connected"))?;
    let shader_kind = host
        .material_nodes(material)?
        .into_iter()
        .find(|n| n.id == shader.node)
        .map(|n| n.kind);
    if shader_kind != Some(NodeKind::PrincipledBsdf) {
        return Err(BakeError::graph(format!(
            "can not bake material {:?} with shader {shader_kind:?}",
            host.material_name(material)?
        )));
    }

    let mut b = Builder {
        host,
        ledger,
        material,
        shader: shader.node,
        req,
    };
    let bake_out = b.add(
        NodeKind::MaterialOutput {
            target: OutputTarget::Baking,
        },
        "bake_out",
    )?;
    let texture = b.add(NodeKind::ImageTexture, "bake_texture")?;
    b.host
        .set_node_image(material, texture, Some(req.target_image))?;

    let surface = match req.recipe {
        Recipe::Native => return Ok(()),
        Recipe::Emit(signal) => b.resolve(signal)?,
        Recipe::Packed { r, g, b: blue } => {
            let combine = b.add(NodeKind::CombineColor, "combine_color")?;
            for (signal, channel) in [(r, "Red"), (g, "Green"), (blue, "Blue")] {
                let from = b.resolve(signal)?;
                b.host.link(material, &from, combine, channel)?;
            }
            SocketRef::new(combine, "Color")
        }
    };
    b.host.link(material, &surface, bake_out, "Surface")?;
    b.host.set_active_output(material, bake_out)?;
    b.host.set_active_node(material, texture)?;

    debug!(
        material = %b.host.material_name(material)?,
        nodes = b.ledger.owned_nodes(material).len(),
        "material set up for baking"
    );
    Ok(())
}

/// Remove everything [`setup`] created in `material`.
///
/// Safe to call repeatedly and before any setup. Failures to remove individual nodes or images
/// are logged and skipped.
pub fn cleanup(host: &mut dyn Host, ledger: &mut GraphLedger, material: MaterialId) {
    let (nodes, images) = ledger.release(material);
    let (node_count, image_count) = (nodes.len(), images.len());
    for node in nodes {
        if let Err(e) = host.remove_node(material, node) {
            warn!(error = %e, "could not remove bake node");
        }
    }
    for image in images {
        if let Err(e) = host.remove_image(image) {
            warn!(error = %e, "could not remove helper image");
        }
    }
    if node_count + image_count > 0 {
        debug!(
            nodes = node_count,
            images = image_count,
            "material cleaned up"
        );
    }
}

struct Builder<'h, 'r> {
    host: &'h mut dyn Host,
    ledger: &'h mut GraphLedger,
    material: MaterialId,
    shader: NodeId,
    req: &'r SetupRequest<'r>,
}

impl Builder<'_, '_> {
    fn add(&mut self, kind: NodeKind, role: &str) -> BakeResult<NodeId> {
        let id = self
            .host
            .add_node(self.material, kind, &format!("{NODE_PREFIX}{role}"))?;
        self.ledger.record_node(self.material, id);
        Ok(id)
    }

    fn constant(&mut self, value: SocketValue) -> BakeResult<SocketRef> {
        match value {
            SocketValue::Float(_) => {
                let node = self.add(NodeKind::Value, "value")?;
                self.host
                    .set_input_default(self.material, node, "Value", value)?;
                Ok(SocketRef::new(node, "Value"))
            }
            SocketValue::Color(_) | SocketValue::Vector(_) => {
                let node = self.add(NodeKind::Rgb, "color")?;
                self.host.set_input_default(
                    self.material,
                    node,
                    "Color",
                    SocketValue::Color(value.as_rgb()),
                )?;
                Ok(SocketRef::new(node, "Color"))
            }
        }
    }

    fn resolve(&mut self, signal: &Signal) -> BakeResult<SocketRef> {
        match signal {
            Signal::ShaderInput { socket, kind } => {
                if let Some(from) = self.host.upstream(self.material, self.shader, socket)? {
                    return Ok(from);
                }
                let value = self
                    .host
                    .input_default(self.material, self.shader, socket)?
                    .ok_or_else(|| {
                        BakeError::graph(format!("shader input {socket:?} has no default value"))
                    })?;
                if value.kind() != *kind {
                    return Err(BakeError::graph(format!(
                        "socket type and default value don't match: {socket:?} holds {:?}, expected {kind:?}",
                        value.kind()
                    )));
                }
                self.constant(value)
            }
            Signal::Constant(value) => self.constant(*value),
            Signal::AmbientOcclusion => {
                let ao = self.add(NodeKind::AmbientOcclusion, "ao")?;
                if let Some(normal) = self.host.upstream(self.material, self.shader, "Normal")? {
                    self.host.link(self.material, &normal, ao, "Normal")?;
                }
                Ok(SocketRef::new(ao, "AO"))
            }
            Signal::MaterialId if self.req.settings.matid_use_object_color => {
                let info = self.add(NodeKind::ObjectInfo, "object_info")?;
                Ok(SocketRef::new(info, "Color"))
            }
            Signal::MaterialId => self.constant(SocketValue::Color(self.req.mat_id_color)),
            Signal::Grid(kind) => {
                let image = self.helper_image(*kind)?;
                let node = self.add(NodeKind::ImageTexture, "uv_texture")?;
                self.host
                    .set_node_image(self.material, node, Some(image))?;
                Ok(SocketRef::new(node, "Color"))
            }
        }
    }

    fn helper_image(&mut self, kind: GridKind) -> BakeResult<ImageId> {
        let size = self.req.settings.size;
        let (label, generated) = match kind {
            GridKind::Uv => ("uv", GeneratedKind::UvGrid),
            GridKind::Color => ("color", GeneratedKind::ColorGrid),
        };
        let name = format!("{MAP_PREFIX}{label}_{size}_{size}");
        let image = match self.host.image_by_name(&name) {
            Some(image) => image,
            None => self.host.create_generated(&name, size, size, generated)?,
        };
        self.ledger.record_helper(image, self.material);
        Ok(image)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/material/editor.rs"]
mod tests;

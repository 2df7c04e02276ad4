use std::collections::HashMap;

use crate::foundation::error::{BakeError, BakeResult};
use crate::host::graph::{SocketKind, SocketValue};
use crate::scene::settings::TextureType;

/// Helper map painted onto the mesh by the `utils_grid_*` types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridKind {
    Uv,
    Color,
}

/// A value routed into the bake output.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// Whatever feeds `socket` on the natural shader. When unlinked, its default value is wrapped
    /// in a constant node. The default must be of `kind`.
    ShaderInput {
        socket: &'static str,
        kind: SocketKind,
    },
    /// Literal value in a constant node.
    Constant(SocketValue),
    /// Ambient occlusion, fed the shader's normal when one is linked.
    AmbientOcclusion,
    /// Per-material identification colour, or the object colour when requested.
    MaterialId,
    Grid(GridKind),
}

impl Signal {
    pub const fn shader_color(socket: &'static str) -> Self {
        Self::ShaderInput {
            socket,
            kind: SocketKind::Color,
        }
    }

    pub const fn shader_float(socket: &'static str) -> Self {
        Self::ShaderInput {
            socket,
            kind: SocketKind::Float,
        }
    }
}

/// How a material graph must be rewired to bake one texture type.
#[derive(Clone, Debug, PartialEq)]
pub enum Recipe {
    /// The renderer produces the map itself. Graphs are left alone.
    Native,
    /// One signal emitted as-is.
    Emit(Signal),
    /// Three independent signals packed into the colour channels.
    Packed { r: Signal, g: Signal, b: Signal },
}

impl Recipe {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }
}

/// Registry of recipes by texture type.
#[derive(Clone, Debug)]
pub struct RecipeLibrary {
    recipes: HashMap<TextureType, Recipe>,
}

impl Default for RecipeLibrary {
    fn default() -> Self {
        let mut lib = Self::empty();
        for t in TextureType::ALL {
            lib.register(t, builtin(t));
        }
        lib
    }
}

impl RecipeLibrary {
    pub fn empty() -> Self {
        Self {
            recipes: HashMap::new(),
        }
    }

    /// Add or replace the recipe of a texture type.
    pub fn register(&mut self, texture_type: TextureType, recipe: Recipe) {
        self.recipes.insert(texture_type, recipe);
    }

    pub fn recipe_for(&self, texture_type: TextureType) -> BakeResult<&Recipe> {
        self.recipes.get(&texture_type).ok_or_else(|| {
            BakeError::validation(format!(
                "no shading recipe registered for texture type {texture_type}"
            ))
        })
    }

    pub fn is_native(&self, texture_type: TextureType) -> BakeResult<bool> {
        self.recipe_for(texture_type).map(Recipe::is_native)
    }
}

fn builtin(texture_type: TextureType) -> Recipe {
    match texture_type {
        TextureType::Emit
        | TextureType::Diffuse
        | TextureType::Roughness
        | TextureType::Normal => Recipe::Native,
        TextureType::EmitColor => Recipe::Emit(Signal::shader_color("Base Color")),
        TextureType::EmitRoughness => Recipe::Emit(Signal::shader_float("Roughness")),
        TextureType::EmitMetalness => Recipe::Emit(Signal::shader_float("Metallic")),
        // Opacity bakes as a constant 1.0.
        TextureType::EmitOpacity => Recipe::Emit(Signal::Constant(SocketValue::Float(1.0))),
        TextureType::MaterialId => Recipe::Emit(Signal::MaterialId),
        TextureType::Ao => Recipe::Emit(Signal::AmbientOcclusion),
        TextureType::Aorm => Recipe::Packed {
            r: Signal::AmbientOcclusion,
            g: Signal::shader_float("Roughness"),
            b: Signal::shader_float("Metallic"),
        },
        TextureType::UtilsGridColor => Recipe::Emit(Signal::Grid(GridKind::Color)),
        TextureType::UtilsGridUv => Recipe::Emit(Signal::Grid(GridKind::Uv)),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recipe/library.rs"]
mod tests;

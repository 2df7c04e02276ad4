use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{BakeError, BakeResult};

/// Texture sizes offered for baking.
pub const TEXTURE_SIZES: [u32; 8] = [64, 128, 256, 512, 1024, 2048, 4096, 8192];
/// Supersampling factors (bake at `size * sampling`, then downscale).
pub const SAMPLING_FACTORS: [u32; 4] = [1, 2, 4, 8];

/// Default image name template.
pub const DEFAULT_NAME_TEMPLATE: &str = "{set_name}_{size}_{type_short}";

/// Render pass requested from the opaque bake primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Emit,
    Diffuse,
    Roughness,
    Normal,
}

/// Colour space assigned to the baked image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Colorspace {
    #[serde(rename = "sRGB")]
    Srgb,
    #[serde(rename = "Non-Color")]
    NonColor,
}

impl Colorspace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Srgb => "sRGB",
            Self::NonColor => "Non-Color",
        }
    }
}

/// Static description of a [`TextureType`].
#[derive(Clone, Copy, Debug)]
pub struct TextureTypeInfo {
    pub ui_name: &'static str,
    pub short_name: &'static str,
    pub pass: RenderPass,
    pub colorspace: Colorspace,
    pub is_float: bool,
}

/// Requested output map.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TextureType {
    Emit,
    #[default]
    EmitColor,
    EmitRoughness,
    EmitMetalness,
    EmitOpacity,
    Diffuse,
    Roughness,
    Normal,
    MaterialId,
    Ao,
    Aorm,
    UtilsGridColor,
    UtilsGridUv,
}

impl TextureType {
    pub const ALL: [TextureType; 13] = [
        Self::Emit,
        Self::EmitColor,
        Self::EmitRoughness,
        Self::EmitMetalness,
        Self::EmitOpacity,
        Self::Diffuse,
        Self::Roughness,
        Self::Normal,
        Self::MaterialId,
        Self::Ao,
        Self::Aorm,
        Self::UtilsGridColor,
        Self::UtilsGridUv,
    ];

    pub fn info(self) -> TextureTypeInfo {
        const fn emit(ui_name: &'static str, short_name: &'static str) -> TextureTypeInfo {
            TextureTypeInfo {
                ui_name,
                short_name,
                pass: RenderPass::Emit,
                colorspace: Colorspace::Srgb,
                is_float: false,
            }
        }
        const fn non_color(mut info: TextureTypeInfo) -> TextureTypeInfo {
            info.colorspace = Colorspace::NonColor;
            info
        }
        const fn pass(mut info: TextureTypeInfo, pass: RenderPass) -> TextureTypeInfo {
            info.pass = pass;
            info
        }

        match self {
            Self::Emit => emit("Emit", "emit"),
            Self::EmitColor => emit("Color(Emit)", "color"),
            Self::EmitRoughness => non_color(emit("Roughness(Emit)", "roughness")),
            Self::EmitMetalness => non_color(emit("Metalness(Emit)", "metalness")),
            Self::EmitOpacity => non_color(emit("Opacity(Emit)", "opacity")),
            Self::Diffuse => pass(emit("Diffuse", "diffuse"), RenderPass::Diffuse),
            Self::Roughness => {
                non_color(pass(emit("Roughness", "roughness"), RenderPass::Roughness))
            }
            Self::Normal => {
                let mut info = non_color(pass(emit("Normal", "normalgl"), RenderPass::Normal));
                info.is_float = true;
                info
            }
            Self::MaterialId => emit("Material ID", "matid"),
            Self::Ao => non_color(emit("AO", "ao")),
            Self::Aorm => non_color(emit("AORM", "aorm")),
            Self::UtilsGridColor => emit("Utils: Grid Color", "grid_color"),
            Self::UtilsGridUv => emit("Utils: Grid UV", "grid_uv"),
        }
    }

    pub fn short_name(self) -> &'static str {
        self.info().short_name
    }

    /// Snake-case identifier, as used in project files.
    pub fn key(self) -> &'static str {
        match self {
            Self::Emit => "emit",
            Self::EmitColor => "emit_color",
            Self::EmitRoughness => "emit_roughness",
            Self::EmitMetalness => "emit_metalness",
            Self::EmitOpacity => "emit_opacity",
            Self::Diffuse => "diffuse",
            Self::Roughness => "roughness",
            Self::Normal => "normal",
            Self::MaterialId => "material_id",
            Self::Ao => "ao",
            Self::Aorm => "aorm",
            Self::UtilsGridColor => "utils_grid_color",
            Self::UtilsGridUv => "utils_grid_uv",
        }
    }
}

impl fmt::Display for TextureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TextureType {
    type Err = BakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.key() == norm)
            .ok_or_else(|| BakeError::validation(format!("unknown texture type {s:?}")))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginType {
    #[default]
    Extend,
    AdjacentFaces,
}

/// How a texture set maps meshes to images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BakeMode {
    /// All meshes bake into one image per texture.
    #[default]
    Single,
    /// One image per mesh group (experimental).
    PerObject,
}

/// Per-texture bake configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BakeSettings {
    #[serde(rename = "type")]
    pub texture_type: TextureType,
    pub name_template: String,
    pub size: u32,
    pub sampling: u32,
    /// Render samples; `0` keeps the host's global value.
    pub samples: u32,
    pub use_denoising: bool,
    pub margin: u32,
    pub margin_type: MarginType,
    pub matid_use_object_color: bool,
    pub match_active_by_suffix: bool,
    pub use_selected_to_active: bool,
    pub use_cage: bool,
    pub cage_extrusion: f32,
    pub max_ray_distance: f32,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            texture_type: TextureType::default(),
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            size: 512,
            sampling: 1,
            samples: 24,
            use_denoising: false,
            margin: 4,
            margin_type: MarginType::default(),
            matid_use_object_color: false,
            match_active_by_suffix: true,
            use_selected_to_active: false,
            use_cage: false,
            cage_extrusion: 0.0,
            max_ray_distance: 0.0,
        }
    }
}

impl BakeSettings {
    pub fn with_type(texture_type: TextureType) -> Self {
        Self {
            texture_type,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> BakeResult<()> {
        if !TEXTURE_SIZES.contains(&self.size) {
            return Err(BakeError::validation(format!(
                "texture size {} is not one of {TEXTURE_SIZES:?}",
                self.size
            )));
        }
        if !SAMPLING_FACTORS.contains(&self.sampling) {
            return Err(BakeError::validation(format!(
                "sampling {} is not one of {SAMPLING_FACTORS:?}",
                self.sampling
            )));
        }
        if !self.cage_extrusion.is_finite() || self.cage_extrusion < 0.0 {
            return Err(BakeError::validation("cage_extrusion must be finite and >= 0"));
        }
        if !self.max_ray_distance.is_finite() || self.max_ray_distance < 0.0 {
            return Err(BakeError::validation(
                "max_ray_distance must be finite and >= 0",
            ));
        }
        self.base_name("validate")?;
        Ok(())
    }

    /// Selected-to-active with low/high matching by name suffix.
    pub fn bake_high_to_low(&self) -> bool {
        self.use_selected_to_active && self.match_active_by_suffix
    }

    /// Edge length of the image the renderer writes into.
    pub fn real_size(&self) -> u32 {
        self.size * self.sampling
    }

    pub fn real_margin(&self) -> u32 {
        self.margin * self.sampling
    }

    /// Expand the name template for a texture set.
    pub fn base_name(&self, set_name: &str) -> BakeResult<String> {
        let size = self.size.to_string();
        let info = self.texture_type.info();
        render_template(
            &self.name_template,
            &[
                ("set_name", set_name),
                ("size", &size),
                ("type_short", info.short_name),
                ("type_full", self.texture_type.key()),
            ],
        )
    }
}

/// Replace `{key}` placeholders. Unknown or unterminated placeholders are an error.
pub(crate) fn render_template(template: &str, vars: &[(&str, &str)]) -> BakeResult<String> {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            BakeError::validation(format!("unterminated placeholder in {template:?}"))
        })?;
        let key = &after[..end];
        let value = vars
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                BakeError::validation(format!("unknown placeholder {{{key}}} in {template:?}"))
            })?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    if out.is_empty() {
        return Err(BakeError::validation("name template expands to an empty name"));
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/scene/settings.rs"]
mod tests;

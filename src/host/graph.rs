//! Vocabulary of the shading-node graph exposed by a host.

use crate::foundation::core::Rgb;
use crate::host::ids::{ImageId, NodeId};

/// Renderer a material output node is meant for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    All,
    /// The renderer that performs bakes.
    Baking,
    /// Any other renderer (e.g. a realtime viewport engine).
    Other,
}

impl OutputTarget {
    pub fn feeds_baking(self) -> bool {
        matches!(self, Self::All | Self::Baking)
    }
}

/// Kinds of nodes the baker reads or creates.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    MaterialOutput { target: OutputTarget },
    PrincipledBsdf,
    ImageTexture,
    /// Constant float. Its value is stored on the `Value` input.
    Value,
    /// Constant colour. Its value is stored on the `Color` input.
    Rgb,
    AmbientOcclusion,
    CombineColor,
    ObjectInfo,
    /// Anything else (emission, mix shaders, groups...).
    Other(String),
}

impl NodeKind {
    /// Input sockets with their initial values.
    pub fn inputs(&self) -> Vec<(&'static str, Option<SocketValue>)> {
        use SocketValue::{Color, Float, Vector};
        match self {
            Self::MaterialOutput { .. } => vec![("Surface", None), ("Displacement", None)],
            Self::PrincipledBsdf => vec![
                ("Base Color", Some(Color(Rgb::new(0.8, 0.8, 0.8)))),
                ("Metallic", Some(Float(0.0))),
                ("Roughness", Some(Float(0.5))),
                ("Alpha", Some(Float(1.0))),
                ("Normal", Some(Vector([0.0, 0.0, 0.0]))),
                ("Emission Color", Some(Color(Rgb::BLACK))),
            ],
            Self::ImageTexture => vec![("Vector", Some(Vector([0.0, 0.0, 0.0])))],
            Self::Value => vec![("Value", Some(Float(0.5)))],
            Self::Rgb => vec![("Color", Some(Color(Rgb::new(0.5, 0.5, 0.5))))],
            Self::AmbientOcclusion => vec![
                ("Color", Some(Color(Rgb::WHITE))),
                ("Distance", Some(Float(1.0))),
                ("Normal", Some(Vector([0.0, 0.0, 0.0]))),
            ],
            Self::CombineColor => vec![
                ("Red", Some(Float(0.0))),
                ("Green", Some(Float(0.0))),
                ("Blue", Some(Float(0.0))),
            ],
            Self::ObjectInfo => Vec::new(),
            Self::Other(_) => Vec::new(),
        }
    }

    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            Self::MaterialOutput { .. } => &[],
            Self::PrincipledBsdf => &["BSDF"],
            Self::ImageTexture => &["Color", "Alpha"],
            Self::Value => &["Value"],
            Self::Rgb => &["Color"],
            Self::AmbientOcclusion => &["Color", "AO"],
            Self::CombineColor => &["Color"],
            Self::ObjectInfo => &["Color", "Alpha", "Random"],
            Self::Other(_) => &["Output"],
        }
    }
}

/// Default value stored on an unlinked input socket.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SocketValue {
    Float(f32),
    Color(Rgb),
    Vector([f32; 3]),
}

impl SocketValue {
    pub fn kind(&self) -> SocketKind {
        match self {
            Self::Float(_) => SocketKind::Float,
            Self::Color(_) => SocketKind::Color,
            Self::Vector(_) => SocketKind::Vector,
        }
    }

    /// Colour view of the value: floats are broadcast, vectors are taken as-is.
    pub fn as_rgb(&self) -> Rgb {
        match *self {
            Self::Float(v) => Rgb::new(v, v, v),
            Self::Color(c) => c,
            Self::Vector([x, y, z]) => Rgb::new(x, y, z),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Float,
    Color,
    Vector,
}

/// Output socket of a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SocketRef {
    pub node: NodeId,
    pub socket: String,
}

impl SocketRef {
    pub fn new(node: NodeId, socket: impl Into<String>) -> Self {
        Self {
            node,
            socket: socket.into(),
        }
    }
}

/// Snapshot of one node in a material graph.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub image: Option<ImageId>,
    pub muted: bool,
    /// Only meaningful for material outputs.
    pub is_active_output: bool,
}

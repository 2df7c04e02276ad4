//! Shading recipes: which signal each texture type routes into the bake output.

pub mod library;

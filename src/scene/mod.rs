//! Persisted document model: projects, texture sets and bake settings.

pub mod project;
pub mod settings;
pub mod texture_set;

//! Material graph rewriting for bakes, and image assignment afterwards.

pub mod editor;
pub mod import;

//! Long-running bakes driven by the host loop: whole texture sets, the current selection, and
//! the materials built from their results.

pub mod driver;
pub mod materials;
pub mod orchestrator;
pub mod selected;

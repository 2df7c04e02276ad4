//! One render invocation at a time: the bake job, the manager that isolates it, and the shared
//! context both run against.

pub mod context;
pub mod events;
pub mod job;
pub mod manager;
pub mod objects;

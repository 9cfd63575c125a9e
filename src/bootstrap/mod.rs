//! Page-side runtime bootstrap
//!
//! Registers the cache worker when a worker runtime exists, renders the
//! layout's asset tags, and keeps dynamic lists in a stable order.

pub mod ordering;
pub mod register;
pub mod tags;

pub use ordering::{is_ordered, reorder_by_key, sort_by_id};
pub use register::{
    register, spawn_register, LocalWorkerContainer, Registration, RegistrationOutcome,
    WorkerContainer,
};
pub use tags::{registration_snippet, AssetTags, BuildMode, Entrypoints};

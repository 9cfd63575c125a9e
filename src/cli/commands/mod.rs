//! CLI command implementations

pub mod build;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod install;
pub mod routes;
pub mod tags;

pub use build::execute as build;
pub use cache::execute as cache;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use routes::execute as routes;
pub use tags::execute as tags;

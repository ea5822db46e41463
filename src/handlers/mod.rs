//! HTTP handlers for generated resource CRUD.

pub mod resource;
pub use resource::*;

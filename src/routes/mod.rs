//! Route builders: generated resource CRUD plus common service routes.

pub mod common;
pub mod resource;
pub use common::*;
pub use resource::*;

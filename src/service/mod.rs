//! Generic CRUD execution, request validation, and primary-key enforcement.

mod crud;
mod unique;
mod validation;
pub use crud::CrudService;
pub use unique::PrimaryKeyGuard;
pub use validation::RequestValidator;

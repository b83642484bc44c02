//! CrudService: CRUDS over any storage backend, with request validation.

mod crud;
mod validation;
pub use crud::CrudService;
pub use validation::{coerce_value, RequestValidator};

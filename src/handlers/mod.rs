//! HTTP handlers for the CRUDS collections.

pub mod resource;
pub use resource::*;

//! CrudEngine: generic CRUD over the schema catalog, using the safe SQL builder.

mod crud;
mod validation;
pub use crud::{CrudEngine, ListQuery};
pub use validation::RequestValidator;

//! Shared application state for all routes. The engine is fully configured before the router is built.

use crate::service::CrudEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CrudEngine>,
}

impl AppState {
    pub fn new(engine: CrudEngine) -> Self {
        AppState {
            engine: Arc::new(engine),
        }
    }
}

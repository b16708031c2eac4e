//! Application state shared across handlers.

use std::sync::Arc;

use turnstile::{DynStore, QueueEngine};

#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<QueueEngine<DynStore>>,
}

impl AppState {
    pub fn new(engine: Arc<QueueEngine<DynStore>>) -> Self {
        Self { engine }
    }
}

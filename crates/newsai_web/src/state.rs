use newsai_core::{Settings, Storage};
use std::sync::Arc;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, settings: Settings) -> Self {
        Self { storage, settings }
    }
}

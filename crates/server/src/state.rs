use zipper_core::{Config, TaskManager};

/// Shared application state
pub struct AppState {
    config: Config,
    manager: TaskManager,
}

impl AppState {
    pub fn new(config: Config, manager: TaskManager) -> Self {
        Self { config, manager }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }
}

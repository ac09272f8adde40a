use std::sync::Arc;

use scribe_core::storage::Workspace;

pub mod cli;
pub mod commands;
pub mod server;

pub struct AppContext {
    pub workspace: Arc<Workspace>,
}

pub mod apps;
pub mod backup;
pub mod inspect;
pub mod progress;
pub mod restore;
pub mod tenant;

use appvault::config::{Config, ConfigManager};
use appvault::error::Result;
use appvault::graph::auth::resolve_token;
use appvault::graph::directory::GraphDirectory;
use appvault::graph::GraphClient;
use std::sync::Arc;
use tracing::debug;

/// Global options shared by every subcommand
pub struct Context {
    pub config: ConfigManager,
    pub tenant: Option<String>,
    pub token: Option<String>,
}

impl Context {
    pub fn settings(&self) -> Result<Config> {
        self.config.load_config()
    }

    /// Authenticated Graph directory for the selected tenant
    pub fn directory(&self) -> Result<Arc<GraphDirectory>> {
        let settings = self.settings()?;
        let token = resolve_token(&self.config, self.token.as_deref(), self.tenant.as_deref())?;
        let client = GraphClient::with_settings(token, &settings.graph)?;
        debug!("Using Graph endpoint {}", client.base_url());

        Ok(Arc::new(
            GraphDirectory::new(client).with_page_size(settings.graph.page_size),
        ))
    }
}

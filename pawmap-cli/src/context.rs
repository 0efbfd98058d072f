//! Shared setup for commands: validated config, token and REST client

use std::sync::Arc;

use pawmap_api::HttpApiClient;
use pawmap_sync::MapConfig;

use crate::error::{CliError, CliResult};

/// Config checked, token resolved
pub struct CommandContext {
    pub config: MapConfig,
    pub token: Option<String>,
    pub client: Arc<HttpApiClient>,
}

impl CommandContext {
    pub fn new(config: MapConfig) -> CliResult<Self> {
        let (client, token) = config.connect_api()?;

        tracing::debug!(
            base_url = client.base_url(),
            authenticated = token.is_some(),
            category = %config.category(),
            "Command context ready"
        );

        Ok(Self {
            config,
            token,
            client: Arc::new(client),
        })
    }

    /// Mutations need a signed-in user
    pub fn require_token(&self) -> CliResult<()> {
        if self.token.is_none() {
            return Err(CliError::Usage(
                "this command needs a token (--token or PAWMAP_TOKEN)".to_string(),
            ));
        }
        Ok(())
    }
}

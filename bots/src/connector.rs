//! Turning a bot name into a connected [`Bot`].

use crate::bot::Bot;
use crate::error::ConnectError;
use crate::game::GameArchitecture;
use crate::network::{self, NetworkSettings};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait BotConnector: Send + Sync {
    async fn connect(&self, name: String) -> Result<Bot, ConnectError>;
}

/// Resolves an address per bot and joins over UDP.
pub struct NetworkConnector {
    game: Arc<dyn GameArchitecture>,
    settings: NetworkSettings,
}

impl NetworkConnector {
    pub fn new(game: Arc<dyn GameArchitecture>, settings: NetworkSettings) -> Self {
        Self { game, settings }
    }
}

#[async_trait]
impl BotConnector for NetworkConnector {
    async fn connect(&self, name: String) -> Result<Bot, ConnectError> {
        let addr = self.game.address_for_player().await?;
        network::connect(addr, &name, &self.settings).await
    }
}

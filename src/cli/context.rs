use tokio::sync::OnceCell;

use paneldeck::{DeckConfig, LoadedConfig, PanelDeck};

pub struct CliContext {
    loaded: LoadedConfig,
    deck: OnceCell<PanelDeck>,
}

impl CliContext {
    pub fn new(loaded: LoadedConfig) -> Self {
        Self {
            loaded,
            deck: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &DeckConfig {
        &self.loaded.config
    }

    /// File-backed deck, opened on first use.
    pub async fn deck(&self) -> &PanelDeck {
        self.deck
            .get_or_init(|| async { PanelDeck::from_config(self.config()) })
            .await
    }
}

//! PanelDeck library
//!
//! Wires the event bus, panel registry, filter center and panel state
//! synchronizer into one facade, and exposes them for integration testing.

pub mod config;
pub mod deck;
pub mod registry;

pub use config::{ConfigError, DeckConfig, LoadedConfig};
pub use deck::PanelDeck;
pub use registry::{ContentFactory, ContentRegistry};

pub use paneldeck_core_types as core_types;
pub use paneldeck_durable_cache as durable_cache;
pub use paneldeck_event_bus as event_bus;
pub use paneldeck_filter_center as filter_center;
pub use paneldeck_panel_state as panel_state;
pub use paneldeck_state_center as state_center;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use paneldeck_core_types::ContentType;
use paneldeck_state_center::PanelDescriptor;

pub type ContentFactory<C> = Arc<dyn Fn(&PanelDescriptor) -> C + Send + Sync>;

/// Maps a panel's content type to the factory that builds its content.
///
/// Layout composition receives the registry; the core crates never see it.
pub struct ContentRegistry<C> {
    factories: DashMap<ContentType, ContentFactory<C>>,
}

impl<C> Default for ContentRegistry<C> {
    fn default() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }
}

impl<C> ContentRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory`, returning whether a previous one was replaced.
    pub fn register<F>(&self, content_type: ContentType, factory: F) -> bool
    where
        F: Fn(&PanelDescriptor) -> C + Send + Sync + 'static,
    {
        debug!(content_type = %content_type, "content factory registered");
        self.factories
            .insert(content_type, Arc::new(factory))
            .is_some()
    }

    pub fn unregister(&self, content_type: &ContentType) -> bool {
        self.factories.remove(content_type).is_some()
    }

    pub fn contains(&self, content_type: &ContentType) -> bool {
        self.factories.contains_key(content_type)
    }

    pub fn content_types(&self) -> Vec<ContentType> {
        let mut types: Vec<ContentType> = self
            .factories
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    /// Builds content for `descriptor`; `None` for unregistered types.
    pub fn create(&self, descriptor: &PanelDescriptor) -> Option<C> {
        let factory = self
            .factories
            .get(&descriptor.content_type)
            .map(|entry| entry.value().clone())?;
        Some(factory(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_content_for_registered_types_only() {
        let registry: ContentRegistry<String> = ContentRegistry::new();
        assert!(!registry.register(ContentType::Map, |panel| format!("map:{}", panel.id)));
        registry.register(ContentType::Custom("kanban".into()), |panel| {
            format!("kanban:{}", panel.title)
        });

        let map = PanelDescriptor::new("mapPanel", ContentType::Map, "Map");
        assert_eq!(registry.create(&map).as_deref(), Some("map:mapPanel"));

        let board = PanelDescriptor::new("board", ContentType::Custom("kanban".into()), "Board");
        assert_eq!(registry.create(&board).as_deref(), Some("kanban:Board"));

        let chart = PanelDescriptor::new("chart", ContentType::Chart, "Chart");
        assert!(registry.create(&chart).is_none());

        assert_eq!(
            registry.content_types(),
            vec![ContentType::Custom("kanban".into()), ContentType::Map]
        );
        assert!(registry.register(ContentType::Map, |_| "replacement".to_string()));
        assert!(registry.unregister(&ContentType::Map));
        assert!(!registry.contains(&ContentType::Map));
    }
}

/// Naming contract for every key the core writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    prefix: String,
}

impl StorageKeys {
    pub const DEFAULT_PREFIX: &'static str = "paneldeck";

    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn active_filters(&self) -> String {
        format!("{}:filters:active", self.prefix)
    }

    pub fn filter_presets(&self) -> String {
        format!("{}:filters:presets", self.prefix)
    }

    /// Panel ids occupy their own namespace, so no id can collide with a filter key.
    pub fn panel_state(&self, panel_id: &str) -> String {
        format!("{}:panel:{}", self.prefix, panel_id)
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PREFIX)
    }
}

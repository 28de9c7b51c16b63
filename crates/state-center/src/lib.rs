pub mod panel;
pub mod store;

pub use panel::{PanelDescriptor, PanelDescriptorPatch};
pub use store::{KeyedStore, KeyedStoreStats, Mapping, ShallowMerge};

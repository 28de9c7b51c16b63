pub mod errors;
pub mod record;
pub mod store;
pub mod sync;

pub use errors::PanelStateError;
pub use record::PanelStateRecord;
pub use store::PanelStateStore;
pub use sync::{ChangeListener, ListenerId, PanelStateSync, PersistOption, StateUpdate};

pub mod api;
pub mod errors;
pub mod model;
pub mod predicate;

pub use api::FilterCenter;
pub use errors::FilterError;
pub use model::{FilterConfig, FilterConfigPatch, FilterSet};
pub use predicate::matches_record;

//! Tool selection edits over the agent draft.

pub mod apply;
pub mod types;

pub use apply::*;
pub use types::*;

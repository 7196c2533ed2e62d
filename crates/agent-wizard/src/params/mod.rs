//! Provider parameter schemas, reconciliation, and the model configuration dialog.

pub mod dialog;
pub mod load;
pub mod reconcile;
pub mod types;

pub use dialog::*;
pub use load::*;
pub use reconcile::*;
pub use types::*;

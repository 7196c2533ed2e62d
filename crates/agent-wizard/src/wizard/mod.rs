//! Wizard step validation and backend-bound actions.

pub mod actions;
pub mod validate;

pub use actions::*;
pub use validate::*;

//! Client-side core of the agent authoring wizard.
//!
//! - [`store`] owns the in-progress [`model::AgentDraft`] for one wizard flow.
//! - [`params`] reconciles model parameters under mutual-exclusion rules and
//!   drives the model configuration dialog.
//! - [`drafts`] mirrors the draft into session-scoped storage.
//! - [`poll`] waits on ticket-based backend work.
//! - [`api`] and [`wizard`] connect the above to the backend.

pub mod api;
pub mod config;
pub mod drafts;
pub mod error;
pub mod model;
pub mod params;
pub mod poll;
pub mod store;
pub mod tools;
pub mod wizard;

//! stackdeck core library
//!
//! Project-model reconciliation and compose generation for a card-based
//! manager of multi-container local dev environments. `project_info.json`
//! is the source of truth; everything else is derived from it or observed
//! from the container runtime.

pub mod compose;
pub mod desktop;
pub mod devices;
pub mod errors;
pub mod fetch;
pub mod filesys;
pub mod layout;
pub mod logs;
pub mod model;
pub mod naming;
pub mod reconcile;
pub mod runtime;
pub mod session;
pub mod utils;
pub mod viewer;

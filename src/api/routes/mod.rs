//! Route handlers for the REST API
//!
//! - [`system`] - Health
//! - [`events`] - Task-status event ingestion

mod events;
mod system;

pub use events::*;
pub use system::*;

// Canvas API module.
// Provides the transport client and types for the Canvas REST API.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{CanvasClient, Paginated};
pub use types::*;

//! domains
//!
//! The central domain model and port definitions for Wanderlust.
//! No I/O lives here: adapters implement the ports, services orchestrate them.

pub mod errors;
pub mod models;
pub mod policy;
pub mod ports;
pub mod session;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use policy::*;
pub use ports::*;
pub use session::*;

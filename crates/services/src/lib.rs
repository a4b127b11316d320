//! services
//!
//! Business rules for Wanderlust, written against the `domains` ports only.

pub mod accounts;
pub mod cleanup;
pub mod listings;
pub mod reviews;
pub mod text;

pub use accounts::AccountService;
pub use cleanup::OrphanCleanup;
pub use listings::ListingService;
pub use reviews::ReviewService;

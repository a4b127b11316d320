//! storage-adapters
//!
//! Implementations of the persistence and media ports.
//!
//! | Module             | Feature            | Port(s)                                  |
//! |--------------------|--------------------|------------------------------------------|
//! | `memory`           | always             | listings, users, reviews, sessions       |
//! | `postgres`         | `db-postgres`      | listings, users, reviews, sessions       |
//! | `media_local`      | `media-local`      | `MediaStorage` on the local filesystem   |
//! | `media_cloudinary` | `media-cloudinary` | `MediaStorage` on Cloudinary             |

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "media-local")]
pub mod media_local;

#[cfg(feature = "media-cloudinary")]
pub mod media_cloudinary;

pub use memory::{MemoryDatabase, MemorySessionStore};

#[cfg(feature = "db-postgres")]
pub use postgres::{PgDatabase, PgSessionStore};

#[cfg(feature = "media-local")]
pub use media_local::LocalMediaStorage;

#[cfg(feature = "media-cloudinary")]
pub use media_cloudinary::{CloudinaryCredentials, CloudinaryStorage};

//! Database repositories for data access layer
//!
//! - `orphan`: tracking rows for storage objects no media row references
//! - `media`: read-only view of the storage keys referenced by media rows
//! - `payments`: the `transactions` table, swept for expired pending rows
//
pub mod media;
pub mod orphan;
pub mod payments;
//
// Transaction utilities
pub mod transaction;

pub use media::{MediaReferenceRepository, MediaReferenceSource};
pub use orphan::{OrphanFileRepository, OrphanFileStore};
pub use payments::{TransactionRepository, TransactionStore};

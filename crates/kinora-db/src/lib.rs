//! Kinora Database Layer
//!
//! Postgres repositories for the persisted cleanup state: orphan tracking rows,
//! media references and expiring transactions. Every repository sits behind a
//! trait so the cleanup tasks can run against in-memory fakes in tests.
//
// Module declarations
pub mod db;

// Re-exports: Repository traits
pub use db::{MediaReferenceSource, OrphanFileStore, TransactionStore};

// Re-exports: Postgres implementations
pub use db::{MediaReferenceRepository, OrphanFileRepository, TransactionRepository};

// Re-exports: Transaction utilities
pub use db::transaction::TransactionGuard;

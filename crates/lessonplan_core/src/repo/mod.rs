//! Document persistence on top of the key/value store.
//!
//! # Responsibility
//! - Decode stored documents defensively (`repair`).
//! - Load, self-heal and save whole planner documents (`document_repo`).
//!
//! # Invariants
//! - Nothing here fails a load because of document content; only store
//!   transport errors propagate.

pub mod document_repo;
pub mod repair;

pub use document_repo::{DocumentRepository, LoadSource, Loaded};
pub use repair::{repair_half_terms, repair_units, RepairError, Repaired};

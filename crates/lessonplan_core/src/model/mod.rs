//! Planning domain model.
//!
//! # Responsibility
//! - Define the lesson catalog, unit and half-term records shared by the
//!   service and persistence layers.
//!
//! # Invariants
//! - Every unit is identified by a stable `UnitId`.
//! - Half-term slots are a fixed set of six; only their lesson lists change.
//! - Lesson references are opaque strings and are never rewritten on read.

pub mod half_term;
pub mod lesson;
pub mod unit;

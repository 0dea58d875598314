//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for datastreams.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes verify referenced entities before persistence.
//! - Repository APIs return semantic errors (`InvalidArgument`, `NotFound`,
//!   `MissingReference`) in addition to DB transport errors.

pub mod datastream_repo;
pub mod reference_repo;

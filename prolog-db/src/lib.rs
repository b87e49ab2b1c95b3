//! Clause database with first-argument indexing, and the DCG translator.
//!
//! Mirrors `chalk-solve/src/clauses.rs`'s role in the teacher. See
//! `DESIGN.md`.

pub mod clause;
pub mod database;
pub mod dcg;

pub use clause::{flatten_conjunction, term_to_clause, Clause};
pub use database::Database;

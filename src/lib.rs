//! The embeddable Prolog engine facade (spec.md §6.2).
//!
//! Assembles `prolog-ir` + `prolog-unify` + `prolog-db` + `prolog-resolve`
//! into the one thing an embedder actually calls: `Engine`. Grounded on
//! the root crate of the teacher plus `chalk-integration/src/lib.rs`'s
//! "own the database, expose a query entrypoint" shape (see `DESIGN.md`).

mod bootstrap;
pub mod config;
pub mod engine;
pub mod solution;

pub use config::EngineConfig;
pub use engine::{AnswerStream, Engine};
pub use prolog_resolve::{Port, TraceHook};
pub use solution::Solution;

//! Term representation and atom interning for the Prolog core.
//!
//! Mirrors `chalk-ir`'s role in the teacher: the leaf layer every other
//! crate in the workspace depends on. See `DESIGN.md` for the full
//! grounding ledger.

pub mod atom;
pub mod numeric;
pub mod order;
pub mod term;

pub use atom::Atom;
pub use term::{Compound, Indicator, OrderedFloat, Term, Variable};

//! Substitution, trail, and iterative unification.
//!
//! Mirrors `chalk-solve/src/infer`'s role in the teacher, narrowed from
//! type-unification-against-an-environment to plain first-order term
//! unification per spec.md §4.1. See `DESIGN.md`.

pub mod subst;
pub mod trail;
pub mod unify;

pub use subst::Substitution;
pub use trail::{Trail, TrailMark};
pub use unify::{unify, unify_no_occurs_check, unify_occurs_check};

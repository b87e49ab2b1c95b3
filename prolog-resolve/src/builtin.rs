//! The builtin registry (spec.md §4.5): name/arity → leaf predicate
//! dispatch, consulted by the resolver before clause resolution.
//!
//! Grounded on the teacher's registry-of-leaf-operations shape:
//! `chalk-solve`'s `Program` trait methods are looked up by the solver
//! as a fixed set of callbacks rather than being clauses themselves,
//! the same "leaf dispatch before falling through to the general
//! mechanism" split this registry gives builtins versus user clauses.

use prolog_ir::term::{Indicator, Term};
use prolog_unify::{Substitution, Trail};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::error::IsoError;

/// A builtin's outcome (spec.md §4.3.8). `Stream` is part of the data
/// shape for fidelity with the spec's enumeration but is never produced
/// by any builtin registered in this workspace — nondeterministic
/// builtins are instead expressed as control constructs the resolver
/// itself understands (spec.md §4.3.8: "not required for a minimal
/// implementation").
pub enum Outcome {
    Success,
    Failure,
    NotFound,
    Error(IsoError),
}

/// The context a builtin callable receives (spec.md §4.3.8): already
/// dereferenced arguments plus the substitution/trail to bind through.
pub struct BuiltinContext<'a> {
    pub subst: &'a mut Substitution,
    pub trail: &'a mut Trail,
    pub args: Vec<Term>,
}

impl<'a> BuiltinContext<'a> {
    /// Binds `a` to `b`, trailing the binding. Builtins use this instead
    /// of calling `prolog_unify::unify` directly only when they know `a`
    /// is already an unbound variable (the common "output argument"
    /// case); for general unification use `self.unify`.
    pub fn unify(&mut self, a: &Term, b: &Term) -> bool {
        prolog_unify::unify_no_occurs_check(a, b, self.subst, self.trail)
    }

    pub fn deref(&self, t: &Term) -> Term {
        self.subst.deref(t)
    }

    pub fn apply(&self, t: &Term) -> Term {
        self.subst.apply(t)
    }
}

pub type BuiltinFn = dyn Fn(&mut BuiltinContext) -> Outcome + Send + Sync;

/// `"<name>/<arity>" -> callable` (spec.md §4.5).
#[derive(Default)]
pub struct BuiltinRegistry {
    table: FxHashMap<Indicator, Arc<BuiltinFn>>,
}

impl BuiltinRegistry {
    pub fn new() -> BuiltinRegistry {
        BuiltinRegistry::default()
    }

    pub fn register<F>(&mut self, name: &str, arity: usize, callable: F)
    where
        F: Fn(&mut BuiltinContext) -> Outcome + Send + Sync + 'static,
    {
        let ind = Indicator {
            name: prolog_ir::Atom::intern(name),
            arity,
        };
        self.table.insert(ind, Arc::new(callable));
    }

    pub fn lookup(&self, name: prolog_ir::Atom, arity: usize) -> Option<Arc<BuiltinFn>> {
        self.table.get(&Indicator { name, arity }).cloned()
    }

    pub fn is_builtin(&self, name: prolog_ir::Atom, arity: usize) -> bool {
        self.table.contains_key(&Indicator { name, arity })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_roundtrips() {
        let mut reg = BuiltinRegistry::new();
        reg.register("succ_or_zero", 1, |ctx| {
            if ctx.args[0].is_integer() {
                Outcome::Success
            } else {
                Outcome::Failure
            }
        });
        let name = prolog_ir::Atom::intern("succ_or_zero");
        assert!(reg.is_builtin(name, 1));
        assert!(!reg.is_builtin(name, 2));
        assert!(reg.lookup(name, 1).is_some());
    }
}

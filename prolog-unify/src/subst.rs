//! The substitution (spec.md §3.2): a mapping Variable → Term.
//!
//! Modeled after the teacher's `InferenceTable`/`EnaVariable` split
//! (`chalk-solve/src/infer/unify.rs`): a flat map from variable id to
//! bound value, with `deref` doing the chain-walk and `apply` doing the
//! full recursive substitution. We drop chalk's union-find (`ena`) layer
//! — first-order Prolog unification binds a variable directly to its
//! value or to another variable, it never needs union-by-rank over
//! equivalence classes, so a plain hash map is both sufficient and
//! closer to what spec.md §3.2 describes.

use prolog_ir::term::{Compound, Term, Variable};
use rustc_hash::FxHashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Substitution {
    bindings: FxHashMap<u64, Term>,
}

impl Substitution {
    pub fn new() -> Substitution {
        Substitution {
            bindings: FxHashMap::default(),
        }
    }

    pub fn is_bound(&self, id: u64) -> bool {
        self.bindings.contains_key(&id)
    }

    pub fn lookup(&self, id: u64) -> Option<&Term> {
        self.bindings.get(&id)
    }

    /// Binds `var` to `value`. Callers are responsible for trailing
    /// this (see `Trail::record`); the substitution itself does not log.
    pub fn bind(&mut self, var: &Variable, value: Term) {
        self.bindings.insert(var.id, value);
    }

    pub fn unbind(&mut self, id: u64) {
        self.bindings.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Follows variable→variable links until reaching a non-variable
    /// term or an unbound variable. Idempotent; must precede any type
    /// inspection in the resolver (spec.md §3.2).
    pub fn deref(&self, term: &Term) -> Term {
        let mut cur = term.clone();
        loop {
            match &cur {
                Term::Var(v) => match self.lookup(v.id) {
                    Some(bound) => cur = bound.clone(),
                    None => return cur,
                },
                _ => return cur,
            }
        }
    }

    /// Recursively replaces bound variables with their dereferenced
    /// values, yielding a term free of bindings held in this
    /// substitution. Total: never fails, even on a rational tree built
    /// with occur-check disabled (spec.md §8 scenario 8, `X = f(X)`).
    /// Without a guard this would recurse forever, since expanding a
    /// variable's binding can reintroduce that same variable arbitrarily
    /// deep in its own value; `apply_guarded` tracks the set of variable
    /// ids currently being expanded along the *current recursive path*
    /// and leaves a back-edge unexpanded (as a bare variable) the second
    /// time it would revisit one, rather than inlining it again.
    pub fn apply(&self, term: &Term) -> Term {
        let mut seen = rustc_hash::FxHashSet::default();
        self.apply_guarded(term, &mut seen)
    }

    fn apply_guarded(&self, term: &Term, seen: &mut rustc_hash::FxHashSet<u64>) -> Term {
        match term {
            Term::Var(v) => match self.lookup(v.id) {
                Some(bound) => {
                    if !seen.insert(v.id) {
                        return term.clone();
                    }
                    let bound = bound.clone();
                    let result = self.apply_guarded(&bound, seen);
                    seen.remove(&v.id);
                    result
                }
                None => term.clone(),
            },
            Term::Compound(c) => {
                let new_args: Vec<Term> = c.args.iter().map(|a| self.apply_guarded(a, seen)).collect();
                Term::Compound(Arc::new(Compound {
                    functor: c.functor,
                    args: new_args,
                }))
            }
            _ => term.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deref_follows_variable_chains() {
        let mut s = Substitution::new();
        let x = Variable::fresh();
        let y = Variable::fresh();
        s.bind(&x, Term::Var(y.clone()));
        s.bind(&y, Term::int(42));
        assert_eq!(s.deref(&Term::Var(x)), Term::int(42));
    }

    #[test]
    fn apply_is_total_and_recursive() {
        let mut s = Substitution::new();
        let x = Variable::fresh();
        s.bind(&x, Term::int(1));
        let t = Term::compound("f", vec![Term::Var(x), Term::atom("a")]);
        let applied = s.apply(&t);
        assert_eq!(applied, Term::compound("f", vec![Term::int(1), Term::atom("a")]));
    }

    #[test]
    fn apply_is_ground_iff_no_reachable_var_is_unbound() {
        let mut s = Substitution::new();
        let x = Variable::fresh();
        let t = Term::compound("f", vec![Term::Var(x.clone())]);
        assert!(!s.apply(&t).is_ground());
        s.bind(&x, Term::int(1));
        assert!(s.apply(&t).is_ground());
    }

    #[test]
    fn apply_terminates_on_a_rational_tree() {
        let mut s = Substitution::new();
        let x = Variable::fresh();
        s.bind(&x, Term::compound("f", vec![Term::Var(x.clone())]));
        let applied = s.apply(&Term::Var(x.clone()));
        assert_eq!(applied, Term::compound("f", vec![Term::Var(x)]));
    }

    #[test]
    fn apply_does_not_treat_sibling_occurrences_of_the_same_variable_as_a_cycle() {
        let mut s = Substitution::new();
        let x = Variable::fresh();
        s.bind(&x, Term::int(7));
        let t = Term::compound("f", vec![Term::Var(x.clone()), Term::Var(x)]);
        assert_eq!(applied_both_sevens(&s, &t), Term::compound("f", vec![Term::int(7), Term::int(7)]));
    }

    fn applied_both_sevens(s: &Substitution, t: &Term) -> Term {
        s.apply(t)
    }
}

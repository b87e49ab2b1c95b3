//! Variable renaming (spec.md §4.3.9): every clause retrieval produces
//! a fresh copy so call-site variables can never collide with a
//! clause's own head/body variables.
//!
//! Grounded on `chalk-solve`'s `Binders`/instantiation step (fresh
//! inference variables substituted in for a clause's bound variables
//! before it is unified against a goal) — the same "copy-then-unify"
//! discipline, without chalk's de Bruijn binder machinery (plain
//! first-order clauses have no binder nesting to track).

use prolog_ir::term::{Compound, Term, Variable};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A renaming in progress: clause variables seen so far map to the
/// fresh variables allocated for them, so that two occurrences of the
/// same clause variable rename to the same fresh variable.
#[derive(Default)]
pub struct Renaming {
    map: FxHashMap<u64, Term>,
}

impl Renaming {
    pub fn new() -> Renaming {
        Renaming::default()
    }

    pub fn rename(&mut self, term: &Term) -> Term {
        match term {
            Term::Var(v) => self
                .map
                .entry(v.id)
                .or_insert_with(|| Term::fresh_var())
                .clone(),
            Term::Compound(c) => {
                let args = c.args.iter().map(|a| self.rename(a)).collect();
                Term::Compound(Arc::new(Compound {
                    functor: c.functor,
                    args,
                }))
            }
            other => other.clone(),
        }
    }
}

/// Renames a clause's head and body together, so shared variables
/// between head and body stay shared after renaming.
pub fn rename_clause(head: &Term, body: &[Term]) -> (Term, Vec<Term>) {
    let mut renaming = Renaming::new();
    let new_head = renaming.rename(head);
    let new_body = body.iter().map(|g| renaming.rename(g)).collect();
    (new_head, new_body)
}

/// `copy_term/2`'s underlying operation: a fresh-variable copy of a
/// single (already-dereferenced-as-deeply-as-needed-by-the-caller) term.
/// Exposed standalone because `copy_term/2` needs exactly this and
/// nothing about clauses.
pub fn copy_term(term: &Term) -> Term {
    Renaming::new().rename(term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_variables_stay_shared_after_renaming() {
        let x = Term::fresh_var();
        let head = Term::compound("p", vec![x.clone()]);
        let body = vec![Term::compound("q", vec![x])];
        let (new_head, new_body) = rename_clause(&head, &body);
        if let (Term::Compound(h), Term::Compound(b)) = (&new_head, &new_body[0]) {
            assert_eq!(h.args[0], b.args[0]);
        } else {
            panic!("expected compounds");
        }
    }

    #[test]
    fn renaming_introduces_fresh_ids_distinct_from_the_original() {
        let x = Variable::fresh();
        let t = Term::Var(x.clone());
        let renamed = copy_term(&t);
        assert_ne!(t, renamed);
    }
}

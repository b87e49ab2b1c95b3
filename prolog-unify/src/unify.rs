//! Iterative Robinson unification (spec.md §4.1).
//!
//! Grounded on `chalk-solve/src/infer/unify.rs`'s `Unifier` (a struct
//! owning the table, processing a `Zip::zip_with` traversal) but
//! reworked from chalk's recursive `zip`/type-unification machinery
//! into the explicit work-stack the spec mandates ("iterative, to
//! withstand deep terms" — spec.md §4.1), since chalk's own unifier
//! recurses through `zip_with`, which is not a structure spec.md
//! permits here (it explicitly calls out recursion as disallowed for
//! this operation, unlike chalk's type unifier which never has to
//! withstand adversarially deep *value* terms — only deep *types*,
//! which are bounded by what a Rust programmer can write in source).

use prolog_ir::term::Term;
use tracing::{instrument, trace};

use crate::subst::Substitution;
use crate::trail::Trail;

/// `unify(t1, t2, subst, trail, occur_check) -> bool` (spec.md §4.1).
///
/// On `true`, new bindings are recorded in `subst` and logged to
/// `trail`. On `false`, bindings made so far are left in place — the
/// caller undoes them via the trail (spec.md §4.1 contract note).
#[instrument(level = "trace", skip(subst, trail))]
pub fn unify(t1: &Term, t2: &Term, subst: &mut Substitution, trail: &mut Trail, occur_check: bool) -> bool {
    let mut work: Vec<(Term, Term)> = vec![(t1.clone(), t2.clone())];

    while let Some((a, b)) = work.pop() {
        let a = subst.deref(&a);
        let b = subst.deref(&b);

        match (&a, &b) {
            (Term::Var(va), Term::Var(vb)) if va.id == vb.id => continue,

            (Term::Var(va), _) => {
                if occur_check && !matches!(b, Term::Var(_)) && occurs(va.id, &b, subst) {
                    return false;
                }
                trace!("bind {:?} = {:?}", va, b);
                subst.bind(va, b.clone());
                trail.record(va);
            }
            (_, Term::Var(vb)) => {
                if occur_check && !matches!(a, Term::Var(_)) && occurs(vb.id, &a, subst) {
                    return false;
                }
                trace!("bind {:?} = {:?}", vb, a);
                subst.bind(vb, a.clone());
                trail.record(vb);
            }

            (Term::Atom(x), Term::Atom(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Int(x), Term::Int(y)) => {
                if x != y {
                    return false;
                }
            }
            (Term::Float(x), Term::Float(y)) => {
                if x != y {
                    return false;
                }
            }

            (Term::Compound(x), Term::Compound(y)) => {
                if x.functor != y.functor || x.args.len() != y.args.len() {
                    return false;
                }
                // Push in reverse so argument 0 is processed first
                // (spec.md §4.1 step 5).
                for (xa, ya) in x.args.iter().zip(y.args.iter()).rev() {
                    work.push((xa.clone(), ya.clone()));
                }
            }

            _ => return false,
        }
    }

    true
}

/// Iterative occurs-check: does `var` occur within `term`, under the
/// current substitution? Iterative over a term-stack per spec.md §4.1
/// step 3's "Occur-check is itself iterative over a term-stack."
fn occurs(var: u64, term: &Term, subst: &Substitution) -> bool {
    let mut stack = vec![term.clone()];
    while let Some(t) = stack.pop() {
        let t = subst.deref(&t);
        match &t {
            Term::Var(v) => {
                if v.id == var {
                    return true;
                }
            }
            Term::Compound(c) => {
                for a in &c.args {
                    stack.push(a.clone());
                }
            }
            _ => {}
        }
    }
    false
}

/// `unify_with_occurs_check/2`'s mode: occur-check enabled.
pub fn unify_occurs_check(t1: &Term, t2: &Term, subst: &mut Substitution, trail: &mut Trail) -> bool {
    unify(t1, t2, subst, trail, true)
}

/// ISO `=/2`'s mode and clause-head matching: no occur-check.
pub fn unify_no_occurs_check(t1: &Term, t2: &Term, subst: &mut Substitution, trail: &mut Trail) -> bool {
    unify(t1, t2, subst, trail, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolog_ir::term::{Term, Variable};

    fn fresh() -> (Substitution, Trail) {
        (Substitution::new(), Trail::new())
    }

    #[test]
    fn unifies_identical_atoms() {
        let (mut s, mut t) = fresh();
        assert!(unify(&Term::atom("a"), &Term::atom("a"), &mut s, &mut t, false));
    }

    #[test]
    fn fails_on_different_atoms() {
        let (mut s, mut t) = fresh();
        assert!(!unify(&Term::atom("a"), &Term::atom("b"), &mut s, &mut t, false));
    }

    #[test]
    fn atom_does_not_unify_with_number() {
        let (mut s, mut t) = fresh();
        assert!(!unify(&Term::atom("1"), &Term::int(1), &mut s, &mut t, false));
    }

    #[test]
    fn binds_a_variable_to_a_compound() {
        let (mut s, mut t) = fresh();
        let x = Variable::fresh();
        let rhs = Term::compound("f", vec![Term::int(1)]);
        assert!(unify(&Term::Var(x.clone()), &rhs, &mut s, &mut t, false));
        assert_eq!(s.deref(&Term::Var(x)), rhs);
    }

    #[test]
    fn occurs_check_rejects_cyclic_binding() {
        let (mut s, mut t) = fresh();
        let x = Variable::fresh();
        let rhs = Term::compound("f", vec![Term::Var(x.clone())]);
        assert!(!unify(&Term::Var(x.clone()), &rhs, &mut s, &mut t, true));
    }

    #[test]
    fn without_occurs_check_the_same_binding_succeeds_as_a_rational_tree() {
        let (mut s, mut t) = fresh();
        let x = Variable::fresh();
        let rhs = Term::compound("f", vec![Term::Var(x.clone())]);
        assert!(unify(&Term::Var(x), &rhs, &mut s, &mut t, false));
    }

    #[test]
    fn compound_arity_mismatch_fails() {
        let (mut s, mut t) = fresh();
        let a = Term::compound("f", vec![Term::int(1)]);
        let b = Term::compound("f", vec![Term::int(1), Term::int(2)]);
        assert!(!unify(&a, &b, &mut s, &mut t, false));
    }

    #[test]
    fn partial_bindings_survive_a_failed_unification_until_caller_undoes() {
        let (mut s, mut t) = fresh();
        let x = Variable::fresh();
        let a = Term::compound("f", vec![Term::Var(x.clone()), Term::atom("a")]);
        let b = Term::compound("f", vec![Term::int(1), Term::atom("b")]);
        let mark = t.mark();
        assert!(!unify(&a, &b, &mut s, &mut t, false));
        assert!(s.is_bound(x.id));
        t.undo_to(mark, &mut s);
        assert!(!s.is_bound(x.id));
    }
}

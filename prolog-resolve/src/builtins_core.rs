//! The small set of term-inspection/comparison builtins the resolver
//! ships with directly (SPEC_FULL.md §3): `copy_term/2`, `functor/3`,
//! `=../2`, `compare/3`, the `@</2` family, `==/2`/`\==/2`, `sort/2`,
//! `msort/2`. Everything else (arithmetic, atom/list processing, I/O)
//! is out of this core's scope (spec.md §1) and arrives through the
//! same `BuiltinRegistry` from an external leaf module.
//!
//! Grounded on the teacher's `Program` trait methods in
//! `chalk-solve/src/lib.rs`: a fixed table of leaf operations the
//! solver calls into rather than expresses as clauses, the same
//! "structural/inspection primitives live outside the proof search"
//! split this module's contents have relative to ordinary predicates.

use num_traits::ToPrimitive;
use prolog_ir::order;
use prolog_ir::term::Term;
use std::cmp::Ordering;

use crate::builtin::{BuiltinContext, BuiltinRegistry, Outcome};
use crate::error::IsoError;
use crate::rename;

pub fn default_registry() -> BuiltinRegistry {
    let mut reg = BuiltinRegistry::new();
    reg.register("=", 2, unify_builtin);
    reg.register("\\=", 2, not_unifiable);
    reg.register("unify_with_occurs_check", 2, unify_occurs_check_builtin);
    reg.register("copy_term", 2, copy_term);
    reg.register("functor", 3, functor);
    reg.register("=..", 2, univ);
    reg.register("compare", 3, compare);
    reg.register("==", 2, term_equal);
    reg.register("\\==", 2, term_not_equal);
    reg.register("@<", 2, order_lt);
    reg.register("@>", 2, order_gt);
    reg.register("@=<", 2, order_leq);
    reg.register("@>=", 2, order_geq);
    reg.register("sort", 2, sort);
    reg.register("msort", 2, msort);
    reg
}

/// Plain `=/2` exposed through the registry so it is listed alongside
/// the other builtins rather than hidden as a resolver-only special
/// case; the resolver's own fast path in `dispatch_term` still handles
/// it directly (spec.md §4.3.2 step 3 lists it ahead of registry
/// lookup), so this entry only matters if a caller invokes `call(=(X,Y))`
/// style indirection that happens to bypass that fast path.
fn unify_builtin(ctx: &mut BuiltinContext) -> Outcome {
    let a = ctx.args[0].clone();
    let b = ctx.args[1].clone();
    if ctx.unify(&a, &b) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn not_unifiable(ctx: &mut BuiltinContext) -> Outcome {
    let a = ctx.apply(&ctx.args[0].clone());
    let b = ctx.apply(&ctx.args[1].clone());
    let mut probe_subst = prolog_unify::Substitution::new();
    let mut probe_trail = prolog_unify::Trail::new();
    if prolog_unify::unify_no_occurs_check(&a, &b, &mut probe_subst, &mut probe_trail) {
        Outcome::Failure
    } else {
        Outcome::Success
    }
}

fn unify_occurs_check_builtin(ctx: &mut BuiltinContext) -> Outcome {
    let a = ctx.args[0].clone();
    let b = ctx.args[1].clone();
    if prolog_unify::unify_occurs_check(&a, &b, ctx.subst, ctx.trail) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn copy_term(ctx: &mut BuiltinContext) -> Outcome {
    let target = ctx.args[1].clone();
    let source = ctx.apply(&ctx.args[0].clone());
    let copy = rename::copy_term(&source);
    if ctx.unify(&target, &copy) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn functor(ctx: &mut BuiltinContext) -> Outcome {
    let t = ctx.args[0].clone();
    let name_arg = ctx.args[1].clone();
    let arity_arg = ctx.args[2].clone();

    if t.is_variable() {
        let name = ctx.deref(&name_arg);
        let arity = ctx.deref(&arity_arg);
        if name.is_variable() || arity.is_variable() {
            return Outcome::Error(IsoError::instantiation());
        }
        let arity_n = match &arity {
            Term::Int(n) => match n.to_usize() {
                Some(n) => n,
                None => return Outcome::Error(IsoError::domain_error("not_less_than_zero", arity.clone())),
            },
            _ => return Outcome::Error(IsoError::type_error("integer", arity.clone())),
        };
        let built = if arity_n == 0 {
            if !name.is_atomic() {
                return Outcome::Error(IsoError::type_error("atomic", name.clone()));
            }
            name
        } else {
            let functor = match &name {
                Term::Atom(a) => *a,
                _ => return Outcome::Error(IsoError::type_error("atom", name.clone())),
            };
            let fresh: Vec<Term> = (0..arity_n).map(|_| Term::fresh_var()).collect();
            Term::compound_atom(functor, fresh)
        };
        if ctx.unify(&t, &built) {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    } else {
        let (name, arity) = match &t {
            Term::Compound(c) => (Term::Atom(c.functor), Term::int(c.args.len() as i64)),
            Term::Atom(a) => (Term::Atom(*a), Term::int(0)),
            Term::Int(_) | Term::Float(_) => (t.clone(), Term::int(0)),
            Term::Var(_) => unreachable!("handled above"),
        };
        if ctx.unify(&name_arg, &name) && ctx.unify(&arity_arg, &arity) {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

fn univ(ctx: &mut BuiltinContext) -> Outcome {
    let t = ctx.args[0].clone();
    let list_arg = ctx.args[1].clone();

    if t.is_variable() {
        let list = ctx.apply(&list_arg);
        if !list.is_list() {
            if list.is_variable() {
                return Outcome::Error(IsoError::instantiation());
            }
            return Outcome::Error(IsoError::type_error("list", list.clone()));
        }
        let elements = list_elements(&list);
        if elements.is_empty() {
            return Outcome::Error(IsoError::domain_error("non_empty_list", list));
        }
        let built = if elements.len() == 1 {
            if !elements[0].is_atomic() {
                return Outcome::Error(IsoError::type_error("atomic", elements[0].clone()));
            }
            elements[0].clone()
        } else {
            let functor = match &elements[0] {
                Term::Atom(a) => *a,
                _ => return Outcome::Error(IsoError::type_error("atom", elements[0].clone())),
            };
            Term::compound_atom(functor, elements[1..].to_vec())
        };
        if ctx.unify(&t, &built) {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    } else {
        let list = match &t {
            Term::Compound(c) => {
                let mut elems = vec![Term::Atom(c.functor)];
                elems.extend(c.args.iter().cloned());
                Term::proper_list(elems)
            }
            _ => Term::proper_list(vec![t.clone()]),
        };
        if ctx.unify(&list_arg, &list) {
            Outcome::Success
        } else {
            Outcome::Failure
        }
    }
}

fn list_elements(list: &Term) -> Vec<Term> {
    let mut out = Vec::new();
    let mut cur = list.clone();
    loop {
        match &cur {
            Term::Compound(c) if c.args.len() == 2 && c.functor.as_str().as_ref() == "." => {
                out.push(c.args[0].clone());
                cur = c.args[1].clone();
            }
            _ => break,
        }
    }
    out
}

fn ordering_atom(o: Ordering) -> Term {
    match o {
        Ordering::Less => Term::atom("<"),
        Ordering::Equal => Term::atom("="),
        Ordering::Greater => Term::atom(">"),
    }
}

fn compare(ctx: &mut BuiltinContext) -> Outcome {
    let order_arg = ctx.args[0].clone();
    let a = ctx.apply(&ctx.args[1].clone());
    let b = ctx.apply(&ctx.args[2].clone());
    let result = ordering_atom(order::compare(&a, &b));
    if ctx.unify(&order_arg, &result) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn term_equal(ctx: &mut BuiltinContext) -> Outcome {
    let a = ctx.apply(&ctx.args[0].clone());
    let b = ctx.apply(&ctx.args[1].clone());
    if order::term_eq(&a, &b) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn term_not_equal(ctx: &mut BuiltinContext) -> Outcome {
    match term_equal(ctx) {
        Outcome::Success => Outcome::Failure,
        Outcome::Failure => Outcome::Success,
        other => other,
    }
}

fn order_lt(ctx: &mut BuiltinContext) -> Outcome {
    order_cmp(ctx, |o| o == Ordering::Less)
}

fn order_gt(ctx: &mut BuiltinContext) -> Outcome {
    order_cmp(ctx, |o| o == Ordering::Greater)
}

fn order_leq(ctx: &mut BuiltinContext) -> Outcome {
    order_cmp(ctx, |o| o != Ordering::Greater)
}

fn order_geq(ctx: &mut BuiltinContext) -> Outcome {
    order_cmp(ctx, |o| o != Ordering::Less)
}

fn order_cmp(ctx: &mut BuiltinContext, accept: impl Fn(Ordering) -> bool) -> Outcome {
    let a = ctx.apply(&ctx.args[0].clone());
    let b = ctx.apply(&ctx.args[1].clone());
    if accept(order::compare(&a, &b)) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

fn sort(ctx: &mut BuiltinContext) -> Outcome {
    sort_with(ctx, order::sort_dedup)
}

fn msort(ctx: &mut BuiltinContext) -> Outcome {
    sort_with(ctx, order::msort)
}

fn sort_with(ctx: &mut BuiltinContext, f: impl Fn(Vec<Term>) -> Vec<Term>) -> Outcome {
    let target = ctx.args[1].clone();
    let list = ctx.apply(&ctx.args[0].clone());
    if !list.is_list() {
        if list.is_variable() {
            return Outcome::Error(IsoError::instantiation());
        }
        return Outcome::Error(IsoError::type_error("list", list));
    }
    let sorted = f(list_elements(&list));
    let result = Term::proper_list(sorted);
    if ctx.unify(&target, &result) {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolog_unify::{Substitution, Trail};

    fn ctx<'a>(subst: &'a mut Substitution, trail: &'a mut Trail, args: Vec<Term>) -> BuiltinContext<'a> {
        BuiltinContext { subst, trail, args }
    }

    #[test]
    fn functor_decomposes_a_compound() {
        let mut s = Substitution::new();
        let mut t = Trail::new();
        let name = Term::fresh_var();
        let arity = Term::fresh_var();
        let mut c = ctx(&mut s, &mut t, vec![Term::compound("f", vec![Term::int(1), Term::int(2)]), name.clone(), arity.clone()]);
        assert!(matches!(functor(&mut c), Outcome::Success));
        assert_eq!(s.apply(&name), Term::atom("f"));
        assert_eq!(s.apply(&arity), Term::int(2));
    }

    #[test]
    fn functor_constructs_from_name_and_arity() {
        let mut s = Substitution::new();
        let mut t = Trail::new();
        let out = Term::fresh_var();
        let mut c = ctx(&mut s, &mut t, vec![out.clone(), Term::atom("f"), Term::int(2)]);
        assert!(matches!(functor(&mut c), Outcome::Success));
        let built = s.apply(&out);
        assert!(matches!(built, Term::Compound(ref c) if c.functor.as_str().as_ref() == "f" && c.args.len() == 2));
    }

    #[test]
    fn univ_round_trips_a_compound() {
        let mut s = Substitution::new();
        let mut t = Trail::new();
        let list = Term::fresh_var();
        let mut c = ctx(&mut s, &mut t, vec![Term::compound("f", vec![Term::int(1)]), list.clone()]);
        assert!(matches!(univ(&mut c), Outcome::Success));
        assert_eq!(s.apply(&list), Term::proper_list(vec![Term::atom("f"), Term::int(1)]));
    }

    #[test]
    fn compare_reports_standard_order() {
        let mut s = Substitution::new();
        let mut t = Trail::new();
        let order = Term::fresh_var();
        let mut c = ctx(&mut s, &mut t, vec![order.clone(), Term::int(1), Term::int(2)]);
        assert!(matches!(compare(&mut c), Outcome::Success));
        assert_eq!(s.apply(&order), Term::atom("<"));
    }

    #[test]
    fn sort_removes_duplicates_msort_does_not() {
        let mut s = Substitution::new();
        let mut t = Trail::new();
        let out = Term::fresh_var();
        let xs = Term::proper_list(vec![Term::int(2), Term::int(1), Term::int(1)]);
        let mut c = ctx(&mut s, &mut t, vec![xs.clone(), out.clone()]);
        assert!(matches!(sort(&mut c), Outcome::Success));
        assert_eq!(s.apply(&out), Term::proper_list(vec![Term::int(1), Term::int(2)]));

        let mut s2 = Substitution::new();
        let mut t2 = Trail::new();
        let out2 = Term::fresh_var();
        let mut c2 = ctx(&mut s2, &mut t2, vec![xs, out2.clone()]);
        assert!(matches!(msort(&mut c2), Outcome::Success));
        assert_eq!(s2.apply(&out2), Term::proper_list(vec![Term::int(1), Term::int(1), Term::int(2)]));
    }

    #[test]
    fn not_unifiable_succeeds_only_when_unification_would_fail() {
        let mut s = Substitution::new();
        let mut t = Trail::new();
        let mut c = ctx(&mut s, &mut t, vec![Term::atom("a"), Term::atom("b")]);
        assert!(matches!(not_unifiable(&mut c), Outcome::Success));
        assert!(!s.is_bound(0));
    }
}

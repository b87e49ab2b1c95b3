//! Standard order of terms (spec.md §4.6): Variables < Numbers < Atoms <
//! Compounds. Used by `@</2`, `compare/3`, `sort/2`, `msort/2`, and
//! `setof`'s de-duplication step — promoted to a standalone, reusable
//! module per SPEC_FULL.md §3, mirroring the teacher's own
//! `chalk_ir::zip`/term-comparison traversal being a public, reusable
//! module rather than private solver glue.

use crate::term::Term;
use std::cmp::Ordering;

fn rank(t: &Term) -> u8 {
    match t {
        Term::Var(_) => 0,
        Term::Int(_) | Term::Float(_) => 1,
        Term::Atom(_) => 2,
        Term::Compound(_) => 3,
    }
}

/// Compares two terms under the ISO standard order. Callers that want
/// bindings honoured must pass already-`apply`'d (dereferenced) terms;
/// this function performs no substitution lookups of its own.
pub fn compare(a: &Term, b: &Term) -> Ordering {
    match (a, b) {
        (Term::Var(x), Term::Var(y)) => x.id.cmp(&y.id),

        (Term::Int(x), Term::Int(y)) => x.cmp(y),
        (Term::Float(x), Term::Float(y)) => x.0.partial_cmp(&y.0).unwrap_or(Ordering::Equal),
        (Term::Float(x), Term::Int(y)) => {
            // Numerically equal floats sort before integers (spec.md §4.6).
            let as_big = crate::numeric::float_to_bigint_cmp(x.0, y);
            match as_big {
                Ordering::Equal => Ordering::Less,
                other => other,
            }
        }
        (Term::Int(x), Term::Float(y)) => {
            let as_big = crate::numeric::float_to_bigint_cmp(y.0, x);
            match as_big {
                Ordering::Equal => Ordering::Greater,
                Ordering::Less => Ordering::Greater,
                Ordering::Greater => Ordering::Less,
            }
        }

        (Term::Atom(x), Term::Atom(y)) => x.as_str().cmp(&y.as_str()),

        (Term::Compound(x), Term::Compound(y)) => x
            .args
            .len()
            .cmp(&y.args.len())
            .then_with(|| x.functor.as_str().cmp(&y.functor.as_str()))
            .then_with(|| {
                for (xa, ya) in x.args.iter().zip(y.args.iter()) {
                    let c = compare(xa, ya);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                Ordering::Equal
            }),

        _ => rank(a).cmp(&rank(b)),
    }
}

pub fn term_eq(a: &Term, b: &Term) -> bool {
    compare(a, b) == Ordering::Equal
}

/// Sorts in standard order, removing adjacent duplicates (for `sort/2`;
/// `msort/2` is the same sort without the dedup step).
pub fn sort_dedup(mut terms: Vec<Term>) -> Vec<Term> {
    terms.sort_by(compare);
    terms.dedup_by(|a, b| term_eq(a, b));
    terms
}

pub fn msort(mut terms: Vec<Term>) -> Vec<Term> {
    terms.sort_by(compare);
    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn variables_before_numbers_before_atoms_before_compounds() {
        let v = Term::fresh_var();
        let n = Term::int(1);
        let a = Term::atom("a");
        let c = Term::compound("f", vec![Term::int(1)]);
        assert_eq!(compare(&v, &n), Ordering::Less);
        assert_eq!(compare(&n, &a), Ordering::Less);
        assert_eq!(compare(&a, &c), Ordering::Less);
    }

    #[test]
    fn floats_before_integers_when_numerically_equal() {
        let f = Term::float(1.0);
        let i = Term::int(1);
        assert_eq!(compare(&f, &i), Ordering::Less);
        assert_eq!(compare(&i, &f), Ordering::Greater);
    }

    #[test]
    fn compounds_compare_by_arity_then_functor_then_args() {
        let f1 = Term::compound("f", vec![Term::int(1)]);
        let f2 = Term::compound("f", vec![Term::int(1), Term::int(2)]);
        assert_eq!(compare(&f1, &f2), Ordering::Less); // arity first

        let g1 = Term::compound("g", vec![Term::int(1)]);
        assert_eq!(compare(&f1, &g1), Ordering::Less); // functor name next
    }

    #[test]
    fn sort_dedup_removes_duplicates() {
        let xs = vec![Term::int(2), Term::int(1), Term::int(1)];
        let sorted = sort_dedup(xs);
        assert_eq!(sorted.len(), 2);
    }
}

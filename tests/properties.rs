//! Universal invariants and round-trip properties from spec.md §8 that
//! are most naturally exercised through the full engine rather than a
//! single layer's unit tests (see each crate's own `#[cfg(test)]`
//! modules for the layer-local ones: dereference idempotence and
//! trail-undo byte-identity in `prolog-unify`, first-arg-index
//! superset-ness in `prolog-db`).

use prolog::Engine;
use prolog_ir::term::{Term, Variable};
use prolog_ir::Atom;

fn atom(s: &str) -> Term {
    Term::atom(s)
}

fn var(name: &str) -> Term {
    Term::Var(Variable::fresh_named(Atom::intern(name)))
}

#[test]
fn findall_does_not_leak_bindings_into_the_caller_environment() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound("p", vec![atom("a")]));
    engine.assertz(Term::compound("p", vec![atom("b")]));

    // `X` is shared between the findall template and a goal conjoined
    // after it; `findall`'s internal bindings of `X` to `a` then `b`
    // must be invisible once it returns; the outer `X` must remain free
    // and still unifiable with whatever `p/1` resolution binds it to
    // independently afterwards.
    let goal = Term::compound(
        ",",
        vec![
            Term::compound(
                "findall",
                vec![var("X"), Term::compound("p", vec![var("X")]), var("L")],
            ),
            Term::compound("p", vec![var("X")]),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 2);
    assert_eq!(
        solutions[0].get("L"),
        Some(&Term::proper_list(vec![atom("a"), atom("b")]))
    );
    assert_eq!(solutions[0].get("X"), Some(&atom("a")));
    assert_eq!(solutions[1].get("X"), Some(&atom("b")));
}

#[test]
fn catch_leaves_no_stray_choice_point_on_a_clean_success() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound("p", vec![atom("only")]));

    // If `catch/3`'s internal machinery left a choice point behind, a
    // second solution (there is none) would appear after `p(only)`'s
    // single clause.
    let goal = Term::compound(
        "catch",
        vec![Term::compound("p", vec![var("X")]), var("_E"), atom("true")],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("X"), Some(&atom("only")));
}

#[test]
fn copy_term_round_trips_modulo_variable_renaming() {
    let engine = Engine::new();
    let goal = Term::compound(
        "copy_term",
        vec![
            Term::compound("f", vec![var("X"), var("Y"), var("X")]),
            var("C"),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    let copy = solutions[0].get("C").unwrap();
    match copy {
        Term::Compound(c) => {
            assert_eq!(c.functor.as_str().as_ref(), "f");
            assert_eq!(c.args.len(), 3);
            // The renamed copy keeps the shared-variable structure: arg0
            // and arg2 are the same fresh variable, distinct from arg1.
            assert_eq!(c.args[0], c.args[2]);
            assert_ne!(c.args[0], c.args[1]);
        }
        other => panic!("expected a compound, got {:?}", other),
    }
}

#[test]
fn functor_decompose_then_reconstruct_yields_same_functor_and_arity() {
    let engine = Engine::new();
    let t = Term::compound("point", vec![Term::int(1), Term::int(2)]);
    let goal = Term::compound(
        ",",
        vec![
            Term::compound("functor", vec![t, var("F"), var("A")]),
            Term::compound(
                "functor",
                vec![var("T2"), var("F"), var("A")],
            ),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    let t2 = solutions[0].get("T2").unwrap();
    assert_eq!(t2.indicator().unwrap().name.as_str().as_ref(), "point");
    assert_eq!(t2.indicator().unwrap().arity, 2);
}

#[test]
fn univ_decompose_then_reconstruct_is_structurally_equal() {
    let engine = Engine::new();
    let t = Term::compound("point", vec![Term::int(1), Term::int(2)]);
    let goal = Term::compound(
        ",",
        vec![
            Term::compound("=..", vec![t.clone(), var("L")]),
            Term::compound("=..", vec![var("T2"), var("L")]),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("T2"), Some(&t));
}

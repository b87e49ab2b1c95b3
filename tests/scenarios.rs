//! End-to-end scenarios (spec.md §8), driving `Engine` through
//! `assertz`/`query_all` exactly as an embedder would. Each test name
//! names the Testable Property it exercises rather than implementation
//! detail.

use prolog::Engine;
use prolog_ir::term::{Term, Variable};
use prolog_ir::Atom;

fn atom(s: &str) -> Term {
    Term::atom(s)
}

fn var(name: &str) -> Term {
    Term::Var(Variable::fresh_named(Atom::intern(name)))
}

fn rule(head: Term, body: Term) -> Term {
    Term::compound(":-", vec![head, body])
}

fn conj(goals: Vec<Term>) -> Term {
    let mut it = goals.into_iter().rev();
    let mut acc = it.next().expect("at least one goal");
    for g in it {
        acc = Term::compound(",", vec![g, acc]);
    }
    acc
}

#[test]
fn grandparent_query_has_one_solution() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound("parent", vec![atom("tom"), atom("bob")]));
    engine.assertz(Term::compound("parent", vec![atom("bob"), atom("ann")]));
    engine.assertz(rule(
        Term::compound("grandparent", vec![var("X"), var("Z")]),
        conj(vec![
            Term::compound("parent", vec![var("X"), var("Y")]),
            Term::compound("parent", vec![var("Y"), var("Z")]),
        ]),
    ));

    let solutions = engine
        .query_all(Term::compound("grandparent", vec![atom("tom"), var("Z")]))
        .expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("Z"), Some(&atom("ann")));
}

#[test]
fn disjunction_backtracks_through_six_solutions_in_order() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound("p", vec![atom("a")]));
    engine.assertz(Term::compound("p", vec![atom("b")]));
    engine.assertz(Term::compound("p", vec![atom("c")]));

    let px = Term::compound("p", vec![var("X")]);
    let goal = Term::compound(";", vec![px.clone(), px]);
    let solutions = engine.query_all(goal).expect("no exception");
    let xs: Vec<&Term> = solutions.iter().map(|s| s.get("X").unwrap()).collect();
    assert_eq!(
        xs,
        vec![&atom("a"), &atom("b"), &atom("c"), &atom("a"), &atom("b"), &atom("c")]
    );
}

#[test]
fn cut_in_disjunction_keeps_only_the_first_solution() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound("p", vec![atom("a")]));
    engine.assertz(Term::compound("p", vec![atom("b")]));

    let px = Term::compound("p", vec![var("X")]);
    let left = conj(vec![px.clone(), atom("!")]);
    let goal = Term::compound(";", vec![left, px]);
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("X"), Some(&atom("a")));
}

#[test]
fn findall_with_no_solutions_yields_empty_list() {
    let engine = Engine::new();
    let goal = Term::compound(
        "findall",
        vec![var("X"), Term::compound("p", vec![var("X")]), var("L")],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("L"), Some(&Term::nil()));
}

#[test]
fn bagof_groups_by_free_variable_in_standard_witness_order() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound("age", vec![atom("tom"), Term::int(30)]));
    engine.assertz(Term::compound("age", vec![atom("bob"), Term::int(30)]));
    engine.assertz(Term::compound("age", vec![atom("ann"), Term::int(25)]));

    let goal = Term::compound(
        "bagof",
        vec![
            var("N"),
            Term::compound("age", vec![var("N"), var("A")]),
            var("Ns"),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 2);
    assert_eq!(solutions[0].get("A"), Some(&Term::int(25)));
    assert_eq!(
        solutions[0].get("Ns"),
        Some(&Term::proper_list(vec![atom("ann")]))
    );
    assert_eq!(solutions[1].get("A"), Some(&Term::int(30)));
    assert_eq!(
        solutions[1].get("Ns"),
        Some(&Term::proper_list(vec![atom("tom"), atom("bob")]))
    );
}

#[test]
fn catch_with_matching_catcher_binds_the_error_term() {
    let engine = Engine::new();
    let goal = Term::compound(
        "catch",
        vec![
            Term::compound("throw", vec![atom("my_err")]),
            var("E"),
            Term::compound("=", vec![var("E"), atom("my_err")]),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("E"), Some(&atom("my_err")));
}

#[test]
fn catch_with_non_matching_catcher_propagates_the_exception() {
    let engine = Engine::new();
    let goal = Term::compound(
        "catch",
        vec![
            Term::compound("throw", vec![atom("nope")]),
            atom("other"),
            atom("true"),
        ],
    );
    match engine.query_all(goal) {
        Err(e) => assert_eq!(e, atom("nope")),
        Ok(_) => panic!("expected an unhandled exception"),
    }
}

#[test]
fn dcg_sentence_parses_successfully() {
    let mut engine = Engine::new();
    engine.assertz(Term::compound(
        "-->",
        vec![
            atom("sentence"),
            conj(vec![
                Term::proper_list(vec![atom("the")]),
                atom("noun"),
                atom("verb"),
            ]),
        ],
    ));
    engine.assertz(Term::compound(
        "-->",
        vec![atom("noun"), Term::proper_list(vec![atom("cat")])],
    ));
    engine.assertz(Term::compound(
        "-->",
        vec![atom("noun"), Term::proper_list(vec![atom("dog")])],
    ));
    engine.assertz(Term::compound(
        "-->",
        vec![atom("verb"), Term::proper_list(vec![atom("runs")])],
    ));

    let sentence = Term::proper_list(vec![atom("the"), atom("cat"), atom("runs")]);
    let goal = Term::compound("sentence", vec![sentence, Term::nil()]);
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
}

#[test]
fn occur_check_rejects_cyclic_binding_but_plain_unify_allows_a_rational_tree() {
    let engine = Engine::new();

    let goal = Term::compound(
        "unify_with_occurs_check",
        vec![var("X"), Term::compound("f", vec![var("X")])],
    );
    assert_eq!(engine.query_once(goal).unwrap(), None);

    let x = var("X");
    let goal = Term::compound("=", vec![x.clone(), Term::compound("f", vec![x])]);
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
}

#[test]
fn member_and_append_are_usable_out_of_the_box() {
    let engine = Engine::new();

    let goal = Term::compound(
        "member",
        vec![var("X"), Term::proper_list(vec![atom("a"), atom("b"), atom("c")])],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 3);

    let goal = Term::compound(
        "append",
        vec![
            Term::proper_list(vec![atom("a"), atom("b")]),
            Term::proper_list(vec![atom("c")]),
            var("Whole"),
        ],
    );
    let solutions = engine.query_all(goal).expect("no exception");
    assert_eq!(solutions.len(), 1);
    assert_eq!(
        solutions[0].get("Whole"),
        Some(&Term::proper_list(vec![atom("a"), atom("b"), atom("c")]))
    );
}

//! DCG translator (spec.md §4.4): rewrites `Head --> Body` into a
//! regular clause with two extra threading arguments.
//!
//! There is no grammar-rule concept in the teacher (chalk rewrites
//! *Rust* source, not grammars), so the shape of this pass — a
//! recursive descent over a body term that threads a pair of
//! "difference list" variables and introduces fresh ones at each
//! conjunction — is grounded on the *structure* of `src/lowering.rs`'s
//! environment-threaded recursive descent (an `Env` passed down,
//! fresh-name introduction at each binder) applied to spec.md's DCG
//! rewrite rules rather than to Rust-trait lowering.

use prolog_ir::atom::DOT;
use prolog_ir::term::{Term, Variable};

use crate::clause::{term_to_clause, Clause};
use std::sync::Arc;

const ARROW: &str = "-->";
const COMMA: &str = ",";
const SEMICOLON: &str = ";";
const PIPE: &str = "|";
const CURLY: &str = "{}";
const CALL: &str = "call";

fn is_indicator(t: &Term, name: &str, arity: usize) -> bool {
    matches!(t.indicator(), Some(ind) if ind.name.as_str().as_ref() == name && ind.arity == arity)
}

/// `true` iff `t` is a `Head --> Body` rule.
pub fn is_dcg_rule(t: &Term) -> bool {
    is_indicator(t, ARROW, 2)
}

/// Translates `Head --> Body` into a regular clause threading `S0`/`SN`.
pub fn translate_rule(t: &Term) -> Arc<Clause> {
    let (head, body) = match t {
        Term::Compound(c) if c.functor.as_str().as_ref() == ARROW && c.args.len() == 2 => {
            (c.args[0].clone(), c.args[1].clone())
        }
        _ => panic!("translate_rule called on a non `-->/2` term"),
    };

    let s0 = Term::fresh_var();
    let sn = Term::fresh_var();

    let new_head = extend_with_threading(&head, &s0, &sn);
    let new_body_goal = translate_body(&body, &s0, &sn);

    Clause::new(new_head, flatten_body_goal(&new_body_goal))
}

/// If `t` is a DCG rule, translates it to a regular clause; otherwise
/// splits it as an ordinary term via `term_to_clause`. This is the only
/// place DCG translation happens (spec.md §4.2); both `Database::assert_term`
/// and `Database::assert_clause` route through this.
pub fn maybe_translate(t: &Term) -> Arc<Clause> {
    if is_dcg_rule(t) {
        translate_rule(t)
    } else {
        term_to_clause(t)
    }
}

fn extend_with_threading(head: &Term, s0: &Term, sn: &Term) -> Term {
    match head {
        Term::Atom(a) => Term::compound_atom(*a, vec![s0.clone(), sn.clone()]),
        Term::Compound(c) => {
            let mut args = c.args.clone();
            args.push(s0.clone());
            args.push(sn.clone());
            Term::compound_atom(c.functor, args)
        }
        other => other.clone(),
    }
}

fn unify_goal(a: &Term, b: &Term) -> Term {
    Term::compound("=", vec![a.clone(), b.clone()])
}

fn conj(a: Term, b: Term) -> Term {
    Term::compound(COMMA, vec![a, b])
}

/// Walks a terminal list's `.`/2 spine, returning its elements. A
/// terminal list is assumed proper (spec.md §4.4's examples are all
/// proper lists); an improper declared tail is dropped in favour of the
/// threaded `S_out`, matching "achieved by walking the list elements,
/// attaching S_out as the tail."
fn terminal_elements(t: &Term) -> Vec<Term> {
    let mut elements = Vec::new();
    let mut cur = t.clone();
    loop {
        match &cur {
            Term::Compound(c) if c.functor == *DOT && c.args.len() == 2 => {
                elements.push(c.args[0].clone());
                cur = c.args[1].clone();
            }
            _ => break,
        }
    }
    elements
}

/// Translates a DCG body, threading `s_in` → `s_out`, per the cases of
/// spec.md §4.4.
fn translate_body(body: &Term, s_in: &Term, s_out: &Term) -> Term {
    match body {
        // Atom `[]`.
        Term::Atom(a) if a.as_str().as_ref() == "[]" => unify_goal(s_in, s_out),

        // Variable meta-call: `call(V, S_in, S_out)`.
        Term::Var(_) => Term::compound(CALL, vec![body.clone(), s_in.clone(), s_out.clone()]),

        // Terminal list (including an explicit `[x|rest]` spine).
        Term::Compound(c) if c.functor == *DOT && c.args.len() == 2 => {
            let elements = terminal_elements(body);
            let threaded = Term::list(elements, s_out.clone());
            unify_goal(s_in, &threaded)
        }

        // Conjunction `A, B`.
        Term::Compound(c) if c.functor.as_str().as_ref() == COMMA && c.args.len() == 2 => {
            let s_mid = Term::fresh_var();
            let left = translate_body(&c.args[0], s_in, &s_mid);
            let right = translate_body(&c.args[1], &s_mid, s_out);
            conj(left, right)
        }

        // Disjunction `A ; B` or `A | B` (normalised to `;`).
        Term::Compound(c)
            if c.args.len() == 2
                && (c.functor.as_str().as_ref() == SEMICOLON
                    || c.functor.as_str().as_ref() == PIPE) =>
        {
            let left = translate_body(&c.args[0], s_in, s_out);
            let right = translate_body(&c.args[1], s_in, s_out);
            Term::compound(SEMICOLON, vec![left, right])
        }

        // Curly `{Goal}`: a non-consuming call.
        Term::Compound(c) if c.functor.as_str().as_ref() == CURLY && c.args.len() == 1 => {
            conj(unify_goal(s_in, s_out), c.args[0].clone())
        }

        // Non-terminal atom: `nt(S_in, S_out)`.
        Term::Atom(a) => Term::compound_atom(*a, vec![s_in.clone(), s_out.clone()]),

        // Non-terminal compound: append the threading arguments.
        Term::Compound(c) => {
            let mut args = c.args.clone();
            args.push(s_in.clone());
            args.push(s_out.clone());
            Term::compound_atom(c.functor, args)
        }

        // Not a callable DCG body term (a bare number, say). Rather than
        // panicking at translation time, produce a goal that raises the
        // ISO-shaped error the resolver already knows how to propagate.
        other => Term::compound(
            "throw",
            vec![Term::compound(
                "error",
                vec![
                    Term::compound("type_error", vec![Term::atom("callable"), other.clone()]),
                    Term::fresh_var(),
                ],
            )],
        ),
    }
}

/// Flattens the top-level `,`/2` spine of a translated body into a goal
/// list, reusing the same flattening `term_to_clause` relies on for
/// plain `:-/2` rules.
fn flatten_body_goal(goal: &Term) -> Vec<Term> {
    crate::clause::flatten_conjunction(goal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolog_ir::term::Variable;

    fn dcg_rule(head: Term, body: Term) -> Term {
        Term::compound(ARROW, vec![head, body])
    }

    #[test]
    fn translates_terminal_list_into_threaded_unification() {
        let rule = dcg_rule(Term::atom("greeting"), Term::proper_list(vec![Term::atom("hello")]));
        let clause = translate_rule(&rule);
        // greeting(S0, SN) :- S0 = [hello|SN]
        assert_eq!(clause.head.indicator().unwrap().arity, 2);
        assert_eq!(clause.body.len(), 1);
    }

    #[test]
    fn translates_conjunction_threading_through_a_fresh_mid_variable() {
        let rule = dcg_rule(
            Term::atom("sentence"),
            Term::compound(COMMA, vec![Term::atom("noun"), Term::atom("verb")]),
        );
        let clause = translate_rule(&rule);
        assert_eq!(clause.body.len(), 2);
        // noun(S0, Mid), verb(Mid, SN): the shared middle variable ties them.
        let noun_call = &clause.body[0];
        let verb_call = &clause.body[1];
        if let (Term::Compound(n), Term::Compound(v)) = (noun_call, verb_call) {
            assert_eq!(n.args[1], v.args[0]);
        } else {
            panic!("expected compound calls");
        }
    }

    #[test]
    fn translates_disjunction_into_an_iso_semicolon_goal() {
        let rule = dcg_rule(Term::atom("digit"), Term::compound(SEMICOLON, vec![Term::atom("zero"), Term::atom("one")]));
        let clause = translate_rule(&rule);
        assert_eq!(clause.body.len(), 1);
        assert!(is_indicator(&clause.body[0], SEMICOLON, 2));
    }

    #[test]
    fn curly_escape_does_not_consume_input() {
        let rule = dcg_rule(
            Term::atom("noop"),
            Term::compound(CURLY, vec![Term::compound("writeln", vec![Term::atom("hi")])]),
        );
        let clause = translate_rule(&rule);
        assert_eq!(clause.body.len(), 2); // S0 = SN, writeln(hi)
    }

    #[test]
    fn variable_meta_call_threads_through_call3() {
        let v = Variable::fresh();
        let rule = dcg_rule(Term::atom("meta"), Term::Var(v));
        let clause = translate_rule(&rule);
        assert!(is_indicator(&clause.body[0], CALL, 3));
    }
}

//! Clauses (spec.md §3.4): `(head, body)` pairs. Facts have an empty
//! body. Clauses are immutable; retract removes *references*, existing
//! snapshots (e.g. a choice point's remaining-alternatives list) are
//! unaffected because they hold their own `Arc<Clause>` clones.

use prolog_ir::term::{Indicator, Term};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CLAUSE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug)]
pub struct Clause {
    pub id: u64,
    pub head: Term,
    pub body: Vec<Term>,
}

impl Clause {
    pub fn new(head: Term, body: Vec<Term>) -> Arc<Clause> {
        Arc::new(Clause {
            id: NEXT_CLAUSE_ID.fetch_add(1, Ordering::Relaxed),
            head,
            body,
        })
    }

    pub fn fact(head: Term) -> Arc<Clause> {
        Clause::new(head, vec![])
    }

    pub fn indicator(&self) -> Option<Indicator> {
        self.head.indicator()
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }
}

/// Flattens a conjunction term (`,`/2`) into a left-to-right goal
/// sequence, per spec.md §6.1 ("the body is flattened by walking `,`/2
/// into a goal sequence").
pub fn flatten_conjunction(t: &Term) -> Vec<Term> {
    match t.indicator() {
        Some(ind) if ind.name.as_str().as_ref() == "," && ind.arity == 2 => {
            if let Term::Compound(c) = t {
                let mut out = flatten_conjunction(&c.args[0]);
                out.extend(flatten_conjunction(&c.args[1]));
                return out;
            }
            unreachable!()
        }
        _ => vec![t.clone()],
    }
}

/// Splits a rule term into a `Clause`: if the top functor is `:-/2`,
/// the head/body split out directly; otherwise the whole term is a
/// fact. DCG (`-->/2`) interception happens in `dcg::maybe_translate`,
/// which callers run *before* this function (this function only knows
/// about plain Horn-clause syntax).
pub fn term_to_clause(t: &Term) -> Arc<Clause> {
    match t.indicator() {
        Some(ind) if ind.name.as_str().as_ref() == ":-" && ind.arity == 2 => {
            if let Term::Compound(c) = t {
                let head = c.args[0].clone();
                let body = flatten_conjunction(&c.args[1]);
                return Clause::new(head, body);
            }
            unreachable!()
        }
        _ => Clause::fact(t.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolog_ir::term::Term;

    #[test]
    fn fact_has_empty_body() {
        let c = term_to_clause(&Term::atom("true"));
        assert!(c.is_fact());
    }

    #[test]
    fn rule_splits_head_and_flattens_body() {
        let body = Term::compound(
            ",",
            vec![
                Term::compound("p", vec![Term::atom("x")]),
                Term::compound("q", vec![Term::atom("y")]),
            ],
        );
        let rule = Term::compound(":-", vec![Term::atom("r"), body]);
        let c = term_to_clause(&rule);
        assert_eq!(c.head, Term::atom("r"));
        assert_eq!(c.body.len(), 2);
    }
}

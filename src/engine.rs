//! The `Engine` facade (spec.md §6.2) and its `AnswerStream` (spec.md
//! §9 "non-determinism without coroutines": answers are pulled through
//! a plain Rust `Iterator`, the idiom appropriate to this language).
//!
//! Grounded on the teacher's root crate plus `chalk-integration/src/lib.rs`:
//! a facade owning the database and exposing a single query entrypoint,
//! generalized from "lower Rust source, then ask chalk a coherence
//! question" to "assert clauses, then ask the resolver a goal".

use prolog_db::Database;
use prolog_ir::term::{Term, Variable};
use prolog_resolve::{BuiltinContext, BuiltinRegistry, Outcome, Resolver, TraceHook};
use tracing::instrument;

use crate::bootstrap;
use crate::config::EngineConfig;
use crate::solution::Solution;

/// An embeddable Prolog engine (spec.md §6.2): owns the clause database
/// and the builtin registry; hands out one `AnswerStream` per query.
///
/// Rust's borrow checker enforces spec.md §9's logical-update-view
/// open question for free on the "mutate during a live query" axis:
/// `query`/`query_once`/`query_all` borrow `&self`, and `assertz` et al.
/// require `&mut self`, so a query and a concurrent mutation of the
/// same engine cannot coexist in safe code. This does not by itself
/// implement logical-update view across separate, sequential queries
/// (see DESIGN.md); it only rules out mutation *during* one query's
/// own iteration.
pub struct Engine {
    db: Database,
    registry: BuiltinRegistry,
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Engine {
        let mut db = Database::new();
        bootstrap::install(&mut db);
        Engine {
            db,
            registry: prolog_resolve::builtins_core::default_registry(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(level = "debug", skip(self, fact_or_rule))]
    pub fn assertz(&mut self, fact_or_rule: Term) {
        self.db.assert_term(&fact_or_rule);
    }

    #[instrument(level = "debug", skip(self, fact_or_rule))]
    pub fn asserta(&mut self, fact_or_rule: Term) {
        // `Database::asserta` has no DCG-aware entry point of its own
        // (only `assertz`/`assert_term` intercept `-->` rules); do the
        // same translation here before prepending.
        let clause = if prolog_db::dcg::is_dcg_rule(&fact_or_rule) {
            prolog_db::dcg::translate_rule(&fact_or_rule)
        } else {
            prolog_db::term_to_clause(&fact_or_rule)
        };
        self.db.asserta(clause);
    }

    /// As `assertz`, exposed separately per spec.md §6.2's operation
    /// list (both names refer to the same DCG-aware insertion here).
    pub fn assert_term(&mut self, term: Term) {
        self.assertz(term);
    }

    pub fn retract(&mut self, pattern: &Term) -> bool {
        self.db.retract(pattern)
    }

    pub fn retractall(&mut self, pattern: &Term) -> usize {
        self.db.retractall(pattern)
    }

    pub fn clear(&mut self) {
        self.db.clear();
        bootstrap::install(&mut self.db);
    }

    /// Registers a native builtin (spec.md §6.2, §4.3.8's callable
    /// contract).
    pub fn register_foreign<F>(&mut self, name: &str, arity: usize, callable: F)
    where
        F: Fn(&mut BuiltinContext) -> Outcome + Send + Sync + 'static,
    {
        self.registry.register(name, arity, callable);
    }

    /// Runs `goal`, producing an `AnswerStream` (spec.md §6.2).
    pub fn query(&self, goal: Term) -> AnswerStream<'_> {
        self.query_with_trace(goal, None)
    }

    /// As `query`, but installs `hook` as the trace callback (spec.md
    /// §6.4) and turns tracing on for the duration of this query only.
    pub fn query_with_trace(&self, goal: Term, hook: Option<Box<dyn TraceHook>>) -> AnswerStream<'_> {
        let vars = named_variables(&goal);
        let mut resolver = Resolver::new(self.config.occur_check);
        resolver.limits = self.config.limits;
        if hook.is_some() {
            resolver.trace_enabled = true;
            resolver.set_trace_hook(hook);
        }
        resolver.start_query(goal);
        AnswerStream {
            db: &self.db,
            registry: &self.registry,
            resolver,
            vars,
            exhausted: false,
        }
    }

    pub fn query_once(&self, goal: Term) -> Result<Option<Solution>, Term> {
        self.query(goal).next().transpose()
    }

    pub fn query_all(&self, goal: Term) -> Result<Vec<Solution>, Term> {
        self.query(goal).collect()
    }
}

impl Default for Engine {
    fn default() -> Engine {
        Engine::new()
    }
}

/// The distinct, *named* variables reachable from a query goal, in
/// first-occurrence order, paired with a `Term::Var` handle to
/// dereference through the solution's final substitution. Variables
/// with no name (e.g. those introduced by `Term::fresh_var()`) are not
/// reported in a `Solution`, matching how an anonymous `_` never binds
/// a reportable answer slot.
fn named_variables(goal: &Term) -> Vec<(String, Term)> {
    goal.variables()
        .into_iter()
        .filter_map(|v: Variable| {
            let name = v.name?;
            Some((name.as_str().to_string(), Term::Var(v)))
        })
        .collect()
}

/// A lazily-driven stream of solutions (spec.md §6.2, §9). Each `next()`
/// call resumes the resolver from its last choice point.
pub struct AnswerStream<'e> {
    db: &'e Database,
    registry: &'e BuiltinRegistry,
    resolver: Resolver,
    vars: Vec<(String, Term)>,
    exhausted: bool,
}

impl<'e> AnswerStream<'e> {
    fn extract_solution(&self) -> Solution {
        self.vars
            .iter()
            .map(|(name, v)| (name.clone(), self.resolver.subst.apply(v)))
            .collect()
    }
}

impl<'e> Iterator for AnswerStream<'e> {
    type Item = Result<Solution, Term>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.resolver.next_solution(self.db, self.registry) {
            Ok(true) => Some(Ok(self.extract_solution())),
            Ok(false) => {
                self.exhausted = true;
                None
            }
            Err(e) => {
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(s: &str) -> Term {
        Term::atom(s)
    }

    fn var(name: &str) -> Term {
        Term::Var(Variable::fresh_named(prolog_ir::Atom::intern(name)))
    }

    #[test]
    fn grandparent_query_yields_one_solution() {
        let mut engine = Engine::new();
        engine.assertz(Term::compound("parent", vec![atom("tom"), atom("bob")]));
        engine.assertz(Term::compound("parent", vec![atom("bob"), atom("ann")]));
        let x = var("X");
        let y = var("Y");
        let z = var("Z");
        engine.assertz(Term::compound(
            ":-",
            vec![
                Term::compound("grandparent", vec![x.clone(), z.clone()]),
                Term::compound(
                    ",",
                    vec![
                        Term::compound("parent", vec![x, y.clone()]),
                        Term::compound("parent", vec![y, z]),
                    ],
                ),
            ],
        ));
        let goal = Term::compound("grandparent", vec![atom("tom"), var("Z")]);
        let solutions = engine.query_all(goal).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("Z"), Some(&atom("ann")));
    }

    #[test]
    fn query_once_returns_none_on_empty_database() {
        let engine = Engine::new();
        let goal = Term::compound("member", vec![var("X"), Term::nil()]);
        assert_eq!(engine.query_once(goal).unwrap(), None);
    }
}

//! The clause database (spec.md §3.5, §4.2): an ordered multiset of
//! clauses with an indicator index and a first-argument index.
//!
//! Grounded on `chalk-solve/src/clauses.rs`'s `program_clauses_for_goal`:
//! it assembles a candidate list cheaply (custom clauses + clauses that
//! "could match" via a shape pre-filter, `could_match.rs`) and leaves
//! real unification to the caller. `Database::retrieve` follows the
//! same division of labour: the index only narrows by *shape*, never by
//! unifiability (spec.md §4.2's "implementations must not filter by
//! unifiability; that is the resolver's job").

use prolog_ir::term::{Indicator, Term};
use prolog_unify::{Substitution, Trail};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::instrument;

use crate::clause::Clause;
use crate::dcg;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum FirstArgKey {
    Atom(String),
    Compound(String, usize),
    Number(String),
}

fn first_arg_key(t: &Term) -> Option<FirstArgKey> {
    match t {
        Term::Var(_) => None,
        Term::Atom(a) => Some(FirstArgKey::Atom(a.as_str().to_string())),
        Term::Int(i) => Some(FirstArgKey::Number(i.to_string())),
        Term::Float(f) => Some(FirstArgKey::Number(f.0.to_string())),
        Term::Compound(c) => Some(FirstArgKey::Compound(c.functor.as_str().to_string(), c.args.len())),
    }
}

fn first_arg(head: &Term) -> Option<&Term> {
    match head {
        Term::Compound(c) => c.args.first(),
        _ => None,
    }
}

#[derive(Default)]
struct IndicatorBuckets {
    /// Source of truth: every clause for this indicator, in clause order.
    all: Vec<Arc<Clause>>,
    /// First-argument index: ground/atomic-first-arg clauses.
    by_key: FxHashMap<FirstArgKey, Vec<Arc<Clause>>>,
    /// First-argument index: clauses whose head's first argument is an
    /// unbound variable (the `_VAR_` bucket of spec.md §3.5).
    var_bucket: Vec<Arc<Clause>>,
}

/// Ordered, indexed clause store. See spec.md §3.5/§4.2 for the
/// contract each operation must honour.
#[derive(Default)]
pub struct Database {
    indicators: FxHashMap<Indicator, IndicatorBuckets>,
}

impl Database {
    pub fn new() -> Database {
        Database::default()
    }

    fn buckets_mut(&mut self, ind: Indicator) -> &mut IndicatorBuckets {
        self.indicators.entry(ind).or_insert_with(IndicatorBuckets::default)
    }

    fn index_clause(buckets: &mut IndicatorBuckets, clause: &Arc<Clause>, front: bool) {
        match first_arg(&clause.head).and_then(first_arg_key) {
            Some(key) => {
                let bucket = buckets.by_key.entry(key).or_insert_with(Vec::new);
                if front {
                    bucket.insert(0, clause.clone());
                } else {
                    bucket.push(clause.clone());
                }
            }
            None => {
                // Either no first argument (arity 0, i.e. a bare atom
                // head) or the first argument is an unbound variable:
                // both land in the var bucket so they are considered
                // for every first-arg-indexed lookup.
                if front {
                    buckets.var_bucket.insert(0, clause.clone());
                } else {
                    buckets.var_bucket.push(clause.clone());
                }
            }
        }
    }

    fn deindex_clause(buckets: &mut IndicatorBuckets, clause: &Arc<Clause>) {
        match first_arg(&clause.head).and_then(first_arg_key) {
            Some(key) => {
                if let Some(bucket) = buckets.by_key.get_mut(&key) {
                    bucket.retain(|c| c.id != clause.id);
                }
            }
            None => buckets.var_bucket.retain(|c| c.id != clause.id),
        }
    }

    /// Appends a clause; O(1) amortised (spec.md §4.2).
    #[instrument(level = "debug", skip(self, clause), fields(indicator = ?clause.indicator()))]
    pub fn assertz(&mut self, clause: Arc<Clause>) {
        let ind = clause.indicator().expect("clause head must be atom or compound");
        let buckets = self.buckets_mut(ind);
        buckets.all.push(clause.clone());
        Self::index_clause(buckets, &clause, false);
    }

    /// Prepends to both the indicator bucket and the global list.
    #[instrument(level = "debug", skip(self, clause), fields(indicator = ?clause.indicator()))]
    pub fn asserta(&mut self, clause: Arc<Clause>) {
        let ind = clause.indicator().expect("clause head must be atom or compound");
        let buckets = self.buckets_mut(ind);
        buckets.all.insert(0, clause.clone());
        Self::index_clause(buckets, &clause, true);
    }

    /// Consults the DCG translator first (spec.md §4.2); this is one of
    /// the two entry points DCG interception happens at.
    pub fn assert_term(&mut self, t: &Term) {
        self.assertz(dcg::maybe_translate(t));
    }

    /// As `assert_term`, but for a caller that already has a split
    /// `Clause` — still checked for a DCG rule hiding in `head` (the
    /// other DCG interception point spec.md §4.2 requires).
    pub fn assert_clause(&mut self, clause: Clause) {
        if dcg::is_dcg_rule(&clause.head) {
            self.assertz(dcg::translate_rule(&clause.head));
        } else {
            self.assertz(Arc::new(clause));
        }
    }

    /// Removes the first clause whose head unifies with `pattern`
    /// (not structural equality). Returns whether one was removed.
    /// Unification for matching uses a throwaway substitution/trail
    /// (spec.md §4.2).
    #[instrument(level = "debug", skip(self, pattern))]
    pub fn retract(&mut self, pattern: &Term) -> bool {
        let ind = match pattern.indicator() {
            Some(ind) => ind,
            None => return false,
        };
        let Some(buckets) = self.indicators.get(&ind) else {
            return false;
        };

        let mut found: Option<Arc<Clause>> = None;
        for clause in &buckets.all {
            // A throwaway substitution/trail per spec.md §4.2: any
            // bindings this unification makes are never observed
            // outside this loop, so the clause's own head variables can
            // be unified against directly without renaming.
            let mut subst = Substitution::new();
            let mut trail = Trail::new();
            if prolog_unify::unify_no_occurs_check(pattern, &clause.head, &mut subst, &mut trail) {
                found = Some(clause.clone());
                break;
            }
        }

        match found {
            Some(clause) => {
                let buckets = self.buckets_mut(ind);
                buckets.all.retain(|c| c.id != clause.id);
                Self::deindex_clause(buckets, &clause);
                true
            }
            None => false,
        }
    }

    /// Removes every clause whose head unifies with `pattern`. Always
    /// succeeds, even with zero matches; returns the count removed.
    #[instrument(level = "debug", skip(self, pattern))]
    pub fn retractall(&mut self, pattern: &Term) -> usize {
        let ind = match pattern.indicator() {
            Some(ind) => ind,
            None => return 0,
        };
        let Some(buckets) = self.indicators.get(&ind) else {
            return 0;
        };

        let mut to_remove = Vec::new();
        for clause in &buckets.all {
            let mut subst = Substitution::new();
            let mut trail = Trail::new();
            if prolog_unify::unify_no_occurs_check(pattern, &clause.head, &mut subst, &mut trail) {
                to_remove.push(clause.clone());
            }
        }

        let count = to_remove.len();
        if count > 0 {
            let buckets = self.buckets_mut(ind);
            let remove_ids: rustc_hash::FxHashSet<u64> = to_remove.iter().map(|c| c.id).collect();
            buckets.all.retain(|c| !remove_ids.contains(&c.id));
            for clause in &to_remove {
                Self::deindex_clause(buckets, clause);
            }
        }
        count
    }

    /// Removes every clause for `indicator`.
    pub fn clear_indicator(&mut self, indicator: Indicator) {
        self.indicators.remove(&indicator);
    }

    /// Removes every clause in the database.
    pub fn clear(&mut self) {
        self.indicators.clear();
    }

    /// Candidate clauses for `goal`, using first-argument indexing when
    /// the goal is a compound with a ground first argument (spec.md
    /// §4.2): `indexed_bucket ++ var_bucket`, each preserving its own
    /// insertion order. Otherwise the full indicator list, in clause
    /// order. Never filters by unifiability — only by shape.
    #[instrument(level = "debug", skip(self, goal))]
    pub fn retrieve(&self, goal: &Term) -> Vec<Arc<Clause>> {
        let Some(ind) = goal.indicator() else {
            return Vec::new();
        };
        let Some(buckets) = self.indicators.get(&ind) else {
            return Vec::new();
        };

        match first_arg(goal).and_then(first_arg_key) {
            Some(key) => {
                let mut out = buckets.by_key.get(&key).cloned().unwrap_or_default();
                out.extend(buckets.var_bucket.iter().cloned());
                out
            }
            None => buckets.all.clone(),
        }
    }

    pub fn indicator_len(&self, indicator: Indicator) -> usize {
        self.indicators.get(&indicator).map_or(0, |b| b.all.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::term_to_clause;
    use prolog_ir::term::Term;

    fn fact(functor: &str, args: Vec<Term>) -> Arc<Clause> {
        term_to_clause(&Term::compound(functor, args))
    }

    #[test]
    fn assertz_preserves_insertion_order_within_a_bucket() {
        let mut db = Database::new();
        db.assertz(fact("p", vec![Term::atom("a")]));
        db.assertz(fact("p", vec![Term::atom("b")]));
        let goal = Term::compound("p", vec![Term::fresh_var()]);
        let got = db.retrieve(&goal);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].head, Term::compound("p", vec![Term::atom("a")]));
        assert_eq!(got[1].head, Term::compound("p", vec![Term::atom("b")]));
    }

    #[test]
    fn asserta_prepends() {
        let mut db = Database::new();
        db.assertz(fact("p", vec![Term::atom("a")]));
        db.asserta(fact("p", vec![Term::atom("b")]));
        let goal = Term::compound("p", vec![Term::fresh_var()]);
        let got = db.retrieve(&goal);
        assert_eq!(got[0].head, Term::compound("p", vec![Term::atom("b")]));
    }

    #[test]
    fn retrieve_with_ground_first_arg_returns_indexed_plus_var_bucket() {
        let mut db = Database::new();
        db.assertz(fact("p", vec![Term::atom("a")]));
        db.assertz(fact("p", vec![Term::fresh_var()]));
        db.assertz(fact("p", vec![Term::atom("b")]));

        let goal = Term::compound("p", vec![Term::atom("a")]);
        let got = db.retrieve(&goal);
        // indexed bucket for "a" (1 clause) ++ var bucket (1 clause)
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn retractall_removes_every_unifying_clause_and_always_succeeds() {
        let mut db = Database::new();
        db.assertz(fact("p", vec![Term::atom("a")]));
        db.assertz(fact("p", vec![Term::atom("b")]));
        let removed = db.retractall(&Term::compound("p", vec![Term::fresh_var()]));
        assert_eq!(removed, 2);
        assert_eq!(db.retractall(&Term::compound("p", vec![Term::fresh_var()])), 0);
    }

    #[test]
    fn retract_removes_only_the_first_match() {
        let mut db = Database::new();
        db.assertz(fact("p", vec![Term::atom("a")]));
        db.assertz(fact("p", vec![Term::atom("a")]));
        assert!(db.retract(&Term::compound("p", vec![Term::atom("a")])));
        let goal = Term::compound("p", vec![Term::fresh_var()]);
        assert_eq!(db.retrieve(&goal).len(), 1);
    }
}

//! The trail (spec.md §3.3): an append-only log of variables bound
//! since some marker, used to undo bindings on backtracking.
//!
//! Grounded on the teacher's snapshot/commit/rollback vocabulary
//! (`InferenceTable::unify` in `chalk-solve/src/infer/unify.rs` calls
//! `self.snapshot()` / `self.commit(snapshot)` / `self.rollback_to(snapshot)`
//! around every unification attempt) generalized from chalk's
//! union-find snapshot to a plain positional log, per spec.md §3.3's
//! "trail is an append-only vector; undo is positional" design note.

use prolog_ir::term::Variable;

use crate::subst::Substitution;

/// An opaque handle into the trail, returned by `mark()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrailMark(pub usize);

#[derive(Default)]
pub struct Trail {
    log: Vec<u64>,
}

impl Trail {
    pub fn new() -> Trail {
        Trail { log: Vec::new() }
    }

    pub fn record(&mut self, var: &Variable) {
        self.log.push(var.id);
    }

    pub fn mark(&self) -> TrailMark {
        TrailMark(self.log.len())
    }

    /// Pops trail entries newer than `mark` and unbinds each variable in
    /// `subst`. After `mark(); ...; undo_to(mark, subst)` the
    /// substitution is byte-identical to its state before `mark`
    /// (spec.md §8, Universal invariant 2) provided no entry was bound
    /// twice without an intervening trail record (the unifier always
    /// trails before binding, so this holds).
    pub fn undo_to(&mut self, mark: TrailMark, subst: &mut Substitution) {
        while self.log.len() > mark.0 {
            let id = self.log.pop().unwrap();
            subst.unbind(id);
        }
    }

    /// Discards the most recent marker without undoing: a no-op on the
    /// log itself (the mark is just a saved length), present to make
    /// call sites self-documenting about *not* undoing — mirrors the
    /// teacher's explicit `commit(snapshot)` call after a successful
    /// unification.
    pub fn commit(&self, _mark: TrailMark) {}

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

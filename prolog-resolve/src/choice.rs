//! The choice-point stack (spec.md §3.6, §4.3.3): records untried
//! alternatives so the resolver can backtrack.
//!
//! Grounded on `chalk-engine`'s `Stack<StackEntry>`/forest-of-strands
//! bookkeeping, simplified down from tabled SLG resolution (which chalk
//! needs, this spec explicitly excludes — "no tabling/memoization",
//! spec.md §1) to a single flat LIFO, matching the plain ISO backtracking
//! model of spec.md §4.3.3.

use prolog_ir::term::Term;
use prolog_unify::TrailMark;
use std::sync::Arc;

use crate::goal::{Goal, GoalStack};
use prolog_db::Clause;

/// `{ catcher_pattern, recovery_goal }` (spec.md §3.6).
#[derive(Clone, Debug)]
pub struct CatchFrame {
    pub catcher_pattern: Term,
    pub recovery_goal: Term,
    /// The cut barrier in effect where `catch/3` itself was called;
    /// inherited by the pushed recovery goal.
    pub cut_barrier: usize,
}

/// One entry of the choice-point stack (spec.md §3.6).
#[derive(Clone, Debug)]
pub struct ChoicePoint {
    /// The goal this choice point is an alternative for. For a
    /// clause-alternative CP this is the original call (re-tried against
    /// `remaining_alternatives`); for a control CP it is the alternative
    /// continuation to push verbatim on backtrack.
    pub goal: Goal,
    pub remaining_alternatives: Vec<Arc<Clause>>,
    pub trail_mark: TrailMark,
    pub goal_stack_snapshot: GoalStack,
    /// Choice-point stack depth at creation time (this CP's own index).
    /// Retained for structural fidelity with spec.md's `ChoicePoint`
    /// shape; cut itself acts by truncating to a saved depth (see
    /// `ChoicePointStack::cut_to`), so this field is not read by cut.
    pub goal_count: usize,
    pub is_control: bool,
    pub removable_by_cut: bool,
    pub catch_frame: Option<CatchFrame>,
    /// Set by a fired `CatchCleanup` marker (§4.3.4) on a catch-frame
    /// choice point that is no longer at the top of the stack (goals
    /// proved since `catch/3` was entered may have pushed their own
    /// choice points above it). A disabled catch frame is inert: plain
    /// backtracking drops it like any exhausted control point (already
    /// true of a catch frame, which carries `is_control=false` and no
    /// alternatives), and `pop_to_nearest_catch` skips it rather than
    /// treating it as a live handler. It is not physically removed
    /// because removing a non-top element would shift the indices
    /// `cut_to`'s barriers rely on.
    pub disabled: bool,
}

impl ChoicePoint {
    fn clause_alternatives(
        goal: Goal,
        remaining: Vec<Arc<Clause>>,
        trail_mark: TrailMark,
        goal_stack_snapshot: GoalStack,
        depth: usize,
    ) -> ChoicePoint {
        ChoicePoint {
            goal,
            remaining_alternatives: remaining,
            trail_mark,
            goal_stack_snapshot,
            goal_count: depth,
            is_control: false,
            removable_by_cut: false,
            catch_frame: None,
            disabled: false,
        }
    }

    fn control(
        alternative_goal: Goal,
        trail_mark: TrailMark,
        goal_stack_snapshot: GoalStack,
        depth: usize,
        removable_by_cut: bool,
    ) -> ChoicePoint {
        ChoicePoint {
            goal: alternative_goal,
            remaining_alternatives: Vec::new(),
            trail_mark,
            goal_stack_snapshot,
            goal_count: depth,
            is_control: true,
            removable_by_cut,
            catch_frame: None,
            disabled: false,
        }
    }

    fn catch(
        alternative_goal: Goal,
        trail_mark: TrailMark,
        goal_stack_snapshot: GoalStack,
        depth: usize,
        frame: CatchFrame,
    ) -> ChoicePoint {
        ChoicePoint {
            goal: alternative_goal,
            remaining_alternatives: Vec::new(),
            trail_mark,
            goal_stack_snapshot,
            goal_count: depth,
            is_control: false,
            removable_by_cut: false,
            catch_frame: Some(frame),
            disabled: false,
        }
    }
}

/// LIFO choice-point stack (spec.md §3.6).
#[derive(Default)]
pub struct ChoicePointStack {
    stack: Vec<ChoicePoint>,
}

impl ChoicePointStack {
    pub fn new() -> ChoicePointStack {
        ChoicePointStack { stack: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn push_clause_alternatives(
        &mut self,
        goal: Goal,
        remaining: Vec<Arc<Clause>>,
        trail_mark: TrailMark,
        goal_stack_snapshot: GoalStack,
    ) {
        let depth = self.stack.len();
        self.stack
            .push(ChoicePoint::clause_alternatives(goal, remaining, trail_mark, goal_stack_snapshot, depth));
    }

    pub fn push_control(
        &mut self,
        alternative_goal: Goal,
        trail_mark: TrailMark,
        goal_stack_snapshot: GoalStack,
        removable_by_cut: bool,
    ) {
        let depth = self.stack.len();
        self.stack
            .push(ChoicePoint::control(alternative_goal, trail_mark, goal_stack_snapshot, depth, removable_by_cut));
    }

    pub fn push_catch(
        &mut self,
        alternative_goal: Goal,
        trail_mark: TrailMark,
        goal_stack_snapshot: GoalStack,
        frame: CatchFrame,
    ) {
        let depth = self.stack.len();
        self.stack
            .push(ChoicePoint::catch(alternative_goal, trail_mark, goal_stack_snapshot, depth, frame));
    }

    pub fn pop(&mut self) -> Option<ChoicePoint> {
        self.stack.pop()
    }

    pub fn push_back(&mut self, cp: ChoicePoint) {
        self.stack.push(cp);
    }

    /// Cut (spec.md §4.3.4): removes every choice point created at or
    /// after `barrier` (a choice-point stack depth snapshotted at clause
    /// or call entry — see `Goal::cut_barrier`). Because choice points
    /// are only ever popped from the top, a still-present CP's index
    /// equals its creation-time depth, so truncation alone implements
    /// the "all younger choice points" half of the spec's `cut_to`
    /// contract. `removable_by_cut` CPs (a disjunction's right-branch
    /// alternative) are always created at a depth at or above their
    /// enclosing clause's own barrier, so they are always caught by this
    /// same truncation; the field is retained on `ChoicePoint` for shape
    /// fidelity but does not need a separate check here.
    pub fn cut_to(&mut self, barrier: usize) {
        self.stack.truncate(barrier);
    }

    /// Finds the nearest (topmost), still-live catch frame, draining
    /// everything above and including it. A `disabled` catch frame (its
    /// cleanup marker already fired) is popped and skipped like any
    /// other exhausted choice point. Returns `None` if no live frame
    /// remains.
    pub fn pop_to_nearest_catch(&mut self) -> Option<ChoicePoint> {
        while let Some(cp) = self.stack.pop() {
            if cp.catch_frame.is_some() && !cp.disabled {
                return Some(cp);
            }
        }
        None
    }

    /// Fires a `CatchCleanup` marker (§4.3.4): if the choice point at
    /// `depth` is still present and is a catch frame, marks it inert.
    /// A no-op if an intervening cut already truncated it away.
    pub fn disable_catch_frame_at(&mut self, depth: usize) {
        if let Some(cp) = self.stack.get_mut(depth) {
            if cp.catch_frame.is_some() {
                cp.disabled = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolog_unify::Trail;

    fn mark() -> TrailMark {
        Trail::new().mark()
    }

    #[test]
    fn cut_to_truncates_everything_at_or_above_the_barrier() {
        let mut cps = ChoicePointStack::new();
        cps.push_control(Goal::term(Term::atom("a"), 0), mark(), GoalStack::new(), true);
        let barrier = cps.len();
        cps.push_control(Goal::term(Term::atom("b"), 0), mark(), GoalStack::new(), false);
        cps.push_control(Goal::term(Term::atom("c"), 0), mark(), GoalStack::new(), false);
        cps.cut_to(barrier);
        assert_eq!(cps.len(), barrier);
    }

    #[test]
    fn pop_to_nearest_catch_drains_above_it() {
        let mut cps = ChoicePointStack::new();
        cps.push_control(Goal::term(Term::atom("a"), 0), mark(), GoalStack::new(), false);
        cps.push_catch(
            Goal::term(Term::atom("recover"), 0),
            mark(),
            GoalStack::new(),
            CatchFrame {
                catcher_pattern: Term::fresh_var(),
                recovery_goal: Term::atom("recover"),
                cut_barrier: 0,
            },
        );
        cps.push_control(Goal::term(Term::atom("b"), 0), mark(), GoalStack::new(), false);
        let found = cps.pop_to_nearest_catch();
        assert!(found.is_some());
        assert_eq!(cps.len(), 1);
    }
}

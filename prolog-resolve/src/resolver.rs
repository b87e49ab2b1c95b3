//! The SLD resolver (spec.md §4.3): the main loop, backtracking, cut,
//! control constructs, meta-predicates, and the catch/throw pipeline.
//!
//! Grounded on `chalk-engine/src/logic.rs`'s `simplify_hh_goal` pop loop
//! (an explicit `pending_goals` stack drained one entry at a time,
//! dispatched by shape) for the overall pop-dispatch-push shape, and
//! `chalk-solve/src/recursive/solve.rs`'s "try a clause, fall through on
//! failure, otherwise combine" pattern for clause resolution — both
//! generalised from chalk's tabled type-resolution to the plain
//! chronological-backtracking search spec.md §4.3.2–§4.3.3 mandates,
//! since this spec's Non-goals explicitly rule out tabling.

use std::sync::Arc;

use prolog_db::{Clause, Database};
use prolog_ir::term::Term;
use prolog_unify::{Substitution, Trail};
use tracing::{debug, instrument, trace};

use crate::builtin::{BuiltinContext, BuiltinRegistry, Outcome};
use crate::choice::{CatchFrame, ChoicePointStack};
use crate::error::IsoError;
use crate::goal::{Goal, GoalItem, GoalStack, Marker};
use crate::rename;

/// Resource guards (SPEC_FULL.md §3): turns runaway choice-point/goal
/// growth into a catchable `resource_error` instead of an unbounded
/// allocation. `None` means unbounded (the default — see `EngineConfig`
/// in the root crate).
#[derive(Clone, Copy, Debug)]
pub struct ResourceLimits {
    pub max_choice_points: Option<usize>,
    pub max_goal_stack: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> ResourceLimits {
        ResourceLimits {
            max_choice_points: None,
            max_goal_stack: None,
        }
    }
}

/// The resolver's full state (spec.md §4.3.1). `var_counter` is tracked
/// globally in `prolog_ir::term` rather than per-resolver (see
/// `next_var_id`'s doc comment); `trace_state` is `trace_enabled` plus
/// the optional callback, both owned by the root crate's `Engine` —
/// `Resolver` only exposes the `trace_enabled` toggle `trace/0`/`notrace/0`
/// flip, and calls back through `TraceHook` when one is installed.
pub struct Resolver {
    pub subst: Substitution,
    pub trail: Trail,
    pub goals: GoalStack,
    pub choice_points: ChoicePointStack,
    pub occur_check: bool,
    pub trace_enabled: bool,
    pub limits: ResourceLimits,
    trace_hook: Option<Box<dyn TraceHook>>,
    started: bool,
}

/// What dispatching a single popped goal produced.
enum Dispatched {
    Progress,
    Fail,
    Thrown(Term),
}

/// A hook invoked at each of the four trace ports (spec.md §6.4). Kept
/// as a plain callback parameter to `next_solution`/`prove` rather than
/// a `Resolver` field, since the root crate's `Engine` is the natural
/// owner of trace-callback lifetime, not the resolver itself.
pub trait TraceHook {
    fn port(&mut self, port: Port, depth: usize, goal: &Term) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Port {
    Call,
    Exit,
    Redo,
    Fail,
}

impl Resolver {
    pub fn new(occur_check: bool) -> Resolver {
        Resolver {
            subst: Substitution::new(),
            trail: Trail::new(),
            goals: GoalStack::new(),
            choice_points: ChoicePointStack::new(),
            occur_check,
            trace_enabled: false,
            limits: ResourceLimits::default(),
            trace_hook: None,
            started: false,
        }
    }

    /// Installs (or clears, with `None`) the trace callback (spec.md
    /// §6.4). Only consulted while `trace_enabled` is set by `trace/0`.
    pub fn set_trace_hook(&mut self, hook: Option<Box<dyn TraceHook>>) {
        self.trace_hook = hook;
    }

    /// Resets all per-query state (spec.md §4.3.1: "a query resets all
    /// state") and pushes `goal` as the sole initial goal at barrier 0.
    pub fn start_query(&mut self, goal: Term) {
        self.subst = Substitution::new();
        self.trail = Trail::new();
        self.goals = GoalStack::new();
        self.choice_points = ChoicePointStack::new();
        self.started = false;
        self.goals.push_term(goal, 0);
    }

    /// Runs to the next solution. `Ok(true)`: `self.subst` now holds a
    /// solution (callers snapshot the query's own variables out of it).
    /// `Ok(false)`: the search is exhausted. `Err(term)`: an unhandled
    /// exception propagated out of the query (spec.md §7).
    pub fn next_solution(&mut self, db: &Database, registry: &BuiltinRegistry) -> Result<bool, Term> {
        if self.started {
            if !self.backtrack() {
                return Ok(false);
            }
        }
        self.started = true;
        self.prove(db, registry)
    }

    /// The raw pop-dispatch-backtrack loop (spec.md §4.3.2). Shared by
    /// `next_solution` and every meta-predicate that drives a sub-proof.
    #[instrument(level = "debug", skip(self, db, registry))]
    fn prove(&mut self, db: &Database, registry: &BuiltinRegistry) -> Result<bool, Term> {
        loop {
            if self.goals.is_empty() {
                return Ok(true);
            }
            if let Some(max) = self.limits.max_goal_stack {
                if self.goals.len() > max {
                    let e = IsoError::resource_error("goal_stack");
                    match self.catch_throw(e.to_term()) {
                        true => continue,
                        false => return Err(e.to_term()),
                    }
                }
            }
            let goal = self.goals.pop().unwrap();
            match self.dispatch(goal, db, registry) {
                Dispatched::Progress => continue,
                Dispatched::Fail => {
                    if !self.backtrack() {
                        return Ok(false);
                    }
                }
                Dispatched::Thrown(e) => {
                    if self.catch_throw(e.clone()) {
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Backtracking (spec.md §4.3.3).
    fn backtrack(&mut self) -> bool {
        loop {
            let Some(mut cp) = self.choice_points.pop() else {
                return false;
            };
            if !cp.remaining_alternatives.is_empty() {
                let clause = cp.remaining_alternatives.remove(0);
                let has_more = !cp.remaining_alternatives.is_empty();
                self.trail.undo_to(cp.trail_mark, &mut self.subst);
                self.goals.restore(cp.goal_stack_snapshot.clone());
                let goal = cp.goal.clone();
                if has_more {
                    self.choice_points.push_back(cp);
                }
                if self.trace_enabled {
                    if let GoalItem::Term(t) = &goal.item {
                        let t = t.clone();
                        if !self.fire_port(Port::Redo, &t) {
                            self.choice_points.cut_to(0);
                            return false;
                        }
                    }
                }
                let GoalItem::Term(goal_term) = &goal.item else {
                    unreachable!("a clause-alternative choice point always saves a term goal")
                };
                if self.try_clause(&goal_term.clone(), &clause) {
                    return true;
                }
                // Unification failed; loop to the next choice point
                // (possibly this same one again if more alternatives
                // remain — it was already pushed back above).
                continue;
            } else if cp.is_control {
                self.trail.undo_to(cp.trail_mark, &mut self.subst);
                self.goals.restore(cp.goal_stack_snapshot.clone());
                self.goals.push(cp.goal.clone());
                return true;
            } else {
                // Exhausted clause-alternative or catch-frame CP with
                // nothing left to offer: drop and keep backtracking.
                continue;
            }
        }
    }

    /// Tries unifying `goal` against a freshly renamed `clause`; on
    /// success, pushes the renamed body (reversed) at a fresh cut
    /// barrier (spec.md §4.3.2 step 5, §4.3.9).
    fn try_clause(&mut self, goal: &Term, clause: &Arc<Clause>) -> bool {
        let (head, body) = rename::rename_clause(&clause.head, &clause.body);
        if prolog_unify::unify_no_occurs_check(goal, &head, &mut self.subst, &mut self.trail) {
            let barrier = self.choice_points.len();
            for g in body.into_iter().rev() {
                self.goals.push_term(g, barrier);
            }
            true
        } else {
            false
        }
    }

    fn dispatch(&mut self, goal: Goal, db: &Database, registry: &BuiltinRegistry) -> Dispatched {
        match goal.item {
            GoalItem::Marker(m) => self.dispatch_marker(m),
            GoalItem::Term(t) => self.dispatch_term(t, goal.cut_barrier, db, registry),
        }
    }

    fn dispatch_marker(&mut self, marker: Marker) -> Dispatched {
        match marker {
            Marker::IfThenCommit(barrier) | Marker::OnceCommit(barrier) | Marker::IgnoreCommit(barrier) => {
                self.choice_points.cut_to(barrier);
                Dispatched::Progress
            }
            Marker::CatchCleanup(depth) => {
                self.choice_points.disable_catch_frame_at(depth);
                Dispatched::Progress
            }
        }
    }

    /// Traces `Call`/`Exit`/`Fail` around every dispatched goal term
    /// (spec.md §6.4). A simplification versus the classical four-port
    /// box model: `Exit` fires on successful dispatch of the goal
    /// itself rather than after its continuation also succeeds, and
    /// control constructs (`,/2`, `!`, ...) are traced the same as user
    /// predicates rather than being suppressed. `Redo` is fired
    /// separately, from `backtrack`, where a clause retry actually
    /// happens. A hook returning `false` stops the search for this
    /// query by cutting all choice points, rather than raising a
    /// catchable exception (an abort is not a Prolog error term).
    fn dispatch_term(&mut self, term: Term, barrier: usize, db: &Database, registry: &BuiltinRegistry) -> Dispatched {
        let term = self.subst.deref(&term);
        if self.trace_enabled {
            if !self.fire_port(Port::Call, &term) {
                self.choice_points.cut_to(0);
                return Dispatched::Fail;
            }
        }
        let outcome = self.dispatch_term_inner(term.clone(), barrier, db, registry);
        if self.trace_enabled {
            let port = match &outcome {
                Dispatched::Progress => Port::Exit,
                Dispatched::Fail | Dispatched::Thrown(_) => Port::Fail,
            };
            if !self.fire_port(port, &term) {
                self.choice_points.cut_to(0);
                return Dispatched::Fail;
            }
        }
        outcome
    }

    fn fire_port(&mut self, port: Port, goal: &Term) -> bool {
        match self.trace_hook.as_mut() {
            Some(hook) => hook.port(port, self.goals.len(), goal),
            None => true,
        }
    }

    #[instrument(level = "trace", skip(self, db, registry), fields(goal = ?term))]
    fn dispatch_term_inner(&mut self, term: Term, barrier: usize, db: &Database, registry: &BuiltinRegistry) -> Dispatched {
        let ind = match term.indicator() {
            Some(ind) => ind,
            None => {
                // A variable (or, impossible per the term grammar, a
                // bare number) popped as a goal.
                return self.throw_builtin(IsoError::instantiation());
            }
        };
        let name = ind.name.as_str();
        let name = name.as_ref();

        match (name, ind.arity) {
            ("true", 0) => Dispatched::Progress,
            ("fail", 0) | ("false", 0) => Dispatched::Fail,
            ("!", 0) => {
                self.choice_points.cut_to(barrier);
                Dispatched::Progress
            }
            ("=", 2) => self.dispatch_unify(&term),
            (",", 2) => self.dispatch_conjunction(&term, barrier),
            (";", 2) => self.dispatch_disjunction(&term, barrier),
            ("->", 2) => self.dispatch_if_then(&term, barrier),
            ("\\+", 1) => self.dispatch_negation(&term, db, registry),
            ("call", 1) => self.dispatch_call(&term),
            ("once", 1) => self.dispatch_once(&term),
            ("ignore", 1) => self.dispatch_ignore(&term),
            ("repeat", 0) => {
                self.choice_points.push_control(
                    Goal::term(Term::atom("repeat"), barrier),
                    self.trail.mark(),
                    self.goals.snapshot(),
                    false,
                );
                Dispatched::Progress
            }
            ("trace", 0) => {
                self.trace_enabled = true;
                Dispatched::Progress
            }
            ("notrace", 0) => {
                self.trace_enabled = false;
                Dispatched::Progress
            }
            ("findall", 3) => self.dispatch_findall(&term, db, registry),
            ("bagof", 3) => self.dispatch_bagof_setof(&term, db, registry, false),
            ("setof", 3) => self.dispatch_bagof_setof(&term, db, registry, true),
            ("catch", 3) => self.dispatch_catch(&term, barrier),
            ("throw", 1) => self.dispatch_throw(&term),
            ("phrase", 2) => self.dispatch_phrase(&term, barrier, 2),
            ("phrase", 3) => self.dispatch_phrase(&term, barrier, 3),

            _ => {
                if let Some(builtin) = registry.lookup(ind.name, ind.arity) {
                    self.run_builtin(&term, &builtin, db, registry)
                } else {
                    self.dispatch_clause_resolution(&term, db)
                }
            }
        }
    }

    fn args(term: &Term) -> &[Term] {
        match term {
            Term::Compound(c) => &c.args,
            _ => &[],
        }
    }

    fn throw_builtin(&mut self, e: IsoError) -> Dispatched {
        Dispatched::Thrown(e.to_term())
    }

    fn dispatch_unify(&mut self, term: &Term) -> Dispatched {
        let a = &Self::args(term)[0];
        let b = &Self::args(term)[1];
        if prolog_unify::unify_no_occurs_check(a, b, &mut self.subst, &mut self.trail) {
            Dispatched::Progress
        } else {
            Dispatched::Fail
        }
    }

    /// `,/2`: push right then left (spec.md §4.3.5), both inheriting
    /// the parent's own cut barrier — conjunction is transparent to cut.
    fn dispatch_conjunction(&mut self, term: &Term, barrier: usize) -> Dispatched {
        let args = Self::args(term);
        self.goals.push_term(args[1].clone(), barrier);
        self.goals.push_term(args[0].clone(), barrier);
        Dispatched::Progress
    }

    /// `;/2` simple disjunction (spec.md §4.3.5), or `(Cond->Then;Else)`
    /// when the left argument is itself `->/2`.
    fn dispatch_disjunction(&mut self, term: &Term, barrier: usize) -> Dispatched {
        let args = Self::args(term);
        let left = self.subst.deref(&args[0]);
        if let Some(ind) = left.indicator() {
            if ind.name.as_str().as_ref() == "->" && ind.arity == 2 {
                return self.dispatch_if_then_else(&left, &args[1], barrier);
            }
        }
        self.choice_points.push_control(
            Goal::term(args[1].clone(), barrier),
            self.trail.mark(),
            self.goals.snapshot(),
            true,
        );
        self.goals.push_term(args[0].clone(), barrier);
        Dispatched::Progress
    }

    fn dispatch_if_then_else(&mut self, cond_then: &Term, else_branch: &Term, barrier: usize) -> Dispatched {
        let args = Self::args(cond_then);
        let cond = args[0].clone();
        let then = args[1].clone();
        let commit_barrier = self.choice_points.len();
        self.choice_points.push_control(
            Goal::term(else_branch.clone(), barrier),
            self.trail.mark(),
            self.goals.snapshot(),
            false,
        );
        self.goals.push_term(then, barrier);
        self.goals.push(Goal::marker(Marker::IfThenCommit(commit_barrier)));
        self.goals.push_term(cond, commit_barrier);
        Dispatched::Progress
    }

    /// Bare `->/2` (no else): on `Cond` failure there is no fallback, so
    /// overall failure (spec.md §4.3.5).
    fn dispatch_if_then(&mut self, term: &Term, barrier: usize) -> Dispatched {
        let args = Self::args(term);
        let cond = args[0].clone();
        let then = args[1].clone();
        let commit_barrier = self.choice_points.len();
        self.goals.push_term(then, barrier);
        self.goals.push(Goal::marker(Marker::IfThenCommit(commit_barrier)));
        self.goals.push_term(cond, commit_barrier);
        Dispatched::Progress
    }

    /// `\+/1` (spec.md §4.3.5): run to first solution in isolation,
    /// restore unconditionally, succeed iff the sub-proof failed.
    fn dispatch_negation(&mut self, term: &Term, db: &Database, registry: &BuiltinRegistry) -> Dispatched {
        let goal = Self::args(term)[0].clone();
        match self.isolated_proof(goal, db, registry) {
            Ok(found) => {
                if found {
                    Dispatched::Fail
                } else {
                    Dispatched::Progress
                }
            }
            Err(e) => Dispatched::Thrown(e),
        }
    }

    /// Runs `goal` to its first solution in a fresh goal/choice-point
    /// stack, then unconditionally restores the caller's stacks and
    /// trail position. Shared by `\+/1`.
    fn isolated_proof(&mut self, goal: Term, db: &Database, registry: &BuiltinRegistry) -> Result<bool, Term> {
        let saved_goals = self.goals.snapshot();
        let saved_cps = std::mem::replace(&mut self.choice_points, ChoicePointStack::new());
        let mark = self.trail.mark();

        self.goals = GoalStack::new();
        let barrier = 0;
        self.goals.push_term(goal, barrier);

        let result = self.prove(db, registry);

        self.goals.restore(saved_goals);
        self.choice_points = saved_cps;
        self.trail.undo_to(mark, &mut self.subst);
        result
    }

    fn dispatch_call(&mut self, term: &Term) -> Dispatched {
        let arg = self.subst.deref(&Self::args(term)[0]);
        if arg.is_variable() {
            return self.throw_builtin(IsoError::instantiation());
        }
        if !arg.is_callable() {
            return self.throw_builtin(IsoError::type_error("callable", arg));
        }
        let barrier = self.choice_points.len();
        self.goals.push_term(arg, barrier);
        Dispatched::Progress
    }

    fn dispatch_once(&mut self, term: &Term) -> Dispatched {
        let goal = Self::args(term)[0].clone();
        let barrier = self.choice_points.len();
        self.goals.push(Goal::marker(Marker::OnceCommit(barrier)));
        self.goals.push_term(goal, barrier);
        Dispatched::Progress
    }

    fn dispatch_ignore(&mut self, term: &Term) -> Dispatched {
        let goal = Self::args(term)[0].clone();
        let barrier_before_fallback = self.choice_points.len();
        self.choice_points.push_control(
            Goal::term(Term::atom("true"), barrier_before_fallback),
            self.trail.mark(),
            self.goals.snapshot(),
            false,
        );
        let barrier = self.choice_points.len();
        self.goals.push(Goal::marker(Marker::IgnoreCommit(barrier_before_fallback)));
        self.goals.push_term(goal, barrier);
        Dispatched::Progress
    }

    fn dispatch_catch(&mut self, term: &Term, barrier: usize) -> Dispatched {
        let args = Self::args(term);
        let goal = args[0].clone();
        let catcher = args[1].clone();
        let recovery = args[2].clone();

        let depth = self.choice_points.len();
        self.choice_points.push_catch(
            // The frame's own CP is never actually used as a "goal to
            // push on backtrack" alternative — plain backtracking drops
            // a catch frame (§4.3.3 step 4) — so its `goal` slot is a
            // harmless placeholder.
            Goal::term(Term::atom("true"), barrier),
            self.trail.mark(),
            self.goals.snapshot(),
            CatchFrame {
                catcher_pattern: catcher,
                recovery_goal: recovery,
                cut_barrier: barrier,
            },
        );
        let inner_barrier = self.choice_points.len();
        self.goals.push(Goal::marker(Marker::CatchCleanup(depth)));
        self.goals.push_term(goal, inner_barrier);
        Dispatched::Progress
    }

    fn dispatch_throw(&mut self, term: &Term) -> Dispatched {
        let e = self.subst.apply(&Self::args(term)[0]);
        if e.is_variable() {
            return self.throw_builtin(IsoError::instantiation());
        }
        Dispatched::Thrown(e)
    }

    /// `throw/1`'s propagation (spec.md §4.3.7): pop to the nearest live
    /// catch frame, try its catcher pattern, retry further out on
    /// mismatch. Returns `true` iff a handler was installed (the
    /// recovery goal is now on the goal stack and proving should
    /// continue); `false` means the exception is unhandled.
    #[instrument(level = "debug", skip(self), fields(exception = ?thrown))]
    fn catch_throw(&mut self, thrown: Term) -> bool {
        loop {
            let Some(cp) = self.choice_points.pop_to_nearest_catch() else {
                debug!("exception unhandled, propagating to embedder");
                return false;
            };
            let frame = cp.catch_frame.expect("pop_to_nearest_catch only returns catch frames");
            self.trail.undo_to(cp.trail_mark, &mut self.subst);
            self.goals.restore(cp.goal_stack_snapshot);
            let attempt_mark = self.trail.mark();
            if prolog_unify::unify_no_occurs_check(&thrown, &frame.catcher_pattern, &mut self.subst, &mut self.trail) {
                trace!("exception caught");
                self.goals.push_term(frame.recovery_goal, frame.cut_barrier);
                return true;
            }
            self.trail.undo_to(attempt_mark, &mut self.subst);
        }
    }

    /// `phrase/2` and `phrase/3` (spec.md §4.4): resolver-level sugar
    /// expanding to the DCG-threaded call.
    fn dispatch_phrase(&mut self, term: &Term, barrier: usize, arity: usize) -> Dispatched {
        let args = Self::args(term);
        let body = self.subst.deref(&args[0]);
        if body.is_variable() {
            return self.throw_builtin(IsoError::instantiation());
        }
        let (s_in, s_out) = if arity == 2 {
            (args[1].clone(), Term::nil())
        } else {
            (args[1].clone(), args[2].clone())
        };
        let extended = match &body {
            Term::Atom(a) => Term::compound_atom(*a, vec![s_in, s_out]),
            Term::Compound(c) => {
                let mut new_args = c.args.clone();
                new_args.push(s_in);
                new_args.push(s_out);
                Term::compound_atom(c.functor, new_args)
            }
            _ => return self.throw_builtin(IsoError::type_error("callable", body)),
        };
        self.goals.push_term(extended, barrier);
        Dispatched::Progress
    }

    /// `findall/3` (spec.md §4.3.6): drive `Goal` to exhaustion in
    /// isolation, collecting `apply(Template)` for each solution.
    fn dispatch_findall(&mut self, term: &Term, db: &Database, registry: &BuiltinRegistry) -> Dispatched {
        let args = Self::args(term);
        let template = args[0].clone();
        let goal = args[1].clone();
        let list_out = args[2].clone();

        match self.drive_to_exhaustion(goal, &template, db, registry) {
            Ok(instances) => {
                let list = Term::proper_list(instances);
                if prolog_unify::unify_no_occurs_check(&list_out, &list, &mut self.subst, &mut self.trail) {
                    Dispatched::Progress
                } else {
                    Dispatched::Fail
                }
            }
            Err(e) => Dispatched::Thrown(e),
        }
    }

    /// Runs `goal` to exhaustion in an isolated goal/choice-point stack,
    /// applying `template` against the live substitution at each
    /// solution (before anything is restored) so the caller receives
    /// plain, self-contained terms rather than a substitution that
    /// would otherwise need to outlive the isolated proof. Always
    /// restores the caller's own state, even on an unhandled exception.
    fn drive_to_exhaustion(
        &mut self,
        goal: Term,
        template: &Term,
        db: &Database,
        registry: &BuiltinRegistry,
    ) -> Result<Vec<Term>, Term> {
        let saved_goals = self.goals.snapshot();
        let saved_cps = std::mem::replace(&mut self.choice_points, ChoicePointStack::new());
        let mark = self.trail.mark();

        self.goals = GoalStack::new();
        self.goals.push_term(goal, 0);

        let mut instances = Vec::new();
        let mut need_backtrack = false;
        let outcome: Result<(), Term> = loop {
            if need_backtrack && !self.backtrack() {
                break Ok(());
            }
            need_backtrack = true;
            match self.prove(db, registry) {
                Ok(true) => instances.push(self.subst.apply(template)),
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.goals.restore(saved_goals);
        self.choice_points = saved_cps;
        self.trail.undo_to(mark, &mut self.subst);

        outcome.map(|()| instances)
    }

    fn dispatch_bagof_setof(
        &mut self,
        term: &Term,
        db: &Database,
        registry: &BuiltinRegistry,
        is_setof: bool,
    ) -> Dispatched {
        let args = Self::args(term);
        let template = args[0].clone();
        let raw_goal = args[1].clone();
        let list_out = args[2].clone();

        let (free_vars, inner_goal) = Self::strip_existentials_and_free_vars(&self.subst, &raw_goal, &template);

        let witness_template = Term::proper_list(free_vars.iter().map(|v| Term::Var(v.clone())).collect());
        let paired_template = Term::compound("-", vec![witness_template.clone(), template.clone()]);

        match self.drive_to_exhaustion_pairs(inner_goal, &paired_template, db, registry) {
            Ok(pairs) => {
                if pairs.is_empty() {
                    return Dispatched::Fail;
                }
                // Witness groups are emitted in standard order of the
                // witness tuple, not insertion order: sorting the pairs
                // up front before grouping adjacent equal witnesses
                // gives exactly this for free. (spec.md §8's worked
                // example groups `age/2` facts asserted in the order
                // tom, bob, ann — witnesses 30, 30, 25 by first
                // occurrence — but expects `A = 25` enumerated before
                // `A = 30`, which only the sorted-witness reading
                // produces; see DESIGN.md.)
                let mut sortable = pairs;
                sortable.sort_by(|(wa, _), (wb, _)| prolog_ir::order::compare(wa, wb));

                let mut groups: Vec<(Term, Vec<Term>)> = Vec::new();
                for (witness, value) in sortable {
                    match groups.last_mut() {
                        Some((w, values)) if prolog_ir::order::term_eq(w, &witness) => values.push(value),
                        _ => groups.push((witness, vec![value])),
                    }
                }

                let mut alternatives: Vec<(Term, Vec<Term>)> = groups;
                let (first_witness, mut first_values) = alternatives.remove(0);
                if is_setof {
                    first_values = prolog_ir::order::sort_dedup(first_values);
                }

                if !alternatives.is_empty() {
                    // Push the remaining witness groups as control
                    // choice points in standard order, so backtracking
                    // enumerates them left-to-right (spec.md §4.3.6
                    // step 5).
                    for (witness, mut values) in alternatives.into_iter().rev() {
                        if is_setof {
                            values = prolog_ir::order::sort_dedup(values);
                        }
                        let alt_goal = Self::bind_group_goal(&witness_template, &witness, &list_out, values);
                        self.choice_points.push_control(
                            Goal::term(alt_goal, 0),
                            self.trail.mark(),
                            self.goals.snapshot(),
                            false,
                        );
                    }
                }

                let first_goal = Self::bind_group_goal(&witness_template, &first_witness, &list_out, first_values);
                let barrier = self.choice_points.len();
                self.goals.push_term(first_goal, barrier);
                Dispatched::Progress
            }
            Err(e) => Dispatched::Thrown(e),
        }
    }

    fn bind_group_goal(witness_template: &Term, witness: &Term, list_out: &Term, values: Vec<Term>) -> Term {
        Term::compound(
            ",",
            vec![
                Term::compound("=", vec![witness_template.clone(), witness.clone()]),
                Term::compound("=", vec![list_out.clone(), Term::proper_list(values)]),
            ],
        )
    }

    /// Strips leading `V^Goal` existential quantifiers (spec.md §4.3.6
    /// step 1), then computes the free variables (variables of the
    /// inner goal minus the template's own minus the existentials,
    /// spec.md §4.3.6 step 2), ordered by first occurrence.
    fn strip_existentials_and_free_vars(
        subst: &Substitution,
        goal: &Term,
        template: &Term,
    ) -> (Vec<prolog_ir::term::Variable>, Term) {
        let mut existential_ids = rustc_hash::FxHashSet::default();
        let mut cur = subst.deref(goal);
        loop {
            match &cur {
                Term::Compound(c) if c.functor.as_str().as_ref() == "^" && c.args.len() == 2 => {
                    for v in c.args[0].variables() {
                        existential_ids.insert(v.id);
                    }
                    cur = subst.deref(&c.args[1]);
                }
                _ => break,
            }
        }

        let template_ids: rustc_hash::FxHashSet<u64> = template.variables().into_iter().map(|v| v.id).collect();
        let mut free = Vec::new();
        let mut seen = rustc_hash::FxHashSet::default();
        for v in cur.variables() {
            if !template_ids.contains(&v.id) && !existential_ids.contains(&v.id) && seen.insert(v.id) {
                free.push(v);
            }
        }
        (free, cur)
    }

    /// Like `drive_to_exhaustion`, but applies `paired_template`
    /// (`Witness - Template`) against each solution immediately (inside
    /// the isolated sub-proof, before state is restored) so the caller
    /// never needs to hold onto a `Substitution` snapshot.
    fn drive_to_exhaustion_pairs(
        &mut self,
        goal: Term,
        paired_template: &Term,
        db: &Database,
        registry: &BuiltinRegistry,
    ) -> Result<Vec<(Term, Term)>, Term> {
        let saved_goals = self.goals.snapshot();
        let saved_cps = std::mem::replace(&mut self.choice_points, ChoicePointStack::new());
        let mark = self.trail.mark();

        self.goals = GoalStack::new();
        self.goals.push_term(goal, 0);

        let mut pairs = Vec::new();
        let mut need_backtrack = false;
        let outcome: Result<(), Term> = loop {
            if need_backtrack && !self.backtrack() {
                break Ok(());
            }
            need_backtrack = true;
            match self.prove(db, registry) {
                Ok(true) => {
                    let applied = self.subst.apply(paired_template);
                    if let Term::Compound(c) = &applied {
                        if c.args.len() == 2 {
                            pairs.push((c.args[0].clone(), c.args[1].clone()));
                        }
                    }
                }
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.goals.restore(saved_goals);
        self.choice_points = saved_cps;
        self.trail.undo_to(mark, &mut self.subst);

        outcome.map(|()| pairs)
    }

    fn run_builtin(
        &mut self,
        term: &Term,
        builtin: &Arc<crate::builtin::BuiltinFn>,
        _db: &Database,
        _registry: &BuiltinRegistry,
    ) -> Dispatched {
        let args: Vec<Term> = Self::args(term).iter().map(|a| self.subst.deref(a)).collect();
        let mut ctx = BuiltinContext {
            subst: &mut self.subst,
            trail: &mut self.trail,
            args,
        };
        match builtin(&mut ctx) {
            Outcome::Success => Dispatched::Progress,
            Outcome::Failure => Dispatched::Fail,
            Outcome::NotFound => self.dispatch_clause_resolution(term, _db),
            Outcome::Error(e) => Dispatched::Thrown(e.to_term()),
        }
    }

    /// Clause resolution (spec.md §4.3.2 step 5). Tries candidates
    /// locally (undoing the trail itself between attempts) rather than
    /// delegating failed attempts to `backtrack()`, which must stay
    /// reserved for popping the *choice-point stack* — calling it here
    /// on a head-unification failure with no local alternatives left
    /// would pop an unrelated, older choice point and double up the
    /// single backtrack `prove()`'s own loop already performs for a
    /// `Dispatched::Fail`.
    fn dispatch_clause_resolution(&mut self, term: &Term, db: &Database) -> Dispatched {
        if term.is_variable() {
            return self.throw_builtin(IsoError::instantiation());
        }
        if !term.is_callable() {
            return self.throw_builtin(IsoError::type_error("callable", term.clone()));
        }

        let mut candidates = db.retrieve(term);
        if candidates.is_empty() {
            return Dispatched::Fail;
        }
        if let Some(max) = self.limits.max_choice_points {
            if self.choice_points.len() >= max && candidates.len() > 1 {
                return self.throw_builtin(IsoError::resource_error("choice_points"));
            }
        }

        let mark = self.trail.mark();
        let goal_stack_snapshot = self.goals.snapshot();

        loop {
            if candidates.is_empty() {
                return Dispatched::Fail;
            }
            let clause = candidates.remove(0);
            if self.try_clause(term, &clause) {
                if !candidates.is_empty() {
                    self.choice_points.push_clause_alternatives(
                        Goal::term(term.clone(), 0),
                        candidates,
                        mark,
                        goal_stack_snapshot,
                    );
                }
                return Dispatched::Progress;
            }
            self.trail.undo_to(mark, &mut self.subst);
        }
    }
}

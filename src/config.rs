//! Engine configuration (SPEC_FULL.md §2), mirroring the
//! builder-of-solving-strategy shape `chalk-solve`'s `SolverChoice`
//! gives its own solver (overflow depth, recursive-vs-SLG choice) —
//! here, occur-check default and the resource guards of spec.md §9/
//! SPEC_FULL.md §3.

use prolog_resolve::ResourceLimits;

/// Construction-time choices for an `Engine` (spec.md §9 Open
/// Questions; SPEC_FULL.md §3 resource guard). See `DESIGN.md` for why
/// each default was picked.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Default occur-check mode for plain `=/2` and clause-head
    /// unification. `unify_with_occurs_check/2` always applies the
    /// occur-check regardless of this setting (spec.md §4.3.8).
    pub occur_check: bool,
    pub limits: ResourceLimits,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            occur_check: false,
            limits: ResourceLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> EngineConfig {
        EngineConfig::default()
    }

    pub fn with_occur_check(mut self, occur_check: bool) -> EngineConfig {
        self.occur_check = occur_check;
        self
    }

    pub fn with_max_choice_points(mut self, max: usize) -> EngineConfig {
        self.limits.max_choice_points = Some(max);
        self
    }

    pub fn with_max_goal_stack(mut self, max: usize) -> EngineConfig {
        self.limits.max_goal_stack = Some(max);
        self
    }
}

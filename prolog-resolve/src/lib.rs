//! SLD resolution: goal stack, choice points, cut, control constructs,
//! meta-predicates, catch/throw, and the small set of builtins the
//! resolver itself needs to be useful standalone (term inspection and
//! comparison). See `DESIGN.md` for the full grounding ledger.

pub mod builtin;
pub mod builtins_core;
pub mod choice;
pub mod error;
pub mod goal;
pub mod rename;
pub mod resolver;

pub use builtin::{BuiltinContext, BuiltinRegistry, Outcome};
pub use choice::{CatchFrame, ChoicePoint, ChoicePointStack};
pub use error::{IsoError, IsoErrorKind};
pub use goal::{Goal, GoalItem, GoalStack, Marker};
pub use resolver::{Port, ResourceLimits, Resolver, TraceHook};

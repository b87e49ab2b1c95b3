//! The term type (spec.md §3.1).
//!
//! Terms are immutable value objects; structural sharing is achieved via
//! `Arc` on the compound's argument vector, following the teacher's use
//! of `Arc` for shared, immutable IR nodes (`chalk_ir::Environment`,
//! `InEnvironment`). Variables are compared and hashed by id only — the
//! cosmetic `name` never participates in equality (spec.md §3.1).

use crate::atom::{Atom, DOT, NIL};
use num_bigint::BigInt;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A logic variable. Identity is the id; `name` is a cosmetic hint used
/// only when rendering terms back to the embedder or a trace callback.
#[derive(Clone)]
pub struct Variable {
    pub id: u64,
    pub name: Option<Atom>,
}

impl Variable {
    pub fn fresh() -> Variable {
        Variable {
            id: next_var_id(),
            name: None,
        }
    }

    pub fn fresh_named(name: Atom) -> Variable {
        Variable {
            id: next_var_id(),
            name: Some(name),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(n) => write!(f, "_{}{}", n, self.id),
            None => write!(f, "_G{}", self.id),
        }
    }
}

static VAR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Monotonic, process-wide variable id allocator. Query boundaries do
/// not reset this in this implementation: spec.md §5 only *suggests*
/// resetting at query boundaries, and a monotonic counter is simpler to
/// reason about for embedders holding multiple concurrently-live
/// engines (no risk of id collision between engines sharing the atom
/// pool's process-wide scope).
pub fn next_var_id() -> u64 {
    VAR_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A functor application: functor + ordered, non-empty argument tuple.
/// Zero-arity "compounds" are forbidden by construction — use `Term::Atom`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Compound {
    pub functor: Atom,
    pub args: Vec<Term>,
}

impl Compound {
    pub fn indicator(&self) -> Indicator {
        Indicator {
            name: self.functor,
            arity: self.args.len(),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Indicator {
    pub name: Atom,
    pub arity: usize,
}

impl fmt::Debug for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Var(Variable),
    Atom(Atom),
    Int(BigInt),
    Float(OrderedFloat),
    Compound(Arc<Compound>),
}

/// A thin wrapper giving `f64` a total `Eq`/`Hash` (NaN never appears:
/// the external parser is the only producer of float literals and ISO
/// syntax has no NaN literal; arithmetic builtins that could produce one
/// are out of this core's scope per spec.md §1).
#[derive(Clone, Copy, Debug)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}
impl Eq for OrderedFloat {}
impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state)
    }
}

impl Term {
    pub fn var(v: Variable) -> Term {
        Term::Var(v)
    }

    pub fn fresh_var() -> Term {
        Term::Var(Variable::fresh())
    }

    pub fn atom(name: &str) -> Term {
        Term::Atom(Atom::intern(name))
    }

    pub fn int(i: i64) -> Term {
        Term::Int(BigInt::from(i))
    }

    pub fn float(f: f64) -> Term {
        Term::Float(OrderedFloat(f))
    }

    pub fn compound(functor: &str, args: Vec<Term>) -> Term {
        assert!(!args.is_empty(), "zero-arity compound; use Term::atom");
        Term::Compound(Arc::new(Compound {
            functor: Atom::intern(functor),
            args,
        }))
    }

    pub fn compound_atom(functor: Atom, args: Vec<Term>) -> Term {
        assert!(!args.is_empty(), "zero-arity compound; use Term::Atom");
        Term::Compound(Arc::new(Compound { functor, args }))
    }

    pub fn nil() -> Term {
        Term::Atom(*NIL)
    }

    pub fn cons(head: Term, tail: Term) -> Term {
        Term::Compound(Arc::new(Compound {
            functor: *DOT,
            args: vec![head, tail],
        }))
    }

    /// Builds a proper list `[e0, e1, ..., en | tail]`.
    pub fn list(elements: Vec<Term>, tail: Term) -> Term {
        elements
            .into_iter()
            .rev()
            .fold(tail, |acc, e| Term::cons(e, acc))
    }

    pub fn proper_list(elements: Vec<Term>) -> Term {
        Term::list(elements, Term::nil())
    }

    pub fn indicator(&self) -> Option<Indicator> {
        match self {
            Term::Atom(a) => Some(Indicator { name: *a, arity: 0 }),
            Term::Compound(c) => Some(c.indicator()),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Term::Atom(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Term::Int(_) | Term::Float(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Term::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Term::Float(_))
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Term::Compound(_))
    }

    pub fn is_atomic(&self) -> bool {
        self.is_atom() || self.is_number()
    }

    pub fn is_callable(&self) -> bool {
        self.is_atom() || self.is_compound()
    }

    /// Walks the `.`/2 spine; `true` only for a chain ending in `[]`
    /// with no unbound variable along the way (spec.md §3.1).
    pub fn is_list(&self) -> bool {
        let mut cur = self;
        loop {
            match cur {
                Term::Atom(a) if *a == *NIL => return true,
                Term::Compound(c) if c.functor == *DOT && c.args.len() == 2 => {
                    cur = &c.args[1];
                }
                _ => return false,
            }
        }
    }

    /// `true` iff no variable is reachable from this term, independent
    /// of any substitution (spec.md §3.1) — this is a *syntactic* check;
    /// callers that need groundness under a substitution must `apply`
    /// first.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Atom(_) | Term::Int(_) | Term::Float(_) => true,
            Term::Compound(c) => c.args.iter().all(Term::is_ground),
        }
    }

    /// Collects the distinct variables reachable from this term, in
    /// first-occurrence order.
    pub fn variables(&self) -> Vec<Variable> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut out = Vec::new();
        self.collect_variables(&mut seen, &mut out);
        out
    }

    fn collect_variables(&self, seen: &mut rustc_hash::FxHashSet<u64>, out: &mut Vec<Variable>) {
        match self {
            Term::Var(v) => {
                if seen.insert(v.id) {
                    out.push(v.clone());
                }
            }
            Term::Compound(c) => {
                for a in &c.args {
                    a.collect_variables(seen, out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{:?}", v),
            Term::Atom(a) => write!(f, "{}", a),
            Term::Int(i) => write!(f, "{}", i),
            Term::Float(x) => write!(f, "{}", x.0),
            Term::Compound(c) if c.functor == *DOT && c.args.len() == 2 => {
                write!(f, "[")?;
                let mut cur: &Term = self;
                let mut first = true;
                loop {
                    match cur {
                        Term::Compound(c) if c.functor == *DOT && c.args.len() == 2 => {
                            if !first {
                                write!(f, ",")?;
                            }
                            first = false;
                            write!(f, "{:?}", c.args[0])?;
                            cur = &c.args[1];
                        }
                        Term::Atom(a) if *a == *NIL => break,
                        other => {
                            write!(f, "|{:?}", other)?;
                            break;
                        }
                    }
                }
                write!(f, "]")
            }
            Term::Compound(c) => {
                write!(f, "{}(", c.functor)?;
                for (i, a) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{:?}", a)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_predicates() {
        let t = Term::compound("f", vec![Term::int(1), Term::atom("a")]);
        assert!(t.is_compound());
        assert!(t.is_callable());
        assert!(!t.is_atomic());
        assert!(t.is_ground());
    }

    #[test]
    fn lists_walk_the_dot_spine() {
        let l = Term::proper_list(vec![Term::int(1), Term::int(2)]);
        assert!(l.is_list());
        let improper = Term::cons(Term::int(1), Term::fresh_var());
        assert!(!improper.is_list());
    }

    #[test]
    fn ground_detects_variables() {
        let v = Term::fresh_var();
        let t = Term::compound("f", vec![v.clone()]);
        assert!(!t.is_ground());
        assert_eq!(t.variables().len(), 1);
    }

    #[test]
    fn variable_equality_is_by_id_not_name() {
        let a = Variable::fresh();
        let b = Variable::fresh();
        assert_ne!(Term::Var(a.clone()), Term::Var(b));
        assert_eq!(Term::Var(a.clone()), Term::Var(a));
    }
}

//! Process-wide atom interning.
//!
//! Two atoms with equal strings must be the same object (spec.md §3.1).
//! The pool is a single process-wide table (spec.md §5): readers of an
//! already-interned atom pay nothing, writers (interning a brand new
//! string) take a write lock. This mirrors the teacher's `Identifier =
//! InternedString` choice (`chalk-ir/src/lib.rs`) of interning symbolic
//! names rather than comparing `String`s everywhere, generalized to our
//! own table since `lalrpop_intern`'s table is not documented safe for
//! concurrent writers across independent engines.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

struct AtomTable {
    strings: Vec<Arc<str>>,
    ids: FxHashMap<Arc<str>, u32>,
}

impl AtomTable {
    fn new() -> Self {
        AtomTable {
            strings: Vec::new(),
            ids: FxHashMap::default(),
        }
    }

    fn intern(&mut self, s: &str) -> u32 {
        if let Some(id) = self.ids.get(s) {
            return *id;
        }
        let arc: Arc<str> = Arc::from(s);
        let id = self.strings.len() as u32;
        self.strings.push(arc.clone());
        self.ids.insert(arc, id);
        id
    }

    fn name(&self, id: u32) -> Arc<str> {
        self.strings[id as usize].clone()
    }
}

static TABLE: Lazy<RwLock<AtomTable>> = Lazy::new(|| RwLock::new(AtomTable::new()));

/// An interned symbolic constant. Equality and hashing are by interned
/// id, never by string comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    pub fn intern(s: &str) -> Atom {
        // Fast path: most lookups are of already-interned atoms (the
        // distinguished atoms, predicate functors seen before). Only
        // take the write lock when the string is genuinely new.
        if let Some(id) = TABLE.read().unwrap().ids.get(s) {
            return Atom(*id);
        }
        Atom(TABLE.write().unwrap().intern(s))
    }

    pub fn as_str(self) -> Arc<str> {
        TABLE.read().unwrap().name(self.0)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

macro_rules! distinguished_atoms {
    ($($const_name:ident => $text:expr),* $(,)?) => {
        $(
            pub static $const_name: Lazy<Atom> = Lazy::new(|| Atom::intern($text));
        )*
    };
}

distinguished_atoms! {
    NIL => "[]",
    CUT => "!",
    DOT => ".",
    TRUE => "true",
    FALSE => "false",
    FAIL => "fail",
    EMPTY_CURLY => "{}",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_intern_to_the_same_atom() {
        let a = Atom::intern("parent");
        let b = Atom::intern("parent");
        assert_eq!(a, b);
        assert_eq!(a.as_str().as_ref(), "parent");
    }

    #[test]
    fn distinguished_atoms_are_stable() {
        assert_eq!(NIL.as_str().as_ref(), "[]");
        assert_eq!(CUT.as_str().as_ref(), "!");
        assert_eq!(DOT.as_str().as_ref(), ".");
    }

    #[test]
    fn different_strings_intern_to_different_atoms() {
        let a = Atom::intern("foo");
        let b = Atom::intern("bar");
        assert_ne!(a, b);
    }
}

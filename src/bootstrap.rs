//! `member/2` and `append/3`, asserted as ordinary clauses rather than
//! registered as builtins (see `DESIGN.md`'s "Notable implementation
//! decisions" entry): both are multi-solution via plain backtracking
//! over a recursive clause, so writing them as clauses exercises the
//! same resolver path user-asserted predicates do, the way the teacher
//! prefers expressing its own lowering rules as ordinary
//! `program_clauses` rather than special-casing them in `RustIrDatabase`.

use prolog_db::{Clause, Database};
use prolog_ir::term::Term;

/// Asserts the textbook definitions of `member/2` and `append/3` into
/// `db`. Called once by `Engine::new`.
pub fn install(db: &mut Database) {
    // member(X, [X|_]).
    {
        let x = Term::fresh_var();
        let tail = Term::fresh_var();
        let head = Term::compound("member", vec![x.clone(), Term::cons(x, tail)]);
        db.assertz(Clause::fact(head));
    }
    // member(X, [_|T]) :- member(X, T).
    {
        let x = Term::fresh_var();
        let h = Term::fresh_var();
        let t = Term::fresh_var();
        let head = Term::compound("member", vec![x.clone(), Term::cons(h, t.clone())]);
        let body = vec![Term::compound("member", vec![x, t])];
        db.assertz(Clause::new(head, body));
    }
    // append([], L, L).
    {
        let l = Term::fresh_var();
        let head = Term::compound("append", vec![Term::nil(), l.clone(), l]);
        db.assertz(Clause::fact(head));
    }
    // append([H|T], L, [H|R]) :- append(T, L, R).
    {
        let h = Term::fresh_var();
        let t = Term::fresh_var();
        let l = Term::fresh_var();
        let r = Term::fresh_var();
        let head = Term::compound(
            "append",
            vec![
                Term::cons(h.clone(), t.clone()),
                l.clone(),
                Term::cons(h, r.clone()),
            ],
        );
        let body = vec![Term::compound("append", vec![t, l, r])];
        db.assertz(Clause::new(head, body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_and_append_are_present_after_install() {
        let mut db = Database::new();
        install(&mut db);
        let goal = Term::compound("member", vec![Term::fresh_var(), Term::fresh_var()]);
        assert_eq!(db.retrieve(&goal).len(), 2);
        let goal = Term::compound("append", vec![Term::fresh_var(), Term::fresh_var(), Term::fresh_var()]);
        assert_eq!(db.retrieve(&goal).len(), 2);
    }
}

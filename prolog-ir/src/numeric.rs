//! Small numeric helpers shared by the standard-order comparator.
//!
//! Exact arbitrary-precision vs. float comparison (needed for a fully
//! conformant `=:=`/`<` between a huge integer and a float) belongs to
//! the arithmetic evaluator, which spec.md §1/§2 places out of this
//! core's scope as an external pluggable leaf. The standard order of
//! terms (spec.md §4.6) only needs *a* total, consistent ordering
//! between numbers, so this compares via lossy `f64` conversion; for
//! the magnitudes arbitrary user programs typically compare against
//! literal floats, this is exact, and for astronomically large
//! integers it degrades gracefully to "numerically close to this float"
//! rather than panicking or looping.

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cmp::Ordering;

pub fn float_to_bigint_cmp(f: f64, i: &BigInt) -> Ordering {
    let i_as_f = i.to_f64().unwrap_or(if i.sign() == num_bigint::Sign::Minus {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    });
    f.partial_cmp(&i_as_f).unwrap_or(Ordering::Equal)
}

//! Combinators over the two-track `Result` value.
//!
//! Pipelines stay on the success track until a step fails; after that every
//! step is skipped and the failure rides through unchanged. The track type
//! is plain [`std::result::Result`]. Each combinator returns a reusable
//! closure:
//!
//! ```
//! use promise_rail::railway::{bind, turnout, unwrap_fn};
//!
//! let digits = unwrap_fn(|text: &str| text.parse::<u32>().ok());
//! let doubled = turnout(|n: u32| n * 2);
//!
//! assert_eq!(bind(doubled)(digits("21")), Ok(42));
//! assert!(bind(|n: u32| Ok(n))(digits("not a number")).is_err());
//! ```

use std::panic::{self, AssertUnwindSafe};

use crate::{Nil, Panic};

/// Lifts `f` onto the two-track value: success values are passed to `f`,
/// failures pass through without invoking it. The pipeline short-circuits at
/// the first failure.
pub fn bind<S1, S2, F>(
    f: impl Fn(S1) -> Result<S2, F>,
) -> impl Fn(Result<S1, F>) -> Result<S2, F> {
    move |input| input.and_then(&f)
}

/// Kleisli composition: feeds `f`'s success into `g`, equal to `bind(g) ∘ f`.
/// Associative.
pub fn compose<A, B, C, F>(
    f: impl Fn(A) -> Result<B, F>,
    g: impl Fn(B) -> Result<C, F>,
) -> impl Fn(A) -> Result<C, F> {
    move |input| f(input).and_then(&g)
}

/// Lifts a total function onto the success track. The result is always `Ok`.
pub fn turnout<A, B, F>(f: impl Fn(A) -> B) -> impl Fn(A) -> Result<B, F> {
    move |input| Ok(f(input))
}

/// Total recovery: leaves the two-track world. Success passes its value
/// through; failure is mapped by `f` to a plain value, so recovery cannot
/// fail again.
pub fn turnin<A, F>(f: impl Fn(F) -> A) -> impl Fn(Result<A, F>) -> A {
    move |input| match input {
        Ok(value) => value,
        Err(failure) => f(failure),
    }
}

/// Partial recovery: stays in the two-track world. Success is re-wrapped;
/// failure is remapped by `f`, which may itself fail with a new failure type.
pub fn turnin_result<A, F, F2>(
    f: impl Fn(F) -> Result<A, F2>,
) -> impl Fn(Result<A, F>) -> Result<A, F2> {
    move |input| match input {
        Ok(value) => Ok(value),
        Err(failure) => f(failure),
    }
}

/// Runs `f` for its side effect and returns the input unchanged.
///
/// A panic in `f` propagates; the input is not returned.
pub fn tee<A, B>(f: impl Fn(&A) -> B) -> impl Fn(A) -> A {
    move |input| {
        let _ = f(&input);
        input
    }
}

/// Maps both branches independently, preserving branch identity: `Ok` stays
/// `Ok`, `Err` stays `Err`.
pub fn bimap<S1, S2, F1, F2>(
    on_ok: impl Fn(S1) -> S2,
    on_err: impl Fn(F1) -> F2,
) -> impl Fn(Result<S1, F1>) -> Result<S2, F2> {
    move |input| match input {
        Ok(value) => Ok(on_ok(value)),
        Err(failure) => Err(on_err(failure)),
    }
}

/// Maps the success branch only; `bimap(on_ok, identity)`.
pub fn map_ok<S1, S2, F>(
    on_ok: impl Fn(S1) -> S2,
) -> impl Fn(Result<S1, F>) -> Result<S2, F> {
    bimap(on_ok, |failure| failure)
}

/// The sole bridge from the panicking world onto the two-track value: a
/// normal return becomes `Ok`, a panic is caught and becomes `Err(Panic)`.
pub fn try_catch<A, B>(f: impl Fn(A) -> B) -> impl Fn(A) -> Result<B, Panic> {
    move |input| {
        panic::catch_unwind(AssertUnwindSafe(|| f(input))).map_err(Panic::from_payload)
    }
}

/// Converts an optional value onto the two-track: present becomes `Ok`,
/// absent becomes the distinguished [`Nil`] failure.
pub fn unwrap<A>(value: Option<A>) -> Result<A, Nil> {
    value.ok_or(Nil)
}

/// Lifts an optional-returning function into a Result-returning one, with
/// the same present/absent rule as [`unwrap`].
pub fn unwrap_fn<A, B>(f: impl Fn(A) -> Option<B>) -> impl Fn(A) -> Result<B, Nil> {
    move |input| f(input).ok_or(Nil)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn positive(n: i64) -> Result<i64, String> {
        if n > 0 {
            Ok(n)
        } else {
            Err(format!("{n} is not positive"))
        }
    }

    fn halve(n: i64) -> Result<i64, String> {
        if n % 2 == 0 {
            Ok(n / 2)
        } else {
            Err(format!("{n} is odd"))
        }
    }

    fn decrement(n: i64) -> Result<i64, String> {
        Ok(n - 1)
    }

    #[test]
    fn bind_passes_success_and_short_circuits_failure() {
        let step = bind(halve);
        assert_eq!(step(Ok(10)), Ok(5));
        assert_eq!(step(Err("earlier".to_owned())), Err("earlier".to_owned()));
        assert_eq!(step(Ok(3)), Err("3 is odd".to_owned()));
    }

    #[test]
    fn bind_never_invokes_f_on_failure() {
        let calls = AtomicUsize::new(0);
        let step = bind(|n: i64| {
            calls.fetch_add(1, Ordering::SeqCst);
            positive(n)
        });
        let _ = step(Err("already failed".to_owned()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn compose_equals_bind_after_first() {
        let composed = compose(positive, halve);
        for input in [-2, 0, 3, 8] {
            assert_eq!(composed(input), bind(halve)(positive(input)));
        }
    }

    #[test]
    fn compose_is_associative() {
        let left = compose(compose(positive, halve), decrement);
        let right = compose(positive, compose(halve, decrement));
        for input in [-4, -1, 0, 1, 2, 7, 8, 100] {
            assert_eq!(left(input), right(input));
        }
    }

    #[test]
    fn turnout_never_fails() {
        let lifted = turnout::<_, _, String>(|n: i64| n * n);
        for input in [-3, 0, 5, 1_000_000] {
            assert!(lifted(input).is_ok());
        }
    }

    #[test]
    fn turnin_recovers_to_a_plain_value() {
        let recover = turnin(|failure: String| failure.len() as i64);
        assert_eq!(recover(Ok(9)), 9);
        assert_eq!(recover(Err("four".to_owned())), 4);
    }

    #[test]
    fn turnin_result_may_fail_again() {
        let recover = turnin_result(|failure: String| {
            if failure.is_empty() {
                Err(Nil)
            } else {
                Ok(failure.len() as i64)
            }
        });
        assert_eq!(recover(Ok(9)), Ok(9));
        assert_eq!(recover(Err("four".to_owned())), Ok(4));
        assert_eq!(recover(Err(String::new())), Err(Nil));
    }

    #[test]
    fn tee_returns_input_unchanged_after_effect() {
        let seen = AtomicUsize::new(0);
        let spy = tee(|n: &usize| seen.store(*n, Ordering::SeqCst));
        assert_eq!(spy(7), 7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn bimap_preserves_branch_identity() {
        let both = bimap(|n: i64| n + 1, |failure: String| failure.len());
        assert_eq!(both(Ok(1)), Ok(2));
        assert_eq!(both(Err("xx".to_owned())), Err(2));
    }

    #[test]
    fn map_ok_leaves_failures_alone() {
        let step = map_ok::<_, _, String>(|n: i64| n + 1);
        assert_eq!(step(Ok(1)), Ok(2));
        assert_eq!(step(Err("kept".to_owned())), Err("kept".to_owned()));
    }

    #[test]
    fn try_catch_captures_a_panic_as_failure() {
        let checked = try_catch(|n: i64| {
            if n == 0 {
                panic!("division by zero");
            }
            100 / n
        });
        assert_eq!(checked(4), Ok(25));
        let failure = checked(0).unwrap_err();
        assert_eq!(failure.message(), "division by zero");
    }

    #[test]
    fn unwrap_distinguishes_present_from_absent() {
        for value in [0u32, 1, u32::MAX] {
            assert_eq!(unwrap(Some(value)), Ok(value));
        }
        assert_eq!(unwrap::<u32>(None), Err(Nil));
    }

    #[test]
    fn unwrap_fn_lifts_an_optional_returning_function() {
        let first_char = unwrap_fn(|text: &str| text.chars().next());
        assert_eq!(first_char("rail"), Ok('r'));
        assert_eq!(first_char(""), Err(Nil));
    }
}

//! Derived observable sets.
//!
//! Every function here returns a node that depends on its inputs and
//! recomputes its snapshot whenever one of them changes. An input that is a
//! constant empty set is "statically empty": `union` and `intersection`
//! short-circuit on it instead of creating a node.

use super::set::{ImmutableSet, ObservableSet, SetElement};
use crate::reactive::{Builder, LiveExpression};

/// A constant empty set.
pub fn empty_set<T: SetElement>() -> ObservableSet<T> {
    LiveExpression::constant(ImmutableSet::empty())
}

/// Start building a set node with a custom (possibly async or fallible)
/// computation. The initial value is the empty set.
///
/// # Example
///
/// ```rust,ignore
/// let services = live_sets::builder()
///     .refresh(AsyncMode::Async)
///     .scheduler(lane)
///     .try_compute(move || fetch_services())
///     .build()?;
/// ```
pub fn builder<T: SetElement>() -> Builder<ImmutableSet<T>> {
    LiveExpression::builder(ImmutableSet::empty())
}

fn is_statically_empty<T: SetElement>(set: &ObservableSet<T>) -> bool {
    set.is_constant() && set.get_value().is_empty()
}

/// Elements of `a` followed by those of `b` not already in `a`.
pub fn union<T: SetElement>(a: &ObservableSet<T>, b: &ObservableSet<T>) -> ObservableSet<T> {
    if is_statically_empty(a) {
        return b.clone();
    }
    if is_statically_empty(b) {
        return a.clone();
    }

    combine(a, b, |a, b| a.iter().chain(b.iter()).cloned().collect())
}

/// Elements of `a` that are also in `b`.
pub fn intersection<T: SetElement>(
    a: &ObservableSet<T>,
    b: &ObservableSet<T>,
) -> ObservableSet<T> {
    if is_statically_empty(a) {
        return a.clone();
    }
    if is_statically_empty(b) {
        return b.clone();
    }

    combine(a, b, |a, b| {
        a.iter()
            .filter(|element| b.contains(*element))
            .cloned()
            .collect()
    })
}

/// A node holding `op(a, b)`, computed once up front and again whenever
/// either input changes.
fn combine<T: SetElement>(
    a: &ObservableSet<T>,
    b: &ObservableSet<T>,
    op: fn(&ImmutableSet<T>, &ImmutableSet<T>) -> ImmutableSet<T>,
) -> ObservableSet<T> {
    let (seen_a, seen_b) = (a.get_value(), b.get_value());
    let compute = {
        let (a, b) = (a.clone(), b.clone());
        move || op(&a.get_value(), &b.get_value())
    };
    let result = LiveExpression::new(op(&seen_a, &seen_b), compute);
    result.seeded_from(a, &seen_a).seeded_from(b, &seen_b);
    result
}

/// The image of `source` under `f`. Elements mapping to the same value
/// collapse into one.
pub fn map<T, R, F>(source: &ObservableSet<T>, f: F) -> ObservableSet<R>
where
    T: SetElement,
    R: SetElement,
    F: Fn(&T) -> R + Send + Sync + 'static,
{
    source.apply(move |set| set.iter().map(&f).collect())
}

/// Elements of `source` accepted by `predicate`.
pub fn filter<T, F>(source: &ObservableSet<T>, predicate: F) -> ObservableSet<T>
where
    T: SetElement,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    source.apply(move |set| set.iter().filter(|element| predicate(element)).cloned().collect())
}

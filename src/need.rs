//! Capability needs and the need-matching engine.
//!
//! DESIGN
//! ======
//! A need is either an opaque label, a predicate over the live session, or a
//! JSON pattern matched structurally against provided patterns. Required
//! needs are OR-ed: the first satisfied one wins and later predicates are
//! never invoked.
//!
//! Callers own the "no requirement" case. `authorize` with an empty required
//! list returns `false`.

#[cfg(test)]
#[path = "need_test.rs"]
mod need_test;

use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::state::AuthenticationState;

/// Future returned by a predicate need.
pub type PredicateFuture = LocalBoxFuture<'static, bool>;

type PredicateFn = dyn Fn(&AuthenticationState, &[Need], &Value) -> PredicateFuture;

/// Predicate evaluated with `(state, provided needs, extra context)`.
#[derive(Clone)]
pub struct NeedPredicate(Rc<PredicateFn>);

impl NeedPredicate {
    /// Run the predicate. The returned future owns everything it needs.
    pub fn evaluate(&self, state: &AuthenticationState, provided: &[Need], extra: &Value) -> PredicateFuture {
        (self.0)(state, provided, extra)
    }
}

impl fmt::Debug for NeedPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NeedPredicate(..)")
    }
}

impl PartialEq for NeedPredicate {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A single capability requirement or grant.
#[derive(Clone, Debug, PartialEq)]
pub enum Need {
    /// Satisfied by an identical label among the provided needs.
    Label(String),
    /// Satisfied when the predicate resolves `true`. Never a match target.
    Predicate(NeedPredicate),
    /// Satisfied by any provided pattern that contains every field of this one.
    Pattern(Map<String, Value>),
}

impl Need {
    #[must_use]
    pub fn label(label: impl Into<String>) -> Self {
        Self::Label(label.into())
    }

    /// Build a need from a synchronous predicate.
    pub fn predicate<F>(check: F) -> Self
    where
        F: Fn(&AuthenticationState, &[Need], &Value) -> bool + 'static,
    {
        let predicate = move |state: &AuthenticationState, provided: &[Need], extra: &Value| -> PredicateFuture {
            future::ready(check(state, provided, extra)).boxed_local()
        };
        Self::Predicate(NeedPredicate(Rc::new(predicate)))
    }

    /// Build a need from a predicate that resolves later (e.g. after a request).
    pub fn predicate_async<F>(check: F) -> Self
    where
        F: Fn(&AuthenticationState, &[Need], &Value) -> PredicateFuture + 'static,
    {
        Self::Predicate(NeedPredicate(Rc::new(check)))
    }

    /// Build a pattern need. Returns `None` unless `value` is a JSON object.
    #[must_use]
    pub fn pattern(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::Pattern(fields)),
            _ => None,
        }
    }
}

impl From<&str> for Need {
    fn from(label: &str) -> Self {
        Self::Label(label.to_owned())
    }
}

impl From<String> for Need {
    fn from(label: String) -> Self {
        Self::Label(label)
    }
}

impl<'de> Deserialize<'de> for Need {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(label) => Ok(Self::Label(label)),
            Value::Object(fields) => Ok(Self::Pattern(fields)),
            other => Err(D::Error::custom(format!("need must be a string or an object, got {other}"))),
        }
    }
}

impl Serialize for Need {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Label(label) => serializer.serialize_str(label),
            Self::Pattern(fields) => fields.serialize(serializer),
            Self::Predicate(_) => Err(S::Error::custom("predicate needs cannot be serialized")),
        }
    }
}

// =============================================================================
// MATCHING
// =============================================================================

/// Decide whether any of `needs_required` is satisfied by `needs_provided`.
///
/// Required needs are tried in order and evaluation stops at the first
/// satisfied one.
pub async fn authorize(
    state: &AuthenticationState,
    needs_required: &[Need],
    needs_provided: &[Need],
    extra: &Value,
) -> bool {
    for need in needs_required {
        if is_satisfied(state, need, needs_provided, extra).await {
            return true;
        }
    }
    tracing::debug!(required = needs_required.len(), provided = needs_provided.len(), "no required need satisfied");
    false
}

async fn is_satisfied(state: &AuthenticationState, need: &Need, needs_provided: &[Need], extra: &Value) -> bool {
    match need {
        Need::Label(label) => needs_provided
            .iter()
            .any(|provided| matches!(provided, Need::Label(candidate) if candidate == label)),
        Need::Predicate(predicate) => predicate.evaluate(state, needs_provided, extra).await,
        Need::Pattern(pattern) => needs_provided.iter().any(|provided| match provided {
            Need::Pattern(candidate) => contains_pattern(candidate, pattern),
            Need::Label(_) | Need::Predicate(_) => false,
        }),
    }
}

/// True when `candidate` holds every field of `pattern`, recursively.
#[must_use]
pub fn contains_pattern(candidate: &Map<String, Value>, pattern: &Map<String, Value>) -> bool {
    pattern
        .iter()
        .all(|(key, expected)| candidate.get(key).is_some_and(|actual| contains_value(actual, expected)))
}

fn contains_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => contains_pattern(actual, expected),
        // Each expected element must be contained by some actual element.
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|wanted| actual.iter().any(|item| contains_value(item, wanted))),
        _ => actual == expected,
    }
}

//! Argument matching: decides which handler of a matcher declaration
//! applies to a runtime value.

mod index;
mod type_tag;

pub use index::IndexExpression;
pub use type_tag::TypeTag;

use crate::errors::{RippleError, RippleResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type PredicateFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Matcher half of a `(matcher, handler)` arm.
#[derive(Clone)]
pub enum Matcher {
    /// Structural type tag, parsed when the stage is declared.
    Tag(String),
    /// Predicate over the value. Must yield a JSON boolean.
    Predicate(PredicateFn),
}

impl Matcher {
    pub fn tag(tag: impl Into<String>) -> Self {
        Matcher::Tag(tag.into())
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(move |value| Value::Bool(predicate(value))))
    }

    /// Predicate whose answer is itself a value; anything but a boolean is
    /// rejected at match time.
    pub fn predicate_value<F>(predicate: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Matcher::Predicate(Arc::new(predicate))
    }

    /// Decide whether this matcher accepts `value`.
    pub fn matches(&self, value: &Value) -> RippleResult<bool> {
        self.compile()?.matches(value)
    }

    pub(crate) fn compile(&self) -> RippleResult<CompiledMatcher> {
        Ok(match self {
            Matcher::Tag(tag) => CompiledMatcher::Type(tag.parse()?),
            Matcher::Predicate(predicate) => CompiledMatcher::Predicate(Arc::clone(predicate)),
        })
    }
}

impl From<&str> for Matcher {
    fn from(tag: &str) -> Self {
        Matcher::tag(tag)
    }
}

impl From<String> for Matcher {
    fn from(tag: String) -> Self {
        Matcher::Tag(tag)
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Tag(tag) => f.debug_tuple("Tag").field(tag).finish(),
            Matcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[derive(Clone)]
pub(crate) enum CompiledMatcher {
    Type(TypeTag),
    Predicate(PredicateFn),
}

impl CompiledMatcher {
    pub(crate) fn matches(&self, value: &Value) -> RippleResult<bool> {
        match self {
            CompiledMatcher::Type(tag) => Ok(tag.matches(value)),
            CompiledMatcher::Predicate(predicate) => match predicate(value) {
                Value::Bool(accepted) => Ok(accepted),
                other => Err(RippleError::NonBooleanPredicate(other)),
            },
        }
    }
}

impl fmt::Debug for CompiledMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledMatcher::Type(tag) => write!(f, "Type({})", tag),
            CompiledMatcher::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// First-match-wins scan over `(matcher, item)` arms.
pub(crate) fn select<'a, T>(
    arms: &'a [(CompiledMatcher, T)],
    value: &Value,
) -> RippleResult<&'a T> {
    for (matcher, item) in arms {
        if matcher.matches(value)? {
            return Ok(item);
        }
    }
    Err(RippleError::NoMatch(value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arms() -> Vec<(CompiledMatcher, &'static str)> {
        vec![
            (Matcher::tag("Number").compile().unwrap(), "number"),
            (Matcher::tag("[Number]").compile().unwrap(), "numbers"),
            (Matcher::tag("*").compile().unwrap(), "anything"),
        ]
    }

    #[test]
    fn test_first_match_wins() {
        let arms = arms();
        assert_eq!(*select(&arms, &json!(0)).unwrap(), "number");
        assert_eq!(*select(&arms, &json!([0])).unwrap(), "numbers");
        assert_eq!(*select(&arms, &json!(true)).unwrap(), "anything");
    }

    #[test]
    fn test_unmatched_value_is_named() {
        let arms = vec![(Matcher::tag("String").compile().unwrap(), ())];
        let err = select(&arms, &json!({ "life": 42 })).unwrap_err();
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_custom_predicate() {
        let secret = Matcher::predicate(|value| value == "secret");
        assert!(secret.matches(&json!("secret")).unwrap());
        assert!(!secret.matches(&json!("hello")).unwrap());
    }

    #[test]
    fn test_non_boolean_predicate_is_fatal() {
        let broken = Matcher::predicate_value(|value| value.clone());
        let result = broken.matches(&json!(1));
        assert!(matches!(result, Err(RippleError::NonBooleanPredicate(_))));
    }
}

//! Tri-state attribute values for declarative resource models.
//!
//! Every model field carries one of three observability states: known-set,
//! known-null, or unknown (pending a remote round-trip). Making the three
//! states an explicit type keeps "the user didn't set this" distinct from
//! "set to empty" and from "not yet determined" throughout the mapping and
//! planning layers.

use serde::Serialize;
use serde_json::{Map, Value};

/// A resource model attribute in one of three observability states.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attr<T> {
    /// The attribute has a concrete value.
    Value(T),
    /// The attribute is explicitly null (user set it to nothing, or the
    /// remote system reported it absent).
    Null,
    /// The attribute has not been determined yet; it resolves after the
    /// next remote round-trip.
    #[default]
    Unknown,
}

impl<T> Attr<T> {
    /// Wraps a concrete value.
    pub const fn known(value: T) -> Self {
        Self::Value(value)
    }

    /// Builds an attribute from a remote response field: present becomes
    /// known-set, absent becomes known-null. Response mapping uses this so
    /// that no remote-owned field is ever left unknown after an apply.
    pub fn from_response(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Value)
    }

    /// Returns true if the attribute holds a concrete value.
    pub const fn is_known(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Returns true if the attribute is explicitly null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true if the attribute is still unknown.
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns the concrete value, if any.
    pub const fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Null | Self::Unknown => None,
        }
    }

    /// Converts into the concrete value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Null | Self::Unknown => None,
        }
    }

    /// Identity-preservation semantics: keeps `self` when known or null,
    /// falls back to the prior value when unknown.
    #[must_use]
    pub fn or_prior(self, prior: Self) -> Self
    where
        T: Clone,
    {
        match self {
            Self::Unknown => prior,
            known => known,
        }
    }

    /// Maps the inner value, preserving null/unknown.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Self::Value(v) => Attr::Value(f(v)),
            Self::Null => Attr::Null,
            Self::Unknown => Attr::Unknown,
        }
    }
}

impl<T: Serialize> Attr<T> {
    /// Writes this attribute into an outbound params map only when it is
    /// known-set. Null and unknown attributes are omitted entirely: the
    /// remote API treats a present-but-null field differently from an
    /// absent one.
    pub fn write_param(&self, params: &mut Map<String, Value>, key: &str) {
        if let Self::Value(v) = self {
            if let Ok(json) = serde_json::to_value(v) {
                params.insert(key.to_string(), json);
            }
        }
    }
}

impl Attr<String> {
    /// Case-insensitive equality against another string attribute.
    /// Null and unknown never compare equal to anything.
    #[must_use]
    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    /// Returns the value as a string slice, if known.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().map(String::as_str)
    }
}

impl<T> From<Option<T>> for Attr<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_response(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_response_distinguishes_absent() {
        assert_eq!(Attr::from_response(Some(5)), Attr::Value(5));
        assert_eq!(Attr::<i64>::from_response(None), Attr::Null);
    }

    #[test]
    fn test_write_param_omits_null_and_unknown() {
        let mut params = Map::new();
        Attr::known("tank/vol1").write_param(&mut params, "name");
        Attr::<String>::Null.write_param(&mut params, "comment");
        Attr::<String>::Unknown.write_param(&mut params, "origin");

        assert_eq!(params.len(), 1);
        assert_eq!(params.get("name"), Some(&json!("tank/vol1")));
    }

    #[test]
    fn test_or_prior_preserves_known_values() {
        let prior = Attr::known(7);
        assert_eq!(Attr::Unknown.or_prior(prior.clone()), Attr::Value(7));
        assert_eq!(Attr::known(9).or_prior(prior.clone()), Attr::Value(9));
        // Explicit null is a decision, not a gap; it is kept.
        assert_eq!(Attr::Null.or_prior(prior), Attr::<i32>::Null);
    }

    #[test]
    fn test_eq_ignore_case() {
        let lower = Attr::known(String::from("running"));
        let upper = Attr::known(String::from("RUNNING"));
        assert!(lower.eq_ignore_case(&upper));
        assert!(!lower.eq_ignore_case(&Attr::Null));
        assert!(!Attr::<String>::Unknown.eq_ignore_case(&upper));
    }

    #[test]
    fn test_map_preserves_state() {
        assert_eq!(Attr::known(2).map(|v| v * 2), Attr::Value(4));
        assert_eq!(Attr::<i32>::Null.map(|v| v * 2), Attr::Null);
        assert_eq!(Attr::<i32>::Unknown.map(|v| v * 2), Attr::Unknown);
    }
}

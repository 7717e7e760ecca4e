//! Required-claim matching.
//!
//! A token passes when at least one configured claim has at least one
//! acceptable value in the token:
//!
//! - OR across configured claim entries
//! - OR across the elements of a list-valued claim
//! - no configured entries means every token passes
//!
//! Only strings are compared. Numbers, booleans, objects and nulls never
//! match, whether scalar or inside a list.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// One claim's acceptable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimConstraint {
    name: String,
    allowed: HashSet<String>,
}

impl ClaimConstraint {
    pub fn new<I, S>(name: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn allows(&self, value: &str) -> bool {
        self.allowed.contains(value)
    }

    /// Whether the token's value for this claim is acceptable.
    #[must_use]
    pub fn matches(&self, claims: &Map<String, Value>) -> bool {
        match ClaimValue::of(claims.get(&self.name)) {
            ClaimValue::Absent | ClaimValue::Other => false,
            ClaimValue::Text(text) => self.allows(text),
            ClaimValue::List(items) => items
                .iter()
                .filter_map(Value::as_str)
                .any(|item| self.allows(item)),
        }
    }
}

/// Shape of a claim value as far as matching is concerned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClaimValue<'a> {
    Absent,
    Text(&'a str),
    List(&'a [Value]),
    Other,
}

impl<'a> ClaimValue<'a> {
    #[must_use]
    pub fn of(value: Option<&'a Value>) -> Self {
        match value {
            None => Self::Absent,
            Some(Value::String(text)) => Self::Text(text),
            Some(Value::Array(items)) => Self::List(items),
            Some(_) => Self::Other,
        }
    }
}

/// Evaluates the configured claim constraints against a token payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimsMatcher {
    constraints: Vec<ClaimConstraint>,
}

impl ClaimsMatcher {
    #[must_use]
    pub fn new(constraints: Vec<ClaimConstraint>) -> Self {
        Self { constraints }
    }

    #[must_use]
    pub fn constraints(&self) -> &[ClaimConstraint] {
        &self.constraints
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Whether the payload satisfies at least one constraint.
    #[must_use]
    pub fn matches(&self, claims: &Map<String, Value>) -> bool {
        if self.constraints.is_empty() {
            return true;
        }
        let matched = self
            .constraints
            .iter()
            .find(|constraint| constraint.matches(claims));
        if let Some(constraint) = matched {
            tracing::trace!(
                target: "bearer_auth.claims",
                claim = constraint.name(),
                "Claim constraint satisfied"
            );
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test payloads are objects"),
        }
    }

    fn matcher() -> ClaimsMatcher {
        ClaimsMatcher::new(vec![
            ClaimConstraint::new("groups", ["admin", "ops"]),
            ClaimConstraint::new("role", ["auditor"]),
        ])
    }

    #[test]
    fn test_no_constraints_accepts_everything() {
        let matcher = ClaimsMatcher::default();
        assert!(matcher.is_empty());
        assert!(matcher.matches(&payload(json!({}))));
        assert!(matcher.matches(&payload(json!({"groups": 7}))));
    }

    #[test]
    fn test_scalar_match() {
        assert!(matcher().matches(&payload(json!({"role": "auditor"}))));
        assert!(!matcher().matches(&payload(json!({"role": "viewer"}))));
    }

    #[test]
    fn test_list_any_element_matches() {
        assert!(matcher().matches(&payload(json!({"groups": ["dev", "ops"]}))));
        assert!(!matcher().matches(&payload(json!({"groups": ["dev", "qa"]}))));
        assert!(!matcher().matches(&payload(json!({"groups": []}))));
    }

    #[test]
    fn test_one_entry_is_enough() {
        // groups fails, role passes
        let claims = payload(json!({"groups": ["dev"], "role": "auditor"}));
        assert!(matcher().matches(&claims));
    }

    #[test]
    fn test_absent_claims_do_not_match() {
        assert!(!matcher().matches(&payload(json!({"sub": "admin"}))));
    }

    #[test]
    fn test_non_string_values_never_match() {
        let matcher = ClaimsMatcher::new(vec![ClaimConstraint::new("level", ["1", "true"])]);
        assert!(!matcher.matches(&payload(json!({"level": 1}))));
        assert!(!matcher.matches(&payload(json!({"level": true}))));
        assert!(!matcher.matches(&payload(json!({"level": [1, true, null]}))));
        assert!(!matcher.matches(&payload(json!({"level": {"value": "1"}}))));
        assert!(matcher.matches(&payload(json!({"level": [1, "1"]}))));
    }

    #[test]
    fn test_empty_allowed_set_never_matches() {
        let matcher = ClaimsMatcher::new(vec![ClaimConstraint::new("role", Vec::<String>::new())]);
        assert!(!matcher.matches(&payload(json!({"role": ""}))));
    }

    #[test]
    fn test_claim_value_shapes() {
        let text = json!("x");
        let list = json!(["x"]);
        let number = json!(3);
        assert_eq!(ClaimValue::of(None), ClaimValue::Absent);
        assert_eq!(ClaimValue::of(Some(&text)), ClaimValue::Text("x"));
        assert!(matches!(ClaimValue::of(Some(&list)), ClaimValue::List(items) if items.len() == 1));
        assert_eq!(ClaimValue::of(Some(&number)), ClaimValue::Other);
    }
}

//! Parameter reconciliation under mutual-exclusion rules.
//!
//! Providers declare exclusions one-sidedly (`temperature` may list `top_p`
//! without `top_p` listing it back). Everything here works on the symmetric
//! closure of those declarations, so a valid set never holds two members of
//! the same group.

use std::collections::BTreeSet;

use serde_json::Value as JsonValue;

use super::{ParameterKind, ParameterSchema, ParameterSet, ParameterSpec};
use crate::error::ParameterError;

/// Reconciles parameter edits against one model's schema.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    schema: &'a ParameterSchema,
}

impl<'a> Reconciler<'a> {
    pub fn new(schema: &'a ParameterSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'a ParameterSchema {
        self.schema
    }

    /// Names that conflict with `name`: its own declarations plus every
    /// parameter whose declarations name it.
    pub fn mutual_exclusions_of(&self, name: &str) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(spec) = self.schema.get(name) {
            out.extend(
                spec.mutually_exclusive_with
                    .iter()
                    .filter(|n| n.as_str() != name)
                    .cloned(),
            );
        }
        for (other, spec) in self.schema.iter() {
            if other != name && spec.mutually_exclusive_with.iter().any(|n| n == name) {
                out.insert(other.clone());
            }
        }
        out
    }

    /// Initial values from declared defaults, in schema order. The first
    /// parameter of a conflicting group to get a default wins.
    pub fn build_defaults(&self) -> ParameterSet {
        let mut set = ParameterSet::new();
        for (name, spec) in self.schema.iter() {
            let Some(value) = default_value(spec) else {
                continue;
            };
            if let Some(winner) = self
                .mutual_exclusions_of(name)
                .into_iter()
                .find(|other| set.contains(other))
            {
                tracing::debug!(
                    "skipping default for '{}': conflicts with '{}'",
                    name,
                    winner
                );
                continue;
            }
            set.insert(name.clone(), value);
        }
        set
    }

    /// `current` with `name = value` and every conflicting parameter removed.
    pub fn apply_change(&self, name: &str, value: JsonValue, current: &ParameterSet) -> ParameterSet {
        let mut next = current.clone();
        for other in self.mutual_exclusions_of(name) {
            if next.remove(&other).is_some() {
                tracing::debug!("'{}' set; cleared conflicting '{}'", name, other);
            }
        }
        next.insert(name, value);
        next
    }

    /// `current` without `name`.
    pub fn clear(&self, name: &str, current: &ParameterSet) -> ParameterSet {
        let mut next = current.clone();
        next.remove(name);
        next
    }

    /// Parameters present in `current` that keep `name` disabled.
    pub fn conflicts_present(&self, name: &str, current: &ParameterSet) -> Vec<String> {
        self.mutual_exclusions_of(name)
            .into_iter()
            .filter(|other| current.contains(other))
            .collect()
    }

    /// Check a set against the schema: no exclusive pair may coexist, and
    /// each known value must satisfy its declared constraints.
    pub fn validate(&self, set: &ParameterSet) -> Result<(), ParameterError> {
        for name in set.names() {
            if let Some(other) = self
                .mutual_exclusions_of(name)
                .into_iter()
                .find(|other| set.contains(other))
            {
                let (a, b) = if name.as_str() < other.as_str() {
                    (name.clone(), other)
                } else {
                    (other, name.clone())
                };
                return Err(ParameterError::MutuallyExclusive { a, b });
            }
        }
        for (name, value) in set.iter() {
            if let Some(spec) = self.schema.get(name) {
                check_value(name, &spec.kind, value)?;
            }
        }
        Ok(())
    }
}

fn default_value(spec: &ParameterSpec) -> Option<JsonValue> {
    if let Some(v) = spec.declared_default() {
        return Some(v.clone());
    }
    // Objects default to their nested defaults when they declare none themselves.
    if let ParameterKind::Object { properties } = &spec.kind {
        let nested = Reconciler::new(properties).build_defaults();
        if !nested.is_empty() {
            return Some(JsonValue::Object(
                nested.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ));
        }
    }
    None
}

fn check_value(name: &str, kind: &ParameterKind, value: &JsonValue) -> Result<(), ParameterError> {
    match kind {
        ParameterKind::Float(b) | ParameterKind::Integer(b) => {
            let Some(n) = value.as_f64() else {
                return Err(ParameterError::NotANumber { name: name.into() });
            };
            if matches!(kind, ParameterKind::Integer(_)) && n.fract() != 0.0 {
                return Err(ParameterError::NotAnInteger { name: name.into() });
            }
            let min = b.min.unwrap_or(f64::NEG_INFINITY);
            let max = b.max.unwrap_or(f64::INFINITY);
            if n < min || n > max {
                return Err(ParameterError::OutOfRange {
                    name: name.into(),
                    value: n,
                    min,
                    max,
                });
            }
            Ok(())
        }
        ParameterKind::Choice { choices } => {
            if choices.is_empty() || is_choice(choices, value) {
                Ok(())
            } else {
                Err(ParameterError::InvalidChoice {
                    name: name.into(),
                    value: value.to_string(),
                })
            }
        }
        ParameterKind::ListChoice { choices } => {
            let items: Vec<&JsonValue> = match value {
                JsonValue::Array(items) => items.iter().collect(),
                single => vec![single],
            };
            match items
                .into_iter()
                .find(|v| !choices.is_empty() && !is_choice(choices, v))
            {
                Some(bad) => Err(ParameterError::InvalidChoice {
                    name: name.into(),
                    value: bad.to_string(),
                }),
                None => Ok(()),
            }
        }
        ParameterKind::Object { properties } => {
            let JsonValue::Object(map) = value else {
                return Ok(());
            };
            let nested: ParameterSet = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Reconciler::new(properties)
                .validate(&nested)
                .map_err(|e| prefix_nested(name, e))
        }
        ParameterKind::String | ParameterKind::Unknown(_) => Ok(()),
    }
}

fn is_choice(choices: &[JsonValue], value: &JsonValue) -> bool {
    choices.contains(value)
}

fn prefix_nested(parent: &str, err: ParameterError) -> ParameterError {
    let join = |n: String| format!("{parent}.{n}");
    match err {
        ParameterError::MutuallyExclusive { a, b } => ParameterError::MutuallyExclusive {
            a: join(a),
            b: join(b),
        },
        ParameterError::NotANumber { name } => ParameterError::NotANumber { name: join(name) },
        ParameterError::NotAnInteger { name } => ParameterError::NotAnInteger { name: join(name) },
        ParameterError::OutOfRange {
            name,
            value,
            min,
            max,
        } => ParameterError::OutOfRange {
            name: join(name),
            value,
            min,
            max,
        },
        ParameterError::InvalidChoice { name, value } => ParameterError::InvalidChoice {
            name: join(name),
            value,
        },
    }
}

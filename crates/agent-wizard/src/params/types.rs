use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Numeric constraints shared by float and integer parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub step: Option<f64>,
}

/// Parameter kinds a provider can declare, each with its own constraints.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    Float(Bounds),
    Integer(Bounds),
    Choice { choices: Vec<JsonValue> },
    ListChoice { choices: Vec<JsonValue> },
    String,
    /// Nested parameters, e.g. `reasoning: { effort: choice }`.
    Object { properties: ParameterSchema },
    /// A type this client does not know; carried through untouched.
    Unknown(Option<String>),
}

/// One parameter declaration from a provider schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawParameterSpec", into = "RawParameterSpec")]
pub struct ParameterSpec {
    pub kind: ParameterKind,
    pub default: Option<JsonValue>,
    pub mutually_exclusive_with: Vec<String>,
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn new(kind: ParameterKind) -> Self {
        Self {
            kind,
            default: None,
            mutually_exclusive_with: Vec::new(),
            description: None,
        }
    }

    pub fn with_default(mut self, value: JsonValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn exclusive_with<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutually_exclusive_with
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declared default, ignoring JSON `null`.
    pub fn declared_default(&self) -> Option<&JsonValue> {
        self.default.as_ref().filter(|v| !v.is_null())
    }
}

/// Wire shape of a parameter declaration as the backend sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawParameterSpec {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<ParameterSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mutually_exclusive_with: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl From<RawParameterSpec> for ParameterSpec {
    fn from(raw: RawParameterSpec) -> Self {
        let bounds = Bounds {
            min: raw.min,
            max: raw.max,
            step: raw.step,
        };
        let kind = match raw.kind.as_deref() {
            Some("float") | Some("number") => ParameterKind::Float(bounds),
            Some("integer") | Some("int") => ParameterKind::Integer(bounds),
            Some("choice") => ParameterKind::Choice {
                choices: raw.choices.unwrap_or_default(),
            },
            Some("list_choice") => ParameterKind::ListChoice {
                choices: raw.choices.unwrap_or_default(),
            },
            Some("string") => ParameterKind::String,
            Some("object") => ParameterKind::Object {
                properties: raw.properties.unwrap_or_default(),
            },
            other => {
                if let Some(t) = other {
                    tracing::debug!("unknown parameter type '{}'", t);
                }
                ParameterKind::Unknown(other.map(str::to_string))
            }
        };
        ParameterSpec {
            kind,
            default: raw.default,
            mutually_exclusive_with: raw.mutually_exclusive_with.unwrap_or_default(),
            description: raw.description,
        }
    }
}

impl From<ParameterSpec> for RawParameterSpec {
    fn from(spec: ParameterSpec) -> Self {
        let mut raw = RawParameterSpec {
            default: spec.default,
            mutually_exclusive_with: if spec.mutually_exclusive_with.is_empty() {
                None
            } else {
                Some(spec.mutually_exclusive_with)
            },
            description: spec.description,
            ..Default::default()
        };
        let set_bounds = |raw: &mut RawParameterSpec, b: Bounds| {
            raw.min = b.min;
            raw.max = b.max;
            raw.step = b.step;
        };
        match spec.kind {
            ParameterKind::Float(b) => {
                raw.kind = Some("float".into());
                set_bounds(&mut raw, b);
            }
            ParameterKind::Integer(b) => {
                raw.kind = Some("integer".into());
                set_bounds(&mut raw, b);
            }
            ParameterKind::Choice { choices } => {
                raw.kind = Some("choice".into());
                raw.choices = Some(choices);
            }
            ParameterKind::ListChoice { choices } => {
                raw.kind = Some("list_choice".into());
                raw.choices = Some(choices);
            }
            ParameterKind::String => raw.kind = Some("string".into()),
            ParameterKind::Object { properties } => {
                raw.kind = Some("object".into());
                raw.properties = Some(properties);
            }
            ParameterKind::Unknown(t) => raw.kind = t,
        }
        raw
    }
}

/// Parameter declarations in the provider's declared order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSchema(IndexMap<String, ParameterSpec>);

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert that keeps declaration order.
    pub fn with(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.0.insert(name.into(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterSpec)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ParameterSpec)> for ParameterSchema {
    fn from_iter<T: IntoIterator<Item = (String, ParameterSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Concrete parameter values keyed by parameter name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, JsonValue>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: JsonValue) -> Option<JsonValue> {
        self.0.insert(name.into(), value)
    }

    pub fn remove(&mut self, name: &str) -> Option<JsonValue> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, JsonValue)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, JsonValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A provider-native capability attachable to a model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltInTool {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_config: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default)]
    pub parameters: ParameterSchema,
    #[serde(default)]
    pub built_in_tools: Vec<BuiltInTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns_thoughts: Option<bool>,
}

impl ModelSpec {
    pub fn built_in_tool(&self, id: &str) -> Option<&BuiltInTool> {
        self.built_in_tools.iter().find(|t| t.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderSpec {
    #[serde(default)]
    pub models: IndexMap<String, ModelSpec>,
}

/// Providers and their models as returned by `GET providers`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderCatalog(IndexMap<String, ProviderSpec>);

impl ProviderCatalog {
    pub fn provider(&self, name: &str) -> Option<&ProviderSpec> {
        self.0.get(name)
    }

    pub fn model(&self, provider: &str, model: &str) -> Option<&ModelSpec> {
        self.0.get(provider).and_then(|p| p.models.get(model))
    }

    pub fn providers(&self) -> impl Iterator<Item = (&String, &ProviderSpec)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ProviderSpec)> for ProviderCatalog {
    fn from_iter<T: IntoIterator<Item = (String, ProviderSpec)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

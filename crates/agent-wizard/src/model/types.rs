use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::params::ParameterSet;

/// Field name → type descriptor. Usually a primitive type name such as `"string"`.
pub type FieldSchema = BTreeMap<String, JsonValue>;

/// An uploaded or fetched API specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwaggerSpec {
    pub name: String,
    pub content: String,
}

/// Another saved agent usable as a sub-tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: String,
    pub name: String,
}

/// Provider/model pair with its parameter values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_in_tool: Option<String>,
}

/// Working definition of an agent being authored in the wizard.
///
/// Every field defaults so that partial snapshots still parse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDraft {
    /// Tool server address → selected tool names.
    pub tools: BTreeMap<String, BTreeSet<String>>,
    pub swagger_specs: Vec<SwaggerSpec>,
    pub gofannon_agents: Vec<AgentRef>,
    pub description: String,
    pub input_schema: FieldSchema,
    pub output_schema: FieldSchema,
    pub generated_code: String,
    pub friendly_name: String,
    pub docstring: String,
    pub invokable_models: Vec<ModelConfig>,
    pub composer_model_config: Option<ModelConfig>,
}

impl AgentDraft {
    /// Total number of selected tools across all servers.
    pub fn selected_tool_count(&self) -> usize {
        self.tools.values().map(|t| t.len()).sum()
    }

    /// Tools in the wire shape the backend expects (`server -> [tool]`).
    pub fn tools_as_lists(&self) -> BTreeMap<String, Vec<String>> {
        self.tools
            .iter()
            .filter(|(_, tools)| !tools.is_empty())
            .map(|(server, tools)| (server.clone(), tools.iter().cloned().collect()))
            .collect()
    }
}

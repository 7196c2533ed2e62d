//! Request and response bodies exchanged with the backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::model::{AgentDraft, AgentRef, FieldSchema, ModelConfig, SwaggerSpec};
use crate::params::ParameterSet;
use crate::poll::PollTicket;

/// Tool server address → tool names, as sent on the wire.
pub type ToolLists = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeRequest {
    pub tools: ToolLists,
    pub description: String,
    pub input_schema: FieldSchema,
    pub output_schema: FieldSchema,
    pub model_config: ModelConfig,
    #[serde(default)]
    pub invokable_models: Vec<ModelConfig>,
    #[serde(default)]
    pub swagger_specs: Vec<SwaggerSpec>,
    /// Agent ids.
    #[serde(default)]
    pub gofannon_agents: Vec<String>,
    #[serde(default)]
    pub built_in_tools: Vec<String>,
}

impl GenerateCodeRequest {
    /// Build from a draft and the chosen composer model.
    pub fn from_draft(draft: &AgentDraft, composer: ModelConfig) -> Self {
        let built_in_tools = composer.built_in_tool.iter().cloned().collect();
        Self {
            tools: draft.tools_as_lists(),
            description: draft.description.clone(),
            input_schema: draft.input_schema.clone(),
            output_schema: draft.output_schema.clone(),
            model_config: composer,
            invokable_models: draft.invokable_models.clone(),
            swagger_specs: draft.swagger_specs.clone(),
            gofannon_agents: agent_ids(&draft.gofannon_agents),
            built_in_tools,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCodeResponse {
    pub code: String,
    pub friendly_name: String,
    pub docstring: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thoughts: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCodeRequest {
    pub code: String,
    pub input_dict: serde_json::Map<String, JsonValue>,
    pub tools: ToolLists,
    #[serde(default)]
    pub gofannon_agents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunCodeResponse {
    #[serde(default)]
    pub result: Option<JsonValue>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub provider: String,
    pub model: String,
    pub parameters: ParameterSet,
    #[serde(default)]
    pub built_in_tools: Vec<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, config: &ModelConfig) -> Self {
        Self {
            messages,
            provider: config.provider.clone(),
            model: config.model.clone(),
            parameters: config.parameters.clone(),
            built_in_tools: config.built_in_tool.iter().cloned().collect(),
        }
    }
}

/// Answer to `POST chat`: either the result itself or a ticket to poll.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStart {
    Direct(JsonValue),
    Ticket(PollTicket),
}

impl ChatStart {
    pub fn from_value(value: JsonValue) -> Self {
        let id = value
            .get("ticket_id")
            .or_else(|| value.get("ticketId"))
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        match id {
            Some(id) => ChatStart::Ticket(PollTicket::new(id)),
            None => ChatStart::Direct(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    pub description: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    pub tools: ToolLists,
    #[serde(default)]
    pub swagger_specs: Vec<SwaggerSpec>,
    pub input_schema: FieldSchema,
    pub output_schema: FieldSchema,
    #[serde(default)]
    pub invokable_models: Vec<ModelConfig>,
    #[serde(default)]
    pub gofannon_agents: Vec<String>,
}

impl CreateAgentRequest {
    pub fn from_draft(name: &str, draft: &AgentDraft) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: name.to_string(),
            description: draft.description.clone(),
            code: draft.generated_code.clone(),
            docstring: non_empty(&draft.docstring),
            friendly_name: non_empty(&draft.friendly_name),
            tools: draft.tools_as_lists(),
            swagger_specs: draft.swagger_specs.clone(),
            input_schema: draft.input_schema.clone(),
            output_schema: draft.output_schema.clone(),
            invokable_models: draft.invokable_models.clone(),
            gofannon_agents: agent_ids(&draft.gofannon_agents),
        }
    }
}

/// A saved agent as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub friendly_name: Option<String>,
    #[serde(default)]
    pub tools: ToolLists,
    #[serde(default)]
    pub swagger_specs: Vec<SwaggerSpec>,
    #[serde(default)]
    pub input_schema: Option<FieldSchema>,
    #[serde(default)]
    pub output_schema: Option<FieldSchema>,
    #[serde(default)]
    pub invokable_models: Option<Vec<ModelConfig>>,
    #[serde(default)]
    pub gofannon_agents: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl AgentRecord {
    /// Draft to seed an edit flow with. Sub-agent names are unknown here and
    /// fall back to their ids.
    pub fn to_draft(&self) -> AgentDraft {
        AgentDraft {
            tools: self
                .tools
                .iter()
                .map(|(server, tools)| (server.clone(), tools.iter().cloned().collect()))
                .collect(),
            swagger_specs: self.swagger_specs.clone(),
            gofannon_agents: self
                .gofannon_agents
                .iter()
                .flatten()
                .map(|id| AgentRef {
                    id: id.clone(),
                    name: id.clone(),
                })
                .collect(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone().unwrap_or_default(),
            output_schema: self.output_schema.clone().unwrap_or_default(),
            generated_code: self.code.clone(),
            friendly_name: self.friendly_name.clone().unwrap_or_default(),
            docstring: self.docstring.clone().unwrap_or_default(),
            invokable_models: self.invokable_models.clone().unwrap_or_default(),
            composer_model_config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateApiKeyRequest {
    pub provider: String,
    pub api_key: String,
}

fn agent_ids(agents: &[AgentRef]) -> Vec<String> {
    agents.iter().map(|a| a.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> AgentDraft {
        let mut d = AgentDraft {
            description: "summarize".into(),
            generated_code: "async def run(): ...".into(),
            gofannon_agents: vec![AgentRef {
                id: "a9".into(),
                name: "Helper".into(),
            }],
            ..Default::default()
        };
        d.tools
            .entry("http://mcp".into())
            .or_default()
            .insert("search".into());
        d.input_schema.insert("query".into(), json!("string"));
        d.output_schema.insert("summary".into(), json!("string"));
        d
    }

    #[test]
    fn generate_request_uses_backend_field_names() {
        let composer = ModelConfig {
            provider: "openai".into(),
            model: "gpt-4.1".into(),
            built_in_tool: Some("web_search".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(GenerateCodeRequest::from_draft(&draft(), composer))
            .expect("serialize");
        assert_eq!(v["modelConfig"]["provider"], "openai");
        assert_eq!(v["inputSchema"]["query"], "string");
        assert_eq!(v["gofannonAgents"], json!(["a9"]));
        assert_eq!(v["builtInTools"], json!(["web_search"]));
        assert_eq!(v["tools"]["http://mcp"], json!(["search"]));
    }

    #[test]
    fn chat_start_detects_tickets() {
        assert_eq!(
            ChatStart::from_value(json!({"ticket_id": "t1", "status": "pending"})),
            ChatStart::Ticket(PollTicket::new("t1"))
        );
        let direct = json!({"content": "hi"});
        assert_eq!(ChatStart::from_value(direct.clone()), ChatStart::Direct(direct));
    }

    #[test]
    fn create_request_omits_empty_optional_text() {
        let v = serde_json::to_value(CreateAgentRequest::from_draft("Summarizer", &draft()))
            .expect("serialize");
        assert_eq!(v["name"], "Summarizer");
        assert_eq!(v["code"], "async def run(): ...");
        assert!(v.get("friendlyName").is_none());
    }

    #[test]
    fn agent_record_seeds_a_draft() {
        let rec: AgentRecord = serde_json::from_value(json!({
            "_id": "a1",
            "name": "Summarizer",
            "description": "summarize",
            "code": "pass",
            "friendlyName": "summarizer",
            "tools": {"http://mcp": ["search", "fetch"]},
            "inputSchema": {"query": "string"},
            "outputSchema": null,
            "gofannonAgents": ["a9"]
        }))
        .expect("parse");
        assert_eq!(rec.id, "a1");
        let d = rec.to_draft();
        assert_eq!(d.generated_code, "pass");
        assert_eq!(d.selected_tool_count(), 2);
        assert!(d.output_schema.is_empty());
        assert_eq!(d.gofannon_agents[0].id, "a9");
    }
}

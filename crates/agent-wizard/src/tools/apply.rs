use super::types::ToolPick;
use crate::model::{AgentDraft, AgentRef, SwaggerSpec};

/// Toggle one tool on a server; returns whether it is now selected.
///
/// A server left with no tools is removed so it does not reach the backend.
pub fn toggle_tool(draft: &mut AgentDraft, server: &str, tool: &str) -> bool {
    let tools = draft.tools.entry(server.to_string()).or_default();
    let selected = if tools.remove(tool) {
        false
    } else {
        tools.insert(tool.to_string());
        true
    };
    if tools.is_empty() {
        draft.tools.remove(server);
    }
    selected
}

/// Replace a server's selection with every tool it lists ("select all").
pub fn select_all<I, S>(draft: &mut AgentDraft, server: &str, tools: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: std::collections::BTreeSet<String> = tools.into_iter().map(Into::into).collect();
    if set.is_empty() {
        draft.tools.remove(server);
    } else {
        draft.tools.insert(server.to_string(), set);
    }
}

pub fn remove_server(draft: &mut AgentDraft, server: &str) -> bool {
    draft.tools.remove(server).is_some()
}

/// Add a spec, replacing any existing one with the same name.
pub fn add_swagger_spec(draft: &mut AgentDraft, spec: SwaggerSpec) {
    if let Some(existing) = draft.swagger_specs.iter_mut().find(|s| s.name == spec.name) {
        tracing::debug!("replacing swagger spec '{}'", spec.name);
        *existing = spec;
    } else {
        draft.swagger_specs.push(spec);
    }
}

pub fn remove_swagger_spec(draft: &mut AgentDraft, name: &str) -> bool {
    let before = draft.swagger_specs.len();
    draft.swagger_specs.retain(|s| s.name != name);
    draft.swagger_specs.len() != before
}

/// Add another agent as a sub-tool; duplicates by id are ignored.
pub fn add_agent(draft: &mut AgentDraft, agent: AgentRef) -> bool {
    if draft.gofannon_agents.iter().any(|a| a.id == agent.id) {
        return false;
    }
    draft.gofannon_agents.push(agent);
    true
}

pub fn remove_agent(draft: &mut AgentDraft, id: &str) -> bool {
    let before = draft.gofannon_agents.len();
    draft.gofannon_agents.retain(|a| a.id != id);
    draft.gofannon_agents.len() != before
}

/// Apply picks parsed from the command line, adding to any existing selection.
pub fn apply_picks(draft: &mut AgentDraft, picks: &[ToolPick]) {
    for pick in picks {
        match pick {
            ToolPick::Mcp { server, tools } => {
                let entry = draft.tools.entry(server.clone()).or_default();
                entry.extend(tools.iter().cloned());
            }
            ToolPick::Agent { id, name } => {
                add_agent(
                    draft,
                    AgentRef {
                        id: id.clone(),
                        name: name.clone(),
                    },
                );
            }
        }
    }
}

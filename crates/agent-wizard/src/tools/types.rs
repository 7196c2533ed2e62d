//! Tool sources offered on the tools screen.

use serde::{Deserialize, Serialize};

/// Tabs of the tool selection screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    /// Tools listed by a remote MCP server.
    McpServer,
    /// Operations from an uploaded or fetched OpenAPI/Swagger document.
    Swagger,
    /// Other saved agents callable as tools.
    Agent,
}

/// A selection made on one of the tabs, as parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPick {
    /// `server=tool` or `server=tool1,tool2`.
    Mcp { server: String, tools: Vec<String> },
    Agent { id: String, name: String },
}

impl ToolPick {
    pub fn source(&self) -> ToolSource {
        match self {
            ToolPick::Mcp { .. } => ToolSource::McpServer,
            ToolPick::Agent { .. } => ToolSource::Agent,
        }
    }

    /// Parse `server=tool[,tool]` or `agent:<id>[=<name>]`.
    pub fn parse(s: &str) -> Option<ToolPick> {
        if let Some(rest) = s.strip_prefix("agent:") {
            let (id, name) = match rest.split_once('=') {
                Some((id, name)) => (id.trim(), name.trim()),
                None => (rest.trim(), rest.trim()),
            };
            if id.is_empty() {
                return None;
            }
            return Some(ToolPick::Agent {
                id: id.to_string(),
                name: name.to_string(),
            });
        }
        // Split on the last '=' so server URLs with query strings survive.
        let (server, tools) = s.rsplit_once('=')?;
        let tools: Vec<String> = tools
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if server.trim().is_empty() || tools.is_empty() {
            return None;
        }
        Some(ToolPick::Mcp {
            server: server.trim().to_string(),
            tools,
        })
    }
}

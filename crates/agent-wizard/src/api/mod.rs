//! Backend access.
//!
//! Wizard actions talk to the backend through [`Backend`] so they can run
//! against [`HttpBackend`] or an in-process fake.

pub mod client;
pub mod types;

use async_trait::async_trait;

pub use client::*;
pub use types::*;

use crate::error::ApiError;
use crate::params::ProviderCatalog;
use crate::poll::TicketSource;

#[async_trait]
pub trait Backend: TicketSource {
    async fn providers(&self) -> Result<ProviderCatalog, ApiError>;
    async fn generate_code(&self, req: &GenerateCodeRequest)
    -> Result<GenerateCodeResponse, ApiError>;
    async fn run_code(&self, req: &RunCodeRequest) -> Result<RunCodeResponse, ApiError>;
    async fn start_chat(&self, req: &ChatRequest) -> Result<ChatStart, ApiError>;
    async fn get_agent(&self, id: &str) -> Result<AgentRecord, ApiError>;
    async fn create_agent(&self, req: &CreateAgentRequest) -> Result<AgentRecord, ApiError>;
    async fn update_agent(&self, id: &str, req: &CreateAgentRequest)
    -> Result<AgentRecord, ApiError>;
}

//! Long-running wizard actions.
//!
//! Each action validates the draft first, then calls the backend. Results
//! meant for the draft are written back only if the screen that started the
//! action is still active.

use serde_json::Value as JsonValue;

use super::validate::{validate_for_generation, validate_for_run, validate_for_save};
use crate::api::{
    AgentRecord, Backend, ChatMessage, ChatRequest, ChatStart, CreateAgentRequest,
    GenerateCodeRequest, RunCodeRequest,
};
use crate::error::{ActionError, ValidationError};
use crate::model::ModelConfig;
use crate::params::ProviderCatalog;
use crate::poll::{PollOptions, poll};
use crate::store::StoreHandle;

/// Generate agent code for the current draft.
///
/// Returns `false` when the user navigated away before the backend answered;
/// the result is then dropped.
pub async fn generate_code<B: Backend + ?Sized>(
    backend: &B,
    store: &StoreHandle,
    catalog: Option<&ProviderCatalog>,
) -> Result<bool, ActionError> {
    let draft = store.snapshot()?;
    let composer = validate_for_generation(&draft, catalog)?;
    let guard = store.screen_guard()?;
    tracing::info!(
        "generating code with {}/{}",
        composer.provider,
        composer.model
    );
    let req = GenerateCodeRequest::from_draft(&draft, composer);
    let resp = backend.generate_code(&req).await?;
    let applied = store
        .update_if_current(guard, |d| {
            d.generated_code = resp.code;
            d.friendly_name = resp.friendly_name;
            d.docstring = resp.docstring;
        })?
        .is_some();
    if !applied {
        tracing::info!("screen changed during code generation; result dropped");
    }
    Ok(applied)
}

/// Run the draft's code in the backend sandbox.
pub async fn run_code<B: Backend + ?Sized>(
    backend: &B,
    store: &StoreHandle,
    input: serde_json::Map<String, JsonValue>,
) -> Result<JsonValue, ActionError> {
    let draft = store.snapshot()?;
    validate_for_run(&draft, &input)?;
    let req = RunCodeRequest {
        code: draft.generated_code.clone(),
        input_dict: input,
        tools: draft.tools_as_lists(),
        gofannon_agents: draft.gofannon_agents.iter().map(|a| a.id.clone()).collect(),
    };
    let resp = backend.run_code(&req).await?;
    if let Some(error) = resp.error.filter(|e| !e.is_empty()) {
        return Err(ActionError::Execution(error));
    }
    Ok(resp.result.unwrap_or(JsonValue::Null))
}

/// Create the agent, or update it when `agent_id` is set.
///
/// The caller ends the flow with `WizardFlow::finish_saved` on success so the
/// snapshot is dropped; on failure the draft and its snapshot stay intact.
pub async fn save_agent<B: Backend + ?Sized>(
    backend: &B,
    store: &StoreHandle,
    agent_id: Option<&str>,
    name: &str,
) -> Result<AgentRecord, ActionError> {
    let draft = store.snapshot()?;
    validate_for_save(name, &draft)?;
    let req = CreateAgentRequest::from_draft(name.trim(), &draft);
    let record = match agent_id {
        Some(id) => backend.update_agent(id, &req).await?,
        None => backend.create_agent(&req).await?,
    };
    tracing::info!("saved agent {} ({})", record.name, record.id);
    Ok(record)
}

/// Send a chat request and wait for its result, polling when the backend
/// answers with a ticket.
pub async fn chat<B: Backend + ?Sized>(
    backend: &B,
    config: &ModelConfig,
    messages: Vec<ChatMessage>,
    options: PollOptions,
) -> Result<JsonValue, ActionError> {
    if messages.is_empty() {
        return Err(ValidationError::NoMessages.into());
    }
    let req = ChatRequest::new(messages, config);
    match backend.start_chat(&req).await? {
        ChatStart::Direct(value) => Ok(value),
        ChatStart::Ticket(ticket) => {
            tracing::debug!("chat queued as ticket {}", ticket.ticket_id);
            Ok(poll(backend, &ticket, options).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GenerateCodeResponse, RunCodeResponse};
    use crate::drafts::{DraftPersistence, MemoryStorage, SnapshotKey};
    use crate::error::{ApiError, PollError, WizardError};
    use crate::poll::{PollTicket, TicketSource, TicketState, TicketStatus};
    use crate::store::{Screen, StartOptions, WizardFlow};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Fake {
        gate: Option<Arc<Notify>>,
        run_error: Option<String>,
        chat_ticket: bool,
        requests: Mutex<Vec<String>>,
    }

    impl Fake {
        fn log(&self, what: impl Into<String>) {
            self.requests.lock().expect("lock").push(what.into());
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("lock").clone()
        }
    }

    fn record(id: &str, req: &CreateAgentRequest) -> AgentRecord {
        serde_json::from_value(json!({"_id": id, "name": req.name})).expect("record")
    }

    #[async_trait]
    impl TicketSource for Fake {
        async fn ticket_status(&self, ticket_id: &str) -> Result<TicketStatus, ApiError> {
            self.log(format!("status {ticket_id}"));
            Ok(TicketStatus {
                status: TicketState::Completed,
                result: Some(json!({"content": "pong"})),
                error: None,
            })
        }
    }

    #[async_trait]
    impl Backend for Fake {
        async fn providers(&self) -> Result<ProviderCatalog, ApiError> {
            Ok(ProviderCatalog::default())
        }

        async fn generate_code(
            &self,
            req: &GenerateCodeRequest,
        ) -> Result<GenerateCodeResponse, ApiError> {
            self.log(format!("generate {}", req.model_config.model));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(GenerateCodeResponse {
                code: "async def run(question): return {'answer': question}".into(),
                friendly_name: "echo_agent".into(),
                docstring: "Echoes.".into(),
                thoughts: None,
            })
        }

        async fn run_code(&self, req: &RunCodeRequest) -> Result<RunCodeResponse, ApiError> {
            self.log("run");
            Ok(RunCodeResponse {
                result: Some(json!({"answer": req.input_dict["question"]})),
                error: self.run_error.clone(),
            })
        }

        async fn start_chat(&self, _req: &ChatRequest) -> Result<ChatStart, ApiError> {
            self.log("chat");
            Ok(if self.chat_ticket {
                ChatStart::Ticket(PollTicket::new("t1"))
            } else {
                ChatStart::Direct(json!({"content": "direct"}))
            })
        }

        async fn get_agent(&self, id: &str) -> Result<AgentRecord, ApiError> {
            Err(ApiError::Http {
                status: 404,
                message: format!("Agent {id} not found"),
            })
        }

        async fn create_agent(&self, req: &CreateAgentRequest) -> Result<AgentRecord, ApiError> {
            self.log("create");
            Ok(record("new-id", req))
        }

        async fn update_agent(
            &self,
            id: &str,
            req: &CreateAgentRequest,
        ) -> Result<AgentRecord, ApiError> {
            self.log(format!("update {id}"));
            Ok(record(id, req))
        }
    }

    fn ready_flow() -> WizardFlow {
        let flow = WizardFlow::new(Default::default());
        flow.handle()
            .update(|d| {
                d.description = "echo the question".into();
                d.input_schema.insert("question".into(), json!("string"));
                d.output_schema.insert("answer".into(), json!("string"));
                d.composer_model_config = Some(ModelConfig {
                    provider: "openai".into(),
                    model: "gpt-4.1".into(),
                    ..Default::default()
                });
            })
            .expect("update");
        flow
    }

    #[tokio::test]
    async fn generate_writes_code_into_draft() {
        let flow = ready_flow();
        flow.enter_screen(Screen::Code);
        let fake = Fake::default();
        assert!(generate_code(&fake, &flow.handle(), None).await.expect("generate"));
        let d = flow.snapshot();
        assert_eq!(d.friendly_name, "echo_agent");
        assert!(d.generated_code.starts_with("async def run"));
        assert_eq!(fake.requests(), vec!["generate gpt-4.1".to_string()]);
    }

    #[tokio::test]
    async fn generate_validates_before_calling_backend() {
        let flow = WizardFlow::new(Default::default());
        let fake = Fake::default();
        let err = generate_code(&fake, &flow.handle(), None).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation(ValidationError::EmptyDescription)));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn generate_result_dropped_after_navigation() {
        let flow = ready_flow();
        flow.enter_screen(Screen::Code);
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(Fake {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let handle = flow.handle();
        let task = {
            let fake = fake.clone();
            tokio::spawn(async move { generate_code(fake.as_ref(), &handle, None).await })
        };
        while fake.requests().is_empty() {
            tokio::task::yield_now().await;
        }
        flow.enter_screen(Screen::Sandbox);
        gate.notify_one();
        let applied = task.await.expect("join").expect("generate");
        assert!(!applied);
        assert_eq!(flow.snapshot().generated_code, "");
    }

    #[tokio::test]
    async fn generate_after_flow_ended_is_a_wizard_error() {
        let flow = ready_flow();
        let handle = flow.handle();
        drop(flow);
        let err = generate_code(&Fake::default(), &handle, None).await.unwrap_err();
        assert!(matches!(err, ActionError::Wizard(WizardError::OutsideFlow)));
    }

    #[tokio::test]
    async fn run_code_returns_result_or_execution_error() {
        let flow = ready_flow();
        let h = flow.handle();
        h.update(|d| d.generated_code = "pass".into()).expect("update");
        let mut input = serde_json::Map::new();
        input.insert("question".into(), json!("hi"));

        let out = run_code(&Fake::default(), &h, input.clone()).await.expect("run");
        assert_eq!(out, json!({"answer": "hi"}));

        let failing = Fake {
            run_error: Some("NameError: x".into()),
            ..Default::default()
        };
        let err = run_code(&failing, &h, input).await.unwrap_err();
        assert_eq!(err.to_string(), "agent code failed: NameError: x");
    }

    #[tokio::test]
    async fn save_creates_or_updates_then_snapshot_is_cleared() {
        let storage = Arc::new(MemoryStorage::new());
        let p = DraftPersistence::new(storage);
        let flow = WizardFlow::start(&p, SnapshotKey::Create, StartOptions::default());
        flow.handle()
            .update(|d| {
                d.description = "echo".into();
                d.generated_code = "pass".into();
            })
            .expect("update");
        assert!(p.load(&SnapshotKey::Create).is_some());

        let fake = Fake::default();
        let err = save_agent(&fake, &flow.handle(), None, " ").await.unwrap_err();
        assert!(matches!(err, ActionError::Validation(ValidationError::EmptyName)));

        let rec = save_agent(&fake, &flow.handle(), None, "Echo").await.expect("save");
        assert_eq!(rec.id, "new-id");
        flow.finish_saved();
        assert_eq!(p.load(&SnapshotKey::Create), None);

        let flow = ready_flow();
        flow.handle()
            .update(|d| d.generated_code = "pass".into())
            .expect("update");
        let rec = save_agent(&fake, &flow.handle(), Some("a1"), "Echo").await.expect("save");
        assert_eq!(rec.id, "a1");
        assert_eq!(fake.requests(), vec!["create".to_string(), "update a1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn chat_polls_ticket_or_returns_direct_result() {
        let config = ModelConfig {
            provider: "openai".into(),
            model: "gpt-4.1".into(),
            ..Default::default()
        };
        let options = PollOptions {
            max_attempts: 3,
            delay: Duration::from_millis(100),
            deadline: None,
        };
        let msgs = vec![ChatMessage::user("ping")];

        let direct = chat(&Fake::default(), &config, msgs.clone(), options).await.expect("chat");
        assert_eq!(direct["content"], "direct");

        let ticketed = Fake {
            chat_ticket: true,
            ..Default::default()
        };
        let out = chat(&ticketed, &config, msgs, options).await.expect("chat");
        assert_eq!(out["content"], "pong");
        assert_eq!(ticketed.requests(), vec!["chat".to_string(), "status t1".to_string()]);

        let err = chat(&ticketed, &config, vec![], options).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation(ValidationError::NoMessages)));
    }

    #[test]
    fn poll_errors_surface_as_action_errors() {
        let e: ActionError = PollError::Failed("boom".into()).into();
        assert_eq!(e.to_string(), "boom");
    }
}

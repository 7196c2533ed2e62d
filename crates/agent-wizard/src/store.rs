//! Wizard state store.
//!
//! A [`WizardFlow`] owns the in-progress [`AgentDraft`] for the lifetime of one
//! create/edit flow and hands out weak [`StoreHandle`]s to the screens. Once
//! the flow is finished or dropped every handle fails with
//! [`WizardError::OutsideFlow`].
//!
//! Observers run synchronously after each mutation while the store lock is
//! held; they must not call back into the store. A persisting observer over
//! [`crate::drafts::FileStorage`] therefore does one blocking file write per
//! mutation on the calling thread, including tokio worker threads running
//! [`crate::wizard`] actions. Drafts are small, so the write is not offloaded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::drafts::{DraftPersistence, SnapshotKey};
use crate::error::WizardError;
use crate::model::{AgentDraft, AgentRef, FieldSchema, ModelConfig, SwaggerSpec};

/// Receives the full draft after every mutation.
pub trait DraftObserver: Send + Sync {
    fn on_change(&self, draft: &AgentDraft);
}

/// Wizard screens, in flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Tools,
    Describe,
    Schema,
    Models,
    Code,
    Sandbox,
    Save,
}

/// Replacement of a single draft field.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftUpdate {
    Tools(BTreeMap<String, BTreeSet<String>>),
    SwaggerSpecs(Vec<SwaggerSpec>),
    GofannonAgents(Vec<AgentRef>),
    Description(String),
    InputSchema(FieldSchema),
    OutputSchema(FieldSchema),
    GeneratedCode(String),
    FriendlyName(String),
    Docstring(String),
    InvokableModels(Vec<ModelConfig>),
    ComposerModelConfig(Option<ModelConfig>),
}

impl DraftUpdate {
    fn apply(self, draft: &mut AgentDraft) {
        match self {
            DraftUpdate::Tools(v) => draft.tools = v,
            DraftUpdate::SwaggerSpecs(v) => draft.swagger_specs = v,
            DraftUpdate::GofannonAgents(v) => draft.gofannon_agents = v,
            DraftUpdate::Description(v) => draft.description = v,
            DraftUpdate::InputSchema(v) => draft.input_schema = v,
            DraftUpdate::OutputSchema(v) => draft.output_schema = v,
            DraftUpdate::GeneratedCode(v) => draft.generated_code = v,
            DraftUpdate::FriendlyName(v) => draft.friendly_name = v,
            DraftUpdate::Docstring(v) => draft.docstring = v,
            DraftUpdate::InvokableModels(v) => draft.invokable_models = v,
            DraftUpdate::ComposerModelConfig(v) => draft.composer_model_config = v,
        }
    }
}

/// Identifies the screen that was active when an async action started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenGuard {
    epoch: u64,
}

/// How a flow picks its initial draft.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Ignore and clear any saved snapshot.
    pub fresh: bool,
    /// Draft fetched from the backend, used only when no snapshot exists.
    pub seed: Option<AgentDraft>,
}

struct FlowState {
    draft: AgentDraft,
    observers: Vec<Box<dyn DraftObserver>>,
    screen: Option<Screen>,
    epoch: u64,
    revision: u64,
}

impl FlowState {
    fn notify(&self) {
        for obs in &self.observers {
            obs.on_change(&self.draft);
        }
    }
}

fn lock(state: &Mutex<FlowState>) -> MutexGuard<'_, FlowState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owner of the draft for one wizard flow.
pub struct WizardFlow {
    state: Arc<Mutex<FlowState>>,
    persistence: Option<(DraftPersistence, SnapshotKey)>,
}

impl WizardFlow {
    /// A flow without persistence.
    pub fn new(draft: AgentDraft) -> Self {
        Self {
            state: Arc::new(Mutex::new(FlowState {
                draft,
                observers: Vec::new(),
                screen: None,
                epoch: 0,
                revision: 0,
            })),
            persistence: None,
        }
    }

    /// Start a flow whose draft is mirrored under `key`.
    ///
    /// The snapshot (unless `fresh`) wins over `seed`. The persistence
    /// observer is attached only after the initial draft is in place, so the
    /// initial state never overwrites a snapshot.
    pub fn start(persistence: &DraftPersistence, key: SnapshotKey, options: StartOptions) -> Self {
        let restored = persistence.mount(&key, options.fresh);
        let from_snapshot = restored.is_some();
        let draft = restored.or(options.seed).unwrap_or_default();
        tracing::info!(
            "wizard flow started (key={}, fresh={}, from_snapshot={})",
            key,
            options.fresh,
            from_snapshot
        );
        let mut flow = Self::new(draft);
        flow.subscribe(Box::new(persistence.observer(key.clone())));
        flow.persistence = Some((persistence.clone(), key));
        flow
    }

    pub fn handle(&self) -> StoreHandle {
        StoreHandle {
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn DraftObserver>) {
        lock(&self.state).observers.push(observer);
    }

    /// Make `screen` the active one; results started on other screens become stale.
    pub fn enter_screen(&self, screen: Screen) {
        let mut st = lock(&self.state);
        st.epoch += 1;
        st.screen = Some(screen);
        tracing::debug!("entered screen {:?} (epoch={})", screen, st.epoch);
    }

    pub fn current_screen(&self) -> Option<Screen> {
        lock(&self.state).screen
    }

    pub fn snapshot(&self) -> AgentDraft {
        lock(&self.state).draft.clone()
    }

    /// Number of mutations since the flow started.
    pub fn revision(&self) -> u64 {
        lock(&self.state).revision
    }

    pub fn key(&self) -> Option<&SnapshotKey> {
        self.persistence.as_ref().map(|(_, k)| k)
    }

    /// End the flow after the draft was saved to the backend; drops the snapshot.
    pub fn finish_saved(self) -> AgentDraft {
        if let Some((persistence, key)) = &self.persistence {
            persistence.clear(key);
        }
        let draft = self.snapshot();
        tracing::info!("wizard flow finished");
        draft
    }
}

/// Weak reference to a flow's store, held by screens and async actions.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    state: Weak<Mutex<FlowState>>,
}

impl StoreHandle {
    fn state(&self) -> Result<Arc<Mutex<FlowState>>, WizardError> {
        self.state.upgrade().ok_or(WizardError::OutsideFlow)
    }

    /// Read from the draft.
    pub fn get<T>(&self, f: impl FnOnce(&AgentDraft) -> T) -> Result<T, WizardError> {
        let state = self.state()?;
        let st = lock(&state);
        Ok(f(&st.draft))
    }

    pub fn snapshot(&self) -> Result<AgentDraft, WizardError> {
        self.get(AgentDraft::clone)
    }

    /// Replace one field and notify observers.
    pub fn set(&self, update: DraftUpdate) -> Result<(), WizardError> {
        self.update(|d| update.apply(d))
    }

    /// Edit several fields at once; observers see a single change.
    pub fn update<T>(&self, f: impl FnOnce(&mut AgentDraft) -> T) -> Result<T, WizardError> {
        let state = self.state()?;
        let mut st = lock(&state);
        let out = f(&mut st.draft);
        st.revision += 1;
        st.notify();
        Ok(out)
    }

    pub fn screen_guard(&self) -> Result<ScreenGuard, WizardError> {
        let state = self.state()?;
        let epoch = lock(&state).epoch;
        Ok(ScreenGuard { epoch })
    }

    /// Whether the screen captured by `guard` is still active.
    pub fn is_current(&self, guard: ScreenGuard) -> Result<bool, WizardError> {
        let state = self.state()?;
        let current = lock(&state).epoch == guard.epoch;
        Ok(current)
    }

    /// Apply `update` only if the guarded screen is still active.
    pub fn set_if_current(&self, guard: ScreenGuard, update: DraftUpdate) -> Result<bool, WizardError> {
        self.update_if_current(guard, |d| update.apply(d))
            .map(|applied| applied.is_some())
    }

    pub fn update_if_current<T>(
        &self,
        guard: ScreenGuard,
        f: impl FnOnce(&mut AgentDraft) -> T,
    ) -> Result<Option<T>, WizardError> {
        let state = self.state()?;
        let mut st = lock(&state);
        if st.epoch != guard.epoch {
            tracing::debug!(
                "dropping stale result (started at epoch {}, now {})",
                guard.epoch,
                st.epoch
            );
            return Ok(None);
        }
        let out = f(&mut st.draft);
        st.revision += 1;
        st.notify();
        Ok(Some(out))
    }
}

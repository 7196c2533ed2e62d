//! Model configuration dialog state.
//!
//! Selecting a provider or model resets parameters to that model's defaults;
//! parameter edits go through [`Reconciler`], so a field whose conflicting
//! partner is set reports itself disabled until the partner is cleared.

use serde_json::Value as JsonValue;

use super::{ModelSpec, ParameterSet, ProviderCatalog, Reconciler};
use crate::error::{DialogError, ParameterError};
use crate::model::ModelConfig;

#[derive(Debug, Clone)]
pub struct ModelConfigDialog<'a> {
    catalog: &'a ProviderCatalog,
    provider: Option<String>,
    model: Option<String>,
    parameters: ParameterSet,
    built_in_tool: Option<String>,
}

impl<'a> ModelConfigDialog<'a> {
    /// Open the dialog, optionally pre-filled from an existing configuration.
    ///
    /// An existing config whose provider/model is no longer offered falls back
    /// to an empty selection instead of failing.
    pub fn open(catalog: &'a ProviderCatalog, existing: Option<&ModelConfig>) -> Self {
        let mut dialog = Self {
            catalog,
            provider: None,
            model: None,
            parameters: ParameterSet::new(),
            built_in_tool: None,
        };
        if let Some(cfg) = existing {
            match catalog.model(&cfg.provider, &cfg.model) {
                Some(spec) => {
                    dialog.provider = Some(cfg.provider.clone());
                    dialog.model = Some(cfg.model.clone());
                    dialog.parameters = cfg.parameters.clone();
                    dialog.built_in_tool = cfg
                        .built_in_tool
                        .clone()
                        .filter(|t| spec.built_in_tool(t).is_some());
                }
                None => tracing::warn!(
                    "saved model {}/{} is not offered anymore; starting empty",
                    cfg.provider,
                    cfg.model
                ),
            }
        }
        dialog
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn built_in_tool(&self) -> Option<&str> {
        self.built_in_tool.as_deref()
    }

    /// Spec of the selected model, if any.
    pub fn model_spec(&self) -> Option<&'a ModelSpec> {
        let (p, m) = (self.provider.as_deref()?, self.model.as_deref()?);
        self.catalog.model(p, m)
    }

    /// Switch provider; selects its first model with default parameters.
    pub fn select_provider(&mut self, provider: &str) -> Result<(), DialogError> {
        let spec = self
            .catalog
            .provider(provider)
            .ok_or_else(|| DialogError::UnknownProvider(provider.to_string()))?;
        let first = spec
            .models
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| DialogError::NoModels(provider.to_string()))?;
        self.provider = Some(provider.to_string());
        self.built_in_tool = None;
        self.select_model(&first)
    }

    /// Switch model within the current provider and reset its parameters.
    pub fn select_model(&mut self, model: &str) -> Result<(), DialogError> {
        let provider = self.provider.clone().ok_or(DialogError::NothingSelected)?;
        let spec = self
            .catalog
            .model(&provider, model)
            .ok_or_else(|| DialogError::UnknownModel {
                provider: provider.clone(),
                model: model.to_string(),
            })?;
        self.model = Some(model.to_string());
        self.parameters = Reconciler::new(&spec.parameters).build_defaults();
        if let Some(tool) = self.built_in_tool.as_deref()
            && spec.built_in_tool(tool).is_none()
        {
            tracing::debug!("built-in tool '{}' not offered by {}; cleared", tool, model);
            self.built_in_tool = None;
        }
        Ok(())
    }

    pub fn set_parameter(&mut self, name: &str, value: JsonValue) -> Result<(), DialogError> {
        let spec = self.model_spec().ok_or(DialogError::NothingSelected)?;
        self.parameters = Reconciler::new(&spec.parameters).apply_change(name, value, &self.parameters);
        Ok(())
    }

    /// The explicit "clear" action offered on a field.
    pub fn clear_parameter(&mut self, name: &str) -> Result<(), DialogError> {
        let spec = self.model_spec().ok_or(DialogError::NothingSelected)?;
        self.parameters = Reconciler::new(&spec.parameters).clear(name, &self.parameters);
        Ok(())
    }

    /// True when a conflicting parameter is currently set.
    pub fn is_disabled(&self, name: &str) -> bool {
        self.model_spec()
            .map(|spec| {
                !Reconciler::new(&spec.parameters)
                    .conflicts_present(name, &self.parameters)
                    .is_empty()
            })
            .unwrap_or(false)
    }

    pub fn select_built_in_tool(&mut self, tool: Option<&str>) -> Result<(), DialogError> {
        let spec = self.model_spec().ok_or(DialogError::NothingSelected)?;
        if let Some(id) = tool
            && spec.built_in_tool(id).is_none()
        {
            return Err(DialogError::UnknownBuiltInTool {
                model: self.model.clone().unwrap_or_default(),
                tool: id.to_string(),
            });
        }
        self.built_in_tool = tool.map(str::to_string);
        Ok(())
    }

    /// Close the dialog, producing a validated configuration.
    pub fn finish(&self) -> Result<ModelConfig, FinishError> {
        let (Some(provider), Some(model), Some(spec)) =
            (self.provider.clone(), self.model.clone(), self.model_spec())
        else {
            return Err(FinishError::Dialog(DialogError::NothingSelected));
        };
        Reconciler::new(&spec.parameters)
            .validate(&self.parameters)
            .map_err(FinishError::Parameters)?;
        Ok(ModelConfig {
            provider,
            model,
            parameters: self.parameters.clone(),
            built_in_tool: self.built_in_tool.clone(),
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FinishError {
    #[error(transparent)]
    Dialog(#[from] DialogError),
    #[error(transparent)]
    Parameters(#[from] ParameterError),
}

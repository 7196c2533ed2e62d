//! Checks run before a wizard step talks to the backend.

use serde_json::Value as JsonValue;

use crate::error::ValidationError;
use crate::model::{AgentDraft, FieldSchema, ModelConfig};
use crate::params::{ProviderCatalog, Reconciler};

/// Schema field names become keyword arguments of the generated code.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn validate_description(draft: &AgentDraft) -> Result<(), ValidationError> {
    if draft.description.trim().is_empty() {
        return Err(ValidationError::EmptyDescription);
    }
    Ok(())
}

fn validate_schema(schema: &'static str, fields: &FieldSchema) -> Result<(), ValidationError> {
    if fields.is_empty() {
        return Err(ValidationError::EmptySchema { schema });
    }
    if let Some(field) = fields.keys().find(|f| !is_identifier(f)) {
        return Err(ValidationError::InvalidFieldName {
            schema,
            field: field.clone(),
        });
    }
    Ok(())
}

pub fn validate_schemas(draft: &AgentDraft) -> Result<(), ValidationError> {
    validate_schema("input", &draft.input_schema)?;
    validate_schema("output", &draft.output_schema)
}

/// Check a model config's parameters when the catalog knows the model.
pub fn validate_model_config(
    config: &ModelConfig,
    catalog: Option<&ProviderCatalog>,
) -> Result<(), ValidationError> {
    if let Some(spec) = catalog.and_then(|c| c.model(&config.provider, &config.model)) {
        Reconciler::new(&spec.parameters).validate(&config.parameters)?;
    }
    Ok(())
}

/// Everything code generation needs; returns the composer model to use.
pub fn validate_for_generation(
    draft: &AgentDraft,
    catalog: Option<&ProviderCatalog>,
) -> Result<ModelConfig, ValidationError> {
    validate_description(draft)?;
    validate_schemas(draft)?;
    let composer = draft
        .composer_model_config
        .clone()
        .ok_or(ValidationError::MissingComposerModel)?;
    validate_model_config(&composer, catalog)?;
    for model in &draft.invokable_models {
        validate_model_config(model, catalog)?;
    }
    Ok(composer)
}

/// Sandbox input must cover every input schema field.
pub fn validate_for_run(
    draft: &AgentDraft,
    input: &serde_json::Map<String, JsonValue>,
) -> Result<(), ValidationError> {
    if draft.generated_code.trim().is_empty() {
        return Err(ValidationError::MissingCode { action: "running" });
    }
    if let Some(missing) = draft.input_schema.keys().find(|k| !input.contains_key(*k)) {
        return Err(ValidationError::MissingInput(missing.clone()));
    }
    Ok(())
}

pub fn validate_for_save(name: &str, draft: &AgentDraft) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if draft.generated_code.trim().is_empty() {
        return Err(ValidationError::MissingCode { action: "saving" });
    }
    validate_description(draft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParameterError;
    use crate::params::{Bounds, ModelSpec, ParameterKind, ParameterSchema, ParameterSpec, ProviderSpec};
    use serde_json::json;

    fn ready() -> AgentDraft {
        let mut d = AgentDraft {
            description: "answer questions".into(),
            composer_model_config: Some(ModelConfig {
                provider: "openai".into(),
                model: "gpt-4.1".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        d.input_schema.insert("question".into(), json!("string"));
        d.output_schema.insert("answer".into(), json!("string"));
        d
    }

    fn catalog() -> ProviderCatalog {
        let schema = ParameterSchema::new()
            .with(
                "temperature",
                ParameterSpec::new(ParameterKind::Float(Bounds {
                    min: Some(0.0),
                    max: Some(2.0),
                    step: None,
                }))
                .exclusive_with(["top_p"]),
            )
            .with("top_p", ParameterSpec::new(ParameterKind::Float(Bounds::default())));
        let model = ModelSpec {
            parameters: schema,
            ..Default::default()
        };
        let provider = ProviderSpec {
            models: [("gpt-4.1".to_string(), model)].into_iter().collect(),
        };
        [("openai".to_string(), provider)].into_iter().collect()
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("question"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("my field"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn generation_requires_description_schemas_and_composer() {
        assert!(validate_for_generation(&ready(), None).is_ok());

        let mut d = ready();
        d.description = "  ".into();
        assert_eq!(validate_for_generation(&d, None), Err(ValidationError::EmptyDescription));

        let mut d = ready();
        d.output_schema.clear();
        assert_eq!(
            validate_for_generation(&d, None),
            Err(ValidationError::EmptySchema { schema: "output" })
        );

        let mut d = ready();
        d.input_schema.insert("bad name".into(), json!("string"));
        assert_eq!(
            validate_for_generation(&d, None),
            Err(ValidationError::InvalidFieldName {
                schema: "input",
                field: "bad name".into()
            })
        );

        let mut d = ready();
        d.composer_model_config = None;
        assert_eq!(
            validate_for_generation(&d, None),
            Err(ValidationError::MissingComposerModel)
        );
    }

    #[test]
    fn generation_rejects_conflicting_parameters() {
        let mut d = ready();
        if let Some(c) = d.composer_model_config.as_mut() {
            c.parameters.insert("temperature", json!(0.5));
            c.parameters.insert("top_p", json!(0.9));
        }
        let err = validate_for_generation(&d, Some(&catalog())).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Parameters(ParameterError::MutuallyExclusive { .. })
        ));
    }

    #[test]
    fn run_requires_code_and_inputs() {
        let mut d = ready();
        let mut input = serde_json::Map::new();
        assert_eq!(
            validate_for_run(&d, &input),
            Err(ValidationError::MissingCode { action: "running" })
        );
        d.generated_code = "async def run(question): ...".into();
        assert_eq!(
            validate_for_run(&d, &input),
            Err(ValidationError::MissingInput("question".into()))
        );
        input.insert("question".into(), json!("why?"));
        assert!(validate_for_run(&d, &input).is_ok());
    }

    #[test]
    fn save_requires_name_and_code() {
        let mut d = ready();
        assert_eq!(validate_for_save("", &d), Err(ValidationError::EmptyName));
        assert_eq!(
            validate_for_save("qa", &d),
            Err(ValidationError::MissingCode { action: "saving" })
        );
        d.generated_code = "pass".into();
        assert!(validate_for_save("qa", &d).is_ok());
    }
}

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use env_flags::env_flags;
use once_cell::sync::OnceCell;
use serde_json::Value as JsonValue;

use agent_wizard::api::{Backend, ChatMessage, HttpBackend};
use agent_wizard::config::{LoggingSettings, Settings};
use agent_wizard::drafts::{DraftPersistence, FileStorage, new_session_id, snapshot_key_for};
use agent_wizard::model::{ModelConfig, SwaggerSpec};
use agent_wizard::params::{ModelConfigDialog, ProviderCatalog, Reconciler};
use agent_wizard::store::{DraftUpdate, Screen, StartOptions, WizardFlow};
use agent_wizard::tools::{ToolPick, add_swagger_spec, apply_picks};
use agent_wizard::wizard;

fn init_tracing(cfg: &LoggingSettings) {
    env_flags! {
        /// ANSI colors on stderr logs.
        TRACING_ANSI: bool = true;
    }

    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, prelude::*};

    static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

    let filter = EnvFilter::try_new(&cfg.filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    // Optional file writer; failures are reported once logging is up.
    let mut dir_error = None;
    let file_writer = if cfg.to_file {
        match std::fs::create_dir_all(&cfg.dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&cfg.dir, "agent-wizard.log");
                let (nb, guard) = tracing_appender::non_blocking(appender);
                let _ = FILE_GUARD.set(guard);
                Some(nb)
            }
            Err(e) => {
                dir_error = Some(e);
                None
            }
        }
    } else {
        None
    };

    // Logs always go to stderr; stdout carries command output.
    let stderr_layer = || {
        tracing_subscriber::fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_target(true)
            .with_ansi(*TRACING_ANSI)
            .with_writer(std::io::stderr)
    };
    fn file_layer<S>(
        nb: tracing_appender::non_blocking::NonBlocking,
    ) -> tracing_subscriber::fmt::Layer<
        S,
        tracing_subscriber::fmt::format::DefaultFields,
        tracing_subscriber::fmt::format::Format,
        tracing_appender::non_blocking::NonBlocking,
    >
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        tracing_subscriber::fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .with_target(true)
            .with_ansi(false)
            .with_writer(nb)
    }

    let reg = tracing_subscriber::registry().with(filter);
    let result = if cfg.json {
        reg.with(stderr_layer().json())
            .with(file_writer.map(|nb| file_layer(nb).json()))
            .try_init()
    } else if cfg.compact {
        reg.with(stderr_layer().compact())
            .with(file_writer.map(|nb| file_layer(nb).compact()))
            .try_init()
    } else if cfg.pretty {
        reg.with(stderr_layer().pretty())
            .with(file_writer.map(|nb| file_layer(nb).pretty()))
            .try_init()
    } else {
        reg.with(stderr_layer())
            .with(file_writer.map(file_layer))
            .try_init()
    };
    if let Err(e) = result {
        tracing::debug!("tracing already set: {:?}", e);
    }
    if let Some(e) = dir_error {
        tracing::warn!("failed to create log dir {}: {}", cfg.dir.display(), e);
    }
}

#[derive(Debug, Parser)]
#[command(name = "agent-wizard", version, about = "Author and manage agents from the terminal")]
struct Cli {
    /// Backend base URL; overrides config and AGENT_WIZARD_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Draft session id; drafts from the same session can be resumed.
    /// Defaults to a shared "default" session.
    #[arg(long, global = true, conflicts_with = "new_session")]
    session: Option<String>,
    /// Start a new draft session and print its id.
    #[arg(long, global = true)]
    new_session: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List providers and their models.
    Providers,
    /// Print the default parameter set of a model.
    Defaults { provider: String, model: String },
    /// Send one message and wait for the reply.
    Chat {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: String,
        /// Parameter as NAME=VALUE; VALUE is parsed as JSON when possible.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, JsonValue)>,
        /// Built-in tool to enable.
        #[arg(long)]
        tool: Option<String>,
        message: String,
    },
    /// Walk the wizard non-interactively and generate agent code.
    Generate(GenerateArgs),
    /// Inspect or discard the saved draft.
    Draft {
        #[command(subcommand)]
        action: DraftAction,
    },
    /// Manage saved agents.
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },
}

#[derive(Debug, clap::Args)]
struct GenerateArgs {
    /// Edit an existing agent instead of creating one.
    #[arg(long)]
    agent: Option<String>,
    /// Ignore any saved draft.
    #[arg(long)]
    fresh: bool,
    /// Tool picks: "SERVER=tool1,tool2" or "agent:ID[=NAME]".
    #[arg(long = "tool")]
    tools: Vec<String>,
    /// OpenAPI/Swagger document to offer as tools; named after the file.
    #[arg(long = "swagger")]
    swagger: Vec<std::path::PathBuf>,
    #[arg(long)]
    description: Option<String>,
    /// Input field as NAME[:TYPE].
    #[arg(long = "input")]
    inputs: Vec<String>,
    /// Output field as NAME[:TYPE].
    #[arg(long = "output")]
    outputs: Vec<String>,
    /// Composer provider; defaults to the draft's composer model.
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, JsonValue)>,
    #[arg(long)]
    built_in_tool: Option<String>,
    /// Save the agent under this name after generating.
    #[arg(long)]
    save: Option<String>,
}

#[derive(Debug, Subcommand)]
enum DraftAction {
    Show {
        #[arg(long)]
        agent: Option<String>,
    },
    Clear {
        #[arg(long)]
        agent: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum AgentsAction {
    List,
    Delete { id: String },
}

fn parse_param(s: &str) -> Result<(String, JsonValue), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| JsonValue::String(value.to_string()));
    Ok((name.trim().to_string(), value))
}

fn parse_field(s: &str) -> (String, JsonValue) {
    match s.split_once(':') {
        Some((name, ty)) => (name.trim().to_string(), JsonValue::String(ty.trim().to_string())),
        None => (s.trim().to_string(), JsonValue::String("string".into())),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn persistence(settings: &Settings) -> DraftPersistence {
    let storage = FileStorage::for_session(&settings.drafts.dir, settings.drafts.session.as_deref());
    DraftPersistence::new(Arc::new(storage))
}

fn configure_model(
    catalog: &ProviderCatalog,
    existing: Option<&ModelConfig>,
    provider: Option<&str>,
    model: Option<&str>,
    params: &[(String, JsonValue)],
    built_in_tool: Option<&str>,
) -> anyhow::Result<ModelConfig> {
    let mut dialog = ModelConfigDialog::open(catalog, existing);
    if let Some(p) = provider {
        dialog.select_provider(p)?;
    }
    if let Some(m) = model {
        dialog.select_model(m)?;
    }
    for (name, value) in params {
        if dialog.is_disabled(name) {
            tracing::info!("'{}' replaces a conflicting parameter", name);
        }
        dialog.set_parameter(name, value.clone())?;
    }
    if built_in_tool.is_some() {
        dialog.select_built_in_tool(built_in_tool)?;
    }
    Ok(dialog.finish()?)
}

async fn generate(
    settings: &Settings,
    backend: &HttpBackend,
    args: GenerateArgs,
) -> anyhow::Result<()> {
    let picks = args
        .tools
        .iter()
        .map(|t| ToolPick::parse(t).ok_or_else(|| anyhow!("invalid tool pick '{t}'")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let specs = args
        .swagger
        .iter()
        .map(|p| {
            let content = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string());
            Ok(SwaggerSpec { name, content })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let key = snapshot_key_for(args.agent.as_deref());
    let seed = match &args.agent {
        Some(id) => Some(
            backend
                .get_agent(id)
                .await
                .with_context(|| format!("loading agent {id}"))?
                .to_draft(),
        ),
        None => None,
    };
    let persistence = persistence(settings);
    let flow = WizardFlow::start(
        &persistence,
        key,
        StartOptions {
            fresh: args.fresh,
            seed,
        },
    );
    let store = flow.handle();

    flow.enter_screen(Screen::Tools);
    if !picks.is_empty() || !specs.is_empty() {
        store.update(|d| {
            apply_picks(d, &picks);
            for spec in specs {
                add_swagger_spec(d, spec);
            }
        })?;
    }

    flow.enter_screen(Screen::Describe);
    if let Some(desc) = args.description {
        store.set(DraftUpdate::Description(desc))?;
    }

    flow.enter_screen(Screen::Schema);
    if !args.inputs.is_empty() {
        store.set(DraftUpdate::InputSchema(args.inputs.iter().map(|s| parse_field(s)).collect()))?;
    }
    if !args.outputs.is_empty() {
        store.set(DraftUpdate::OutputSchema(args.outputs.iter().map(|s| parse_field(s)).collect()))?;
    }

    flow.enter_screen(Screen::Models);
    let catalog = backend.providers().await.context("loading providers")?;
    let existing = store.get(|d| d.composer_model_config.clone())?;
    let composer = configure_model(
        &catalog,
        existing.as_ref(),
        args.provider.as_deref(),
        args.model.as_deref(),
        &args.params,
        args.built_in_tool.as_deref(),
    )?;
    store.set(DraftUpdate::ComposerModelConfig(Some(composer)))?;

    flow.enter_screen(Screen::Code);
    wizard::generate_code(backend, &store, Some(&catalog)).await?;
    println!("{}", store.get(|d| d.generated_code.clone())?);

    if let Some(name) = args.save {
        flow.enter_screen(Screen::Save);
        let record = wizard::save_agent(backend, &store, args.agent.as_deref(), &name).await?;
        flow.finish_saved();
        eprintln!("saved agent '{}' ({})", record.name, record.id);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load()?;
    if let Some(url) = cli.api_url {
        settings.api.base_url = url;
    }
    if cli.session.is_some() {
        settings.drafts.session = cli.session;
    }
    if cli.new_session {
        let id = new_session_id();
        eprintln!("draft session: {id}");
        settings.drafts.session = Some(id);
    }
    init_tracing(&settings.logging);
    tracing::info!("agent-wizard home={}", settings.home.display());

    let backend = HttpBackend::new(
        &settings.api.base_url,
        settings.api.token.clone(),
        settings.api.timeout,
    )?;

    match cli.command {
        Command::Providers => {
            let catalog = backend.providers().await?;
            for (provider, spec) in catalog.providers() {
                for model in spec.models.keys() {
                    println!("{provider}/{model}");
                }
            }
        }
        Command::Defaults { provider, model } => {
            let catalog = backend.providers().await?;
            let spec = catalog
                .model(&provider, &model)
                .ok_or_else(|| anyhow!("unknown model {provider}/{model}"))?;
            print_json(&Reconciler::new(&spec.parameters).build_defaults())?;
        }
        Command::Chat {
            provider,
            model,
            params,
            tool,
            message,
        } => {
            let catalog = backend.providers().await?;
            let config = configure_model(
                &catalog,
                None,
                Some(&provider),
                Some(&model),
                &params,
                tool.as_deref(),
            )?;
            let reply = wizard::chat(
                &backend,
                &config,
                vec![ChatMessage::user(message)],
                settings.poll,
            )
            .await?;
            print_json(&reply)?;
        }
        Command::Generate(args) => generate(&settings, &backend, args).await?,
        Command::Draft { action } => {
            let persistence = persistence(&settings);
            match action {
                DraftAction::Show { agent } => {
                    let key = snapshot_key_for(agent.as_deref());
                    match persistence.load(&key) {
                        Some(draft) => print_json(&draft)?,
                        None => bail!("no saved draft for {key}"),
                    }
                }
                DraftAction::Clear { agent } => {
                    persistence.clear(&snapshot_key_for(agent.as_deref()));
                }
            }
        }
        Command::Agents { action } => match action {
            AgentsAction::List => {
                for agent in backend.list_agents().await? {
                    println!("{}\t{}", agent.id, agent.name);
                }
            }
            AgentsAction::Delete { id } => backend.delete_agent(&id).await?,
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

//! Layered settings: environment > `<home>/config.toml` > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use env_flags::env_flags;
use serde::Deserialize;

use crate::poll::PollOptions;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_POLL_DELAY_MS: u64 = 1000;
const DEFAULT_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Default, Deserialize)]
pub struct UserConfig {
    pub logging: Option<LoggingCfg>,
    pub api: Option<ApiCfg>,
    pub poll: Option<PollCfg>,
    pub drafts: Option<DraftsCfg>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingCfg {
    pub to_file: Option<bool>,
    pub dir: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub level: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiCfg {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollCfg {
    pub max_attempts: Option<u32>,
    pub delay_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DraftsCfg {
    pub dir: Option<String>,   // absolute paths preferred
    pub session: Option<String>,
}

pub fn load_user_config(home: &Path) -> anyhow::Result<Option<UserConfig>> {
    let path = home.join("config.toml");
    if !path.exists() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let cfg: UserConfig =
        toml::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(cfg))
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

/// Explicit home, else `<user home>/.agent-wizard`, else `./.agent-wizard`.
pub fn resolve_home(explicit: Option<&str>, user_home: Option<&str>) -> PathBuf {
    if let Some(h) = explicit.filter(|h| !h.is_empty()) {
        return expand_home(h);
    }
    if let Some(home) = user_home.filter(|h| !h.is_empty()) {
        return PathBuf::from(home).join(".agent-wizard");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".agent-wizard")
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub filter: String,
    pub json: bool,
    pub compact: bool,
    pub pretty: bool,
    pub to_file: bool,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DraftSettings {
    pub dir: PathBuf,
    pub session: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub home: PathBuf,
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub poll: PollOptions,
    pub drafts: DraftSettings,
}

env_flags! {
    /// Tracing filter, e.g. "info", "debug", or targets format.
    RUST_LOG: &str = "";
    /// Preferred filter env (alias). If set, overrides RUST_LOG.
    TRACING_FILTER: &str = "";
    /// Pretty formatting for logs (ignored if TRACING_JSON=true).
    TRACING_PRETTY: bool = false;
    /// Compact single-line formatting for logs (ignored if TRACING_JSON=true)
    TRACING_COMPACT: bool = true;
    /// JSON formatting for logs
    TRACING_JSON: bool = false;
    /// If true, also log to file under <AGENT_WIZARD_HOME>/logs or LOG_DIR
    LOG_TO_FILE: bool = true;
    /// Optional explicit log directory. Defaults to <AGENT_WIZARD_HOME>/logs
    LOG_DIR: &str = "";
    /// Home directory. Defaults to $HOME/.agent-wizard
    AGENT_WIZARD_HOME: &str = "";
    /// Backend base URL
    AGENT_WIZARD_API_URL: &str = DEFAULT_BASE_URL;
    /// Bearer token sent with every request
    AGENT_WIZARD_TOKEN: &str = "";
    /// Per-request timeout
    AGENT_WIZARD_TIMEOUT_SECS: u64 = DEFAULT_TIMEOUT_SECS;
    /// Ticket polling: maximum status queries
    AGENT_WIZARD_POLL_ATTEMPTS: u32 = DEFAULT_POLL_ATTEMPTS;
    /// Ticket polling: delay before each query
    AGENT_WIZARD_POLL_DELAY_MS: u64 = DEFAULT_POLL_DELAY_MS;
    /// Ticket polling: optional wall-clock limit (0 = none)
    AGENT_WIZARD_POLL_DEADLINE_MS: u64 = 0;
    /// Draft snapshot directory. Defaults to <AGENT_WIZARD_HOME>/drafts
    AGENT_WIZARD_DRAFTS_DIR: &str = "";
    /// Draft session id
    AGENT_WIZARD_SESSION: &str = "";
}

/// Environment values that were explicitly set. `None` defers to the
/// config file, then to defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub home: Option<String>,
    pub filter: Option<String>,
    pub json: Option<bool>,
    pub compact: Option<bool>,
    pub pretty: Option<bool>,
    pub to_file: Option<bool>,
    pub log_dir: Option<String>,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub poll_attempts: Option<u32>,
    pub poll_delay_ms: Option<u64>,
    pub poll_deadline_ms: Option<u64>,
    pub drafts_dir: Option<String>,
    pub session: Option<String>,
}

impl EnvOverrides {
    /// Read the process environment. Malformed typed values abort, as
    /// `env_flags` does.
    pub fn from_env() -> Self {
        let env_set = |k: &str| std::env::var_os(k).is_some();
        let text = |k: &str, v: &str| {
            (env_set(k) && !v.trim().is_empty()).then(|| v.trim().to_string())
        };
        Self {
            home: text("AGENT_WIZARD_HOME", *AGENT_WIZARD_HOME),
            filter: text("TRACING_FILTER", *TRACING_FILTER)
                .or_else(|| text("RUST_LOG", *RUST_LOG)),
            json: env_set("TRACING_JSON").then(|| *TRACING_JSON),
            compact: env_set("TRACING_COMPACT").then(|| *TRACING_COMPACT),
            pretty: env_set("TRACING_PRETTY").then(|| *TRACING_PRETTY),
            to_file: env_set("LOG_TO_FILE").then(|| *LOG_TO_FILE),
            log_dir: text("LOG_DIR", *LOG_DIR),
            base_url: text("AGENT_WIZARD_API_URL", *AGENT_WIZARD_API_URL),
            token: text("AGENT_WIZARD_TOKEN", *AGENT_WIZARD_TOKEN),
            timeout_secs: env_set("AGENT_WIZARD_TIMEOUT_SECS")
                .then(|| *AGENT_WIZARD_TIMEOUT_SECS),
            poll_attempts: env_set("AGENT_WIZARD_POLL_ATTEMPTS")
                .then(|| *AGENT_WIZARD_POLL_ATTEMPTS),
            poll_delay_ms: env_set("AGENT_WIZARD_POLL_DELAY_MS")
                .then(|| *AGENT_WIZARD_POLL_DELAY_MS),
            poll_deadline_ms: env_set("AGENT_WIZARD_POLL_DEADLINE_MS")
                .then(|| *AGENT_WIZARD_POLL_DEADLINE_MS),
            drafts_dir: text("AGENT_WIZARD_DRAFTS_DIR", *AGENT_WIZARD_DRAFTS_DIR),
            session: text("AGENT_WIZARD_SESSION", *AGENT_WIZARD_SESSION),
        }
    }
}

impl Settings {
    /// Resolve every setting from `env`, then `cfg`, then defaults.
    pub fn resolve(home: PathBuf, cfg: Option<&UserConfig>, env: &EnvOverrides) -> Self {
        let log = cfg.and_then(|c| c.logging.as_ref());
        let api = cfg.and_then(|c| c.api.as_ref());
        let poll = cfg.and_then(|c| c.poll.as_ref());
        let drafts = cfg.and_then(|c| c.drafts.as_ref());

        let logging = LoggingSettings {
            filter: env
                .filter
                .clone()
                .or_else(|| log.and_then(|l| l.level.clone()))
                .unwrap_or_else(|| "warn".to_string()),
            json: env.json.or(log.and_then(|l| l.json)).unwrap_or(false),
            compact: env.compact.or(log.and_then(|l| l.compact)).unwrap_or(true),
            pretty: env.pretty.or(log.and_then(|l| l.pretty)).unwrap_or(false),
            to_file: env.to_file.or(log.and_then(|l| l.to_file)).unwrap_or(true),
            dir: env
                .log_dir
                .clone()
                .or_else(|| log.and_then(|l| l.dir.clone()))
                .map(|d| expand_home(&d))
                .unwrap_or_else(|| home.join("logs")),
        };

        let api = ApiSettings {
            base_url: env
                .base_url
                .clone()
                .or_else(|| api.and_then(|a| a.base_url.clone()))
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token: env
                .token
                .clone()
                .or_else(|| api.and_then(|a| a.token.clone()))
                .filter(|t| !t.trim().is_empty()),
            timeout: Duration::from_secs(
                env.timeout_secs
                    .or(api.and_then(|a| a.timeout_secs))
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };

        let poll = PollOptions {
            max_attempts: env
                .poll_attempts
                .or(poll.and_then(|p| p.max_attempts))
                .unwrap_or(DEFAULT_POLL_ATTEMPTS)
                .max(1),
            delay: Duration::from_millis(
                env.poll_delay_ms
                    .or(poll.and_then(|p| p.delay_ms))
                    .unwrap_or(DEFAULT_POLL_DELAY_MS),
            ),
            deadline: env
                .poll_deadline_ms
                .or(poll.and_then(|p| p.deadline_ms))
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        };

        let drafts = DraftSettings {
            dir: env
                .drafts_dir
                .clone()
                .or_else(|| drafts.and_then(|d| d.dir.clone()))
                .map(|d| expand_home(&d))
                .unwrap_or_else(|| home.join("drafts")),
            session: env
                .session
                .clone()
                .or_else(|| drafts.and_then(|d| d.session.clone())),
        };

        Self {
            home,
            logging,
            api,
            poll,
            drafts,
        }
    }

    /// Resolve from the process environment and the home directory's config file.
    pub fn load() -> anyhow::Result<Self> {
        let env = EnvOverrides::from_env();
        let user_home = std::env::var("HOME").ok();
        let home = resolve_home(env.home.as_deref(), user_home.as_deref());
        let cfg = load_user_config(&home)?;
        Ok(Self::resolve(home, cfg.as_ref(), &env))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env_or_file() {
        let s = Settings::resolve(PathBuf::from("/h"), None, &EnvOverrides::default());
        assert_eq!(s.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.api.token, None);
        assert_eq!(s.poll.max_attempts, 60);
        assert_eq!(s.poll.delay, Duration::from_secs(1));
        assert_eq!(s.poll.deadline, None);
        assert_eq!(s.logging.dir, PathBuf::from("/h/logs"));
        assert_eq!(s.drafts.dir, PathBuf::from("/h/drafts"));
        assert!(s.logging.compact);
    }

    #[test]
    fn env_beats_file_beats_default() {
        let cfg: UserConfig = toml::from_str(
            r#"
            [logging]
            level = "debug"
            json = true

            [api]
            base_url = "https://agents.example.com"
            token = "file-token"

            [poll]
            max_attempts = 5
            delay_ms = 250
            deadline_ms = 10000

            [drafts]
            session = "s1"
            "#,
        )
        .expect("parse");
        let s = Settings::resolve(
            PathBuf::from("/h"),
            Some(&cfg),
            &EnvOverrides {
                token: Some("env-token".into()),
                json: Some(false),
                poll_attempts: Some(9),
                ..Default::default()
            },
        );
        assert_eq!(s.api.base_url, "https://agents.example.com");
        assert_eq!(s.api.token.as_deref(), Some("env-token"));
        assert_eq!(s.logging.filter, "debug");
        assert!(!s.logging.json);
        assert_eq!(s.poll.max_attempts, 9);
        assert_eq!(s.poll.delay, Duration::from_millis(250));
        assert_eq!(s.poll.deadline, Some(Duration::from_secs(10)));
        assert_eq!(s.drafts.session.as_deref(), Some("s1"));
    }

    #[test]
    fn unset_overrides_fall_through_to_file() {
        let cfg: UserConfig = toml::from_str(
            r#"
            [logging]
            to_file = false

            [poll]
            max_attempts = 0
            deadline_ms = 0
            "#,
        )
        .expect("parse");
        let s = Settings::resolve(
            PathBuf::from("/h"),
            Some(&cfg),
            &EnvOverrides {
                filter: Some("agent_wizard=trace".into()),
                ..Default::default()
            },
        );
        assert_eq!(s.logging.filter, "agent_wizard=trace");
        assert!(!s.logging.to_file);
        assert_eq!(s.poll.max_attempts, 1);
        assert_eq!(s.poll.deadline, None);
    }

    #[test]
    fn home_resolution() {
        assert_eq!(
            resolve_home(Some("/opt/aw"), Some("/u")),
            PathBuf::from("/opt/aw")
        );
        assert_eq!(resolve_home(Some(""), Some("/u")), PathBuf::from("/u/.agent-wizard"));
        assert_eq!(resolve_home(None, Some("/u")), PathBuf::from("/u/.agent-wizard"));
    }

    #[test]
    fn overrides_only_report_variables_that_are_set() {
        // Variables this test never sets resolve to `None`.
        let env = EnvOverrides::from_env();
        if std::env::var_os("AGENT_WIZARD_POLL_DEADLINE_MS").is_none() {
            assert_eq!(env.poll_deadline_ms, None);
        }
        if std::env::var_os("AGENT_WIZARD_DRAFTS_DIR").is_none() {
            assert_eq!(env.drafts_dir, None);
        }
    }

    #[test]
    fn loads_config_file_from_home() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_user_config(dir.path()).expect("load").is_none());
        std::fs::write(dir.path().join("config.toml"), "[api]\ntimeout_secs = 7\n")
            .expect("write");
        let cfg = load_user_config(dir.path()).expect("load").expect("some");
        assert_eq!(cfg.api.and_then(|a| a.timeout_secs), Some(7));
        std::fs::write(dir.path().join("config.toml"), "[api\n").expect("write");
        assert!(load_user_config(dir.path()).is_err());
    }
}

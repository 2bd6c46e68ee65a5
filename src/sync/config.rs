use crate::env_loader::HOME_ENV;
use crate::error::BibSyncError;
use crate::logging::LOG_ENV;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

const CONFIG_PATH_ENV: &str = "BIBSYNC_CONFIG_PATH";
const PAGE_SIZE_ENV: &str = "BIBSYNC_PAGE_SIZE";
const TIMEOUT_ENV: &str = "BIBSYNC_REQUEST_TIMEOUT_SECS";
const USER_AGENT_ENV: &str = "BIBSYNC_USER_AGENT";
const DRY_RUN_ENV: &str = "BIBSYNC_DRY_RUN";

/// An environment variable the binary reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvKey {
    pub name: &'static str,
    pub about: &'static str,
}

/// Every `BIBSYNC_*` variable, in the order the README documents them.
pub const ENV_KEYS: &[EnvKey] = &[
    EnvKey {
        name: CONFIG_PATH_ENV,
        about: "path of the TOML config file",
    },
    EnvKey {
        name: PAGE_SIZE_ENV,
        about: "posts requested per page",
    },
    EnvKey {
        name: TIMEOUT_ENV,
        about: "per-request HTTP timeout in seconds",
    },
    EnvKey {
        name: USER_AGENT_ENV,
        about: "User-Agent header sent to the account",
    },
    EnvKey {
        name: DRY_RUN_ENV,
        about: "plan only, never write to the account",
    },
    EnvKey {
        name: LOG_ENV,
        about: "tracing filter directive for the log stream",
    },
    EnvKey {
        name: HOME_ENV,
        about: "directory holding a fallback .env",
    },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub page_size: usize,
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("bibsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            request_timeout_secs: 60,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BibSyncConfig {
    pub remote: RemoteConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialBibSyncConfig {
    remote: Option<RemoteConfig>,
    run: Option<RunConfig>,
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_bool(var: &str, fallback: bool) -> bool {
    match env::var(var) {
        Ok(v) => match v.trim() {
            "1" | "true" | "TRUE" | "yes" | "on" => true,
            "0" | "false" | "FALSE" | "no" | "off" => false,
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &BibSyncConfig) -> Result<()> {
    if cfg.remote.page_size == 0 {
        return Err(BibSyncError::InvalidConfig("page size must be >= 1".to_string()).into());
    }
    if cfg.remote.request_timeout_secs == 0 {
        return Err(
            BibSyncError::InvalidConfig("request timeout must be >= 1 second".to_string()).into(),
        );
    }
    if cfg.remote.user_agent.trim().is_empty() {
        return Err(BibSyncError::InvalidConfig("user agent cannot be empty".to_string()).into());
    }
    Ok(())
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(CONFIG_PATH_ENV) {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let base = dirs::config_dir()?;
    Some(base.join("bibsync").join("bibsync.toml"))
}

fn merge_file_config(base: &mut BibSyncConfig) -> Result<()> {
    let Some(path) = resolve_config_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(&path)
        .map_err(|err| BibSyncError::InvalidConfig(format!("{}: {err}", path.display())))?;
    let parsed: PartialBibSyncConfig = toml::from_str(&raw)
        .map_err(|err| BibSyncError::InvalidConfig(format!("{}: {err}", path.display())))?;
    if let Some(remote) = parsed.remote {
        base.remote = remote;
    }
    if let Some(run) = parsed.run {
        base.run = run;
    }
    tracing::debug!(path = %path.display(), "merged config file");
    Ok(())
}

/// `BIBSYNC_*` variables that nothing in this build reads, usually typos.
pub fn unknown_env_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unknown = keys
        .into_iter()
        .filter(|key| key.starts_with("BIBSYNC_"))
        .filter(|key| !ENV_KEYS.iter().any(|known| known.name == key.as_str()))
        .collect::<Vec<_>>();
    unknown.sort();
    unknown
}

pub fn load_config() -> Result<BibSyncConfig> {
    for key in unknown_env_keys(env::vars().map(|(key, _)| key)) {
        tracing::warn!(key = %key, "ignoring unknown environment variable");
    }

    let mut cfg = BibSyncConfig::default();
    merge_file_config(&mut cfg)?;

    cfg.remote.page_size = env_or_usize(PAGE_SIZE_ENV, cfg.remote.page_size);
    cfg.remote.request_timeout_secs = env_or_u64(TIMEOUT_ENV, cfg.remote.request_timeout_secs);
    cfg.remote.user_agent = env_or_string(USER_AGENT_ENV, &cfg.remote.user_agent);
    cfg.run.dry_run = env_or_bool(DRY_RUN_ENV, cfg.run.dry_run);

    validate(&cfg)?;
    Ok(cfg)
}

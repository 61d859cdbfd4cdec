use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::sweep::Phase;

pub const DEFAULT_BASE_URL: &str = "https://api.trello.com/1";

/// Raw configuration as read from the file and environment. Every field is
/// optional here; [`AppConfig::validate`] decides what is required.
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub trello: TrelloConfig,
    #[serde(default)]
    pub sweep: SweepSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct TrelloConfig {
    pub api_key: Option<String>,
    pub token: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SweepSection {
    pub list_id: Option<String>,
    pub attachment_name: Option<String>,
    pub custom_field_id: Option<String>,
    pub rename_mode: Option<RenameMode>,
    pub phases: Option<Vec<Phase>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(try_from = "String")]
pub enum RenameMode {
    /// Keep only the text inside the first parenthesized group.
    Simple,
    /// Name from the description's first line, policy number into a custom field.
    #[default]
    Extract,
}

impl RenameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenameMode::Simple => "simple",
            RenameMode::Extract => "extract",
        }
    }
}

impl FromStr for RenameMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(RenameMode::Simple),
            "extract" => Ok(RenameMode::Extract),
            other => Err(ConfigError::Invalid {
                key: "rename_mode",
                message: format!("expected `simple` or `extract`, got `{other}`"),
            }),
        }
    }
}

impl TryFrom<String> for RenameMode {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Credentials and endpoint for the board service.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub token: String,
    pub base_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// What the sweep operates on and how.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub list_id: String,
    pub attachment_name: String,
    pub custom_field_id: Option<String>,
    pub rename_mode: RenameMode,
    pub phases: Vec<Phase>,
}

impl SweepConfig {
    pub fn is_enabled(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

/// Validated configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub credentials: Credentials,
    pub sweep: SweepConfig,
}

impl AppConfig {
    /// Overlay values from the environment. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ENV_API_KEY") {
            self.trello.api_key = Some(v);
        }
        if let Some(v) = lookup("ENV_API_TOKEN") {
            self.trello.token = Some(v);
        }
        if let Some(v) = lookup("TRELLO_BASE_URL") {
            self.trello.base_url = Some(v);
        }
        if let Some(v) = lookup("ENV_LIST_ID") {
            self.sweep.list_id = Some(v);
        }
        if let Some(v) = lookup("ATTACHMENT_NAME_TO_DELETE") {
            self.sweep.attachment_name = Some(v);
        }
        if let Some(v) = lookup("ENV_CUSTOM_FIELD_ID") {
            self.sweep.custom_field_id = Some(v);
        }
        if let Some(v) = lookup("RENAME_MODE") {
            self.sweep.rename_mode = Some(v.parse()?);
        }
        Ok(())
    }

    pub fn validate(self) -> Result<ResolvedConfig, ConfigError> {
        let api_key = required(self.trello.api_key, "api_key", "ENV_API_KEY", "trello")?;
        let token = required(self.trello.token, "token", "ENV_API_TOKEN", "trello")?;
        let base_url = non_empty(self.trello.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let list_id = required(self.sweep.list_id, "list_id", "ENV_LIST_ID", "sweep")?;
        let attachment_name = required(
            self.sweep.attachment_name,
            "attachment_name",
            "ATTACHMENT_NAME_TO_DELETE",
            "sweep",
        )?;
        let rename_mode = self.sweep.rename_mode.unwrap_or_default();
        let phases = match self.sweep.phases {
            Some(phases) => dedup_in_order(phases),
            None => Phase::ALL.to_vec(),
        };

        let custom_field_id = non_empty(self.sweep.custom_field_id);
        if rename_mode == RenameMode::Extract
            && phases.contains(&Phase::Rename)
            && custom_field_id.is_none()
        {
            return Err(ConfigError::Missing {
                key: "custom_field_id",
                env: "ENV_CUSTOM_FIELD_ID",
                section: "sweep",
            });
        }

        Ok(ResolvedConfig {
            credentials: Credentials {
                api_key,
                token,
                base_url,
            },
            sweep: SweepConfig {
                list_id,
                attachment_name,
                custom_field_id,
                rename_mode,
                phases,
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(
    value: Option<String>,
    key: &'static str,
    env: &'static str,
    section: &'static str,
) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing { key, env, section })
}

fn dedup_in_order(phases: Vec<Phase>) -> Vec<Phase> {
    let mut out = Vec::with_capacity(phases.len());
    for phase in phases {
        if !out.contains(&phase) {
            out.push(phase);
        }
    }
    // Phases always run in pipeline order regardless of how they were listed.
    out.sort_by_key(|p| p.order());
    out
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".card-sweep")
}

fn config_path() -> PathBuf {
    std::env::var_os("CARD_SWEEP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir().join("config.toml"))
}

/// Read the TOML file at `path`. A missing file yields an empty config.
pub fn load_file(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// File, then environment, then the CLI override; validated once.
pub fn load_config(mode_override: Option<RenameMode>) -> Result<ResolvedConfig, ConfigError> {
    let mut config = load_file(&config_path())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(mode) = mode_override {
        config.sweep.rename_mode = Some(mode);
    }
    config.validate()
}

//! Host configuration.
//!
//! Read from `~/.config/gdata/config.toml`, with `GDATA_*` environment
//! variables layered on top (`GDATA_DATA_DIR`, `GDATA_API__CALENDAR_BASE`, ...).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use gdata_core::host::{Capabilities, CalendarRegistration, GDATA_CALENDAR_TYPE};
use gdata_provider_google::Endpoints;
use gdata_provider_google::locator::{CALENDAR_API_BASE, TASKS_API_BASE};
use serde::Deserialize;

static DEFAULT_DATA_DIR: &str = "~/.local/share/gdata";
static DEFAULT_SESSION_DIR: &str = "~/.config/gdata/sessions";

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_DIR)
}

#[derive(Debug, Clone, Deserialize)]
pub struct GdataConfig {
    /// Item cache and preferences
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// One `<session>.token` file per signed-in session
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub calendars: Vec<CalendarEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_calendar_base")]
    pub calendar_base: String,
    #[serde(default = "default_tasks_base")]
    pub tasks_base: String,
}

fn default_calendar_base() -> String {
    CALENDAR_API_BASE.to_string()
}

fn default_tasks_base() -> String {
    TASKS_API_BASE.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            calendar_base: default_calendar_base(),
            tasks_base: default_tasks_base(),
        }
    }
}

impl ApiConfig {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            calendar_base: self.calendar_base.trim_end_matches('/').to_string(),
            tasks_base: self.tasks_base.trim_end_matches('/').to_string(),
        }
    }
}

/// A `[[calendars]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarEntry {
    pub id: String,
    /// Defaults to the calendar id
    pub cache_id: Option<String>,
    #[serde(rename = "type", default = "default_calendar_type")]
    pub calendar_type: String,
    pub url: String,
}

fn default_calendar_type() -> String {
    GDATA_CALENDAR_TYPE.to_string()
}

impl CalendarEntry {
    pub fn registration(&self) -> CalendarRegistration {
        CalendarRegistration {
            id: self.id.clone(),
            cache_id: self.cache_id.clone().unwrap_or_else(|| self.id.clone()),
            calendar_type: self.calendar_type.clone(),
            url: self.url.clone(),
            read_only: false,
            capabilities: Capabilities::default(),
        }
    }
}

impl GdataConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("gdata");
        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("GDATA").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config at {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config at {}", path.display()))
    }

    pub fn data_path(&self) -> PathBuf {
        expand(&self.data_dir)
    }

    pub fn session_path(&self) -> PathBuf {
        expand(&self.session_dir)
    }

    pub fn registrations(&self) -> Vec<CalendarRegistration> {
        self.calendars.iter().map(CalendarEntry::registration).collect()
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

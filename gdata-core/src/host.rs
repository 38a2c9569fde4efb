//! Interfaces to the host application.
//!
//! The engine never owns calendar registrations, the item cache or the
//! preference store; the host hands it implementations of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GdataResult;
use crate::item::LocalItem;

/// Calendar type tag handled by the Google provider.
pub const GDATA_CALENDAR_TYPE: &str = "gdata";

/// Host-side record of a calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarRegistration {
    pub id: String,
    /// Key of the host's local item cache for this calendar
    pub cache_id: String,
    #[serde(rename = "type")]
    pub calendar_type: String,
    /// Source locator the calendar was subscribed with
    pub url: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
}

/// Partial update of a registration; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
}

impl CalendarUpdate {
    pub fn read_only() -> Self {
        CalendarUpdate {
            read_only: Some(true),
            ..Default::default()
        }
    }

    pub fn organizer(organizer: Option<String>) -> Self {
        CalendarUpdate {
            capabilities: Some(Capabilities { organizer }),
            ..Default::default()
        }
    }
}

/// Calendar registrations plus the local item cache, keyed by cache id.
#[async_trait]
pub trait CalendarHost: Send + Sync {
    async fn calendar(&self, id: &str) -> GdataResult<Option<CalendarRegistration>>;

    async fn update_calendar(&self, id: &str, update: CalendarUpdate) -> GdataResult<()>;

    async fn item(&self, cache_id: &str, item_id: &str) -> GdataResult<Option<LocalItem>>;

    /// Drop every cached item of the calendar.
    async fn clear_items(&self, cache_id: &str) -> GdataResult<()>;

    /// Store an item, replacing any cached item with the same id.
    async fn create_item(&self, cache_id: &str, item: LocalItem) -> GdataResult<()>;

    async fn remove_item(&self, cache_id: &str, item_id: &str) -> GdataResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdleState {
    Active,
    Idle,
    Locked,
}

#[async_trait]
pub trait IdleMonitor: Send + Sync {
    async fn query_state(&self) -> IdleState;
}

/// Flat key/value settings storage.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> GdataResult<Option<serde_json::Value>>;

    async fn set(&self, key: &str, value: serde_json::Value) -> GdataResult<()>;

    async fn remove(&self, key: &str) -> GdataResult<()>;
}

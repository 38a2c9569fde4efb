//! Namespaced per-calendar preferences.
//!
//! Every calendar gets its own `calendars.<id>.<key>` namespace inside the
//! shared [`PreferenceStore`]. Sync state (tokens, floors) and the mirrored
//! calendar settings live there.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{GdataError, GdataResult};
use crate::host::PreferenceStore;

pub const EVENT_SYNC_TOKEN: &str = "eventSyncToken";
pub const TASKS_LAST_UPDATED: &str = "tasksLastUpdated";
pub const ACCESS_ROLE: &str = "settings.accessRole";
pub const DEFAULT_REMINDERS: &str = "settings.defaultReminders";
pub const TIME_ZONE: &str = "settings.timeZone";

/// Global toggle for asking the remote service to notify attendees.
pub const SEND_EVENT_NOTIFICATIONS: &str = "settings.sendEventNotifications";

/// A `tasksLastUpdated` floor older than this forces a full resync.
pub const FRESHNESS_HORIZON_DAYS: i64 = 7;

#[derive(Clone)]
pub struct CalendarPrefs {
    store: Arc<dyn PreferenceStore>,
    calendar_id: String,
}

impl CalendarPrefs {
    pub fn new(store: Arc<dyn PreferenceStore>, calendar_id: &str) -> Self {
        CalendarPrefs {
            store,
            calendar_id: calendar_id.to_string(),
        }
    }

    pub fn key(&self, name: &str) -> String {
        format!("calendars.{}.{}", self.calendar_id, name)
    }

    /// Read a preference. Values that don't deserialize as `T` read as absent.
    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> GdataResult<Option<T>> {
        let value = self.store.get(&self.key(name)).await?;
        Ok(value
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    pub async fn get_or<T: DeserializeOwned>(&self, name: &str, default: T) -> GdataResult<T> {
        Ok(self.get(name).await?.unwrap_or(default))
    }

    pub async fn set<T: Serialize>(&self, name: &str, value: &T) -> GdataResult<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(&self.key(name), value).await
    }

    pub async fn clear(&self, name: &str) -> GdataResult<()> {
        self.store.remove(&self.key(name)).await
    }

    pub fn store(&self) -> &Arc<dyn PreferenceStore> {
        &self.store
    }
}

/// Read the global attendee-notification toggle (defaults to off).
pub async fn send_event_notifications(store: &dyn PreferenceStore) -> GdataResult<bool> {
    Ok(store
        .get(SEND_EVENT_NOTIFICATIONS)
        .await?
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

/// Validate a stored `tasksLastUpdated` floor against the freshness horizon.
///
/// Unparseable values are treated like expired ones.
pub fn check_updated_min(raw: &str, now: DateTime<Utc>) -> GdataResult<DateTime<Utc>> {
    let floor = DateTime::parse_from_rfc3339(raw)
        .map_err(|_| GdataError::StalePreferenceWindow(raw.to_string()))?
        .with_timezone(&Utc);

    if now - floor > Duration::days(FRESHNESS_HORIZON_DAYS) {
        return Err(GdataError::StalePreferenceWindow(raw.to_string()));
    }
    Ok(floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPreferenceStore;

    #[tokio::test]
    async fn prefs_are_namespaced_per_calendar() {
        let store = Arc::new(MemoryPreferenceStore::default());
        let prefs = CalendarPrefs::new(store.clone(), "id1");

        assert_eq!(prefs.get_or("foo", "default".to_string()).await.unwrap(), "default");
        assert_eq!(prefs.get::<String>("foo").await.unwrap(), None);

        prefs.set("foo", &"bar").await.unwrap();
        assert_eq!(
            store.get("calendars.id1.foo").await.unwrap(),
            Some(serde_json::json!("bar"))
        );
        assert_eq!(prefs.get_or("foo", "default".to_string()).await.unwrap(), "bar");

        prefs.clear("foo").await.unwrap();
        assert_eq!(prefs.get::<String>("foo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn notification_toggle_defaults_off() {
        let store = MemoryPreferenceStore::default();
        assert!(!send_event_notifications(&store).await.unwrap());

        store
            .set(SEND_EVENT_NOTIFICATIONS, serde_json::json!(true))
            .await
            .unwrap();
        assert!(send_event_notifications(&store).await.unwrap());
    }

    #[test]
    fn updated_min_within_horizon_is_kept() {
        let now = Utc::now();
        let recent = (now - Duration::days(1)).to_rfc3339();
        let floor = check_updated_min(&recent, now).expect("Should be fresh");
        assert_eq!(floor.to_rfc3339(), recent);
    }

    #[test]
    fn updated_min_older_than_horizon_is_stale() {
        let now = Utc::now();
        let old = (now - Duration::days(8)).to_rfc3339();
        assert!(matches!(
            check_updated_min(&old, now),
            Err(GdataError::StalePreferenceWindow(_))
        ));
        assert!(matches!(
            check_updated_min("not a date", now),
            Err(GdataError::StalePreferenceWindow(_))
        ));
    }
}

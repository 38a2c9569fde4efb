//! In-memory host implementations, for tests and embedders without their
//! own stores.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{GdataError, GdataResult};
use crate::host::{
    CalendarHost, CalendarRegistration, CalendarUpdate, IdleMonitor, IdleState, PreferenceStore,
};
use crate::item::LocalItem;

#[derive(Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemoryPreferenceStore {
    pub async fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.values.lock().await.clone()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> GdataResult<Option<serde_json::Value>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> GdataResult<()> {
        self.values.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> GdataResult<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
}

/// Calendar host keeping registrations and items in maps. Every update and
/// cache clear is also recorded so callers can inspect what happened.
#[derive(Default)]
pub struct MemoryCalendarHost {
    calendars: Mutex<HashMap<String, CalendarRegistration>>,
    items: Mutex<HashMap<String, BTreeMap<String, LocalItem>>>,
    updates: Mutex<Vec<(String, CalendarUpdate)>>,
    clears: Mutex<Vec<String>>,
}

impl MemoryCalendarHost {
    pub fn new(calendars: impl IntoIterator<Item = CalendarRegistration>) -> Self {
        let calendars = calendars
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect::<HashMap<_, _>>();
        MemoryCalendarHost {
            calendars: Mutex::new(calendars),
            ..Default::default()
        }
    }

    pub async fn items(&self, cache_id: &str) -> Vec<LocalItem> {
        self.items
            .lock()
            .await
            .get(cache_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn updates(&self) -> Vec<(String, CalendarUpdate)> {
        self.updates.lock().await.clone()
    }

    /// Cache ids cleared so far, in call order.
    pub async fn clears(&self) -> Vec<String> {
        self.clears.lock().await.clone()
    }
}

#[async_trait]
impl CalendarHost for MemoryCalendarHost {
    async fn calendar(&self, id: &str) -> GdataResult<Option<CalendarRegistration>> {
        Ok(self.calendars.lock().await.get(id).cloned())
    }

    async fn update_calendar(&self, id: &str, update: CalendarUpdate) -> GdataResult<()> {
        let mut calendars = self.calendars.lock().await;
        let calendar = calendars
            .get_mut(id)
            .ok_or_else(|| GdataError::CalendarNotFound(id.to_string()))?;
        if let Some(read_only) = update.read_only {
            calendar.read_only = read_only;
        }
        if let Some(ref capabilities) = update.capabilities {
            calendar.capabilities = capabilities.clone();
        }
        self.updates.lock().await.push((id.to_string(), update));
        Ok(())
    }

    async fn item(&self, cache_id: &str, item_id: &str) -> GdataResult<Option<LocalItem>> {
        Ok(self
            .items
            .lock()
            .await
            .get(cache_id)
            .and_then(|items| items.get(item_id))
            .cloned())
    }

    async fn clear_items(&self, cache_id: &str) -> GdataResult<()> {
        self.items.lock().await.remove(cache_id);
        self.clears.lock().await.push(cache_id.to_string());
        Ok(())
    }

    async fn create_item(&self, cache_id: &str, item: LocalItem) -> GdataResult<()> {
        self.items
            .lock()
            .await
            .entry(cache_id.to_string())
            .or_default()
            .insert(item.id.clone(), item);
        Ok(())
    }

    async fn remove_item(&self, cache_id: &str, item_id: &str) -> GdataResult<()> {
        if let Some(items) = self.items.lock().await.get_mut(cache_id) {
            items.remove(item_id);
        }
        Ok(())
    }
}

/// Idle monitor reporting whatever state it was last set to.
pub struct FixedIdleMonitor {
    state: Mutex<IdleState>,
}

impl FixedIdleMonitor {
    pub fn new(state: IdleState) -> Self {
        FixedIdleMonitor {
            state: Mutex::new(state),
        }
    }

    pub async fn set(&self, state: IdleState) {
        *self.state.lock().await = state;
    }
}

impl Default for FixedIdleMonitor {
    fn default() -> Self {
        FixedIdleMonitor::new(IdleState::Active)
    }
}

#[async_trait]
impl IdleMonitor for FixedIdleMonitor {
    async fn query_state(&self) -> IdleState {
        *self.state.lock().await
    }
}

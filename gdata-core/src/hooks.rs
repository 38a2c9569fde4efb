//! Lifecycle hooks and the in-process event bus that routes them.
//!
//! The host emits one [`HookEvent`] per item mutation or sync trigger for a
//! calendar; listeners registered per [`HookKind`] receive the calendar's
//! registration together with the event.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GdataResult;
use crate::host::CalendarRegistration;
use crate::item::LocalItem;

/// Counters for one completed sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub events_applied: usize,
    pub events_removed: usize,
    pub tasks_applied: usize,
    pub tasks_removed: usize,
    /// The local cache was cleared during this pass
    pub cache_cleared: bool,
}

impl SyncStats {
    pub fn total(&self) -> usize {
        self.events_applied + self.events_removed + self.tasks_applied + self.tasks_removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// The user was idle; nothing was fetched
    SkippedIdle,
    Completed(SyncStats),
}

/// Entry points a calendar provider exposes to the host.
#[async_trait]
pub trait ProviderHooks: Send + Sync {
    async fn on_init(&self) -> GdataResult<()>;

    async fn on_sync(&self) -> GdataResult<SyncOutcome>;

    async fn on_reset_sync(&self) -> GdataResult<()>;

    /// Create the item remotely; returns the item as the remote now sees it.
    async fn on_item_created(&self, item: &LocalItem) -> GdataResult<LocalItem>;

    async fn on_item_updated(&self, item: &LocalItem, old: &LocalItem) -> GdataResult<LocalItem>;

    async fn on_item_removed(&self, item: &LocalItem) -> GdataResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Init,
    Sync,
    ResetSync,
    ItemCreated,
    ItemUpdated,
    ItemRemoved,
}

impl HookKind {
    pub const ALL: [HookKind; 6] = [
        HookKind::Init,
        HookKind::Sync,
        HookKind::ResetSync,
        HookKind::ItemCreated,
        HookKind::ItemUpdated,
        HookKind::ItemRemoved,
    ];
}

#[derive(Debug, Clone)]
pub enum HookEvent {
    Init,
    Sync,
    ResetSync,
    ItemCreated(LocalItem),
    ItemUpdated { item: LocalItem, old: LocalItem },
    ItemRemoved(LocalItem),
}

impl HookEvent {
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::Init => HookKind::Init,
            HookEvent::Sync => HookKind::Sync,
            HookEvent::ResetSync => HookKind::ResetSync,
            HookEvent::ItemCreated(_) => HookKind::ItemCreated,
            HookEvent::ItemUpdated { .. } => HookKind::ItemUpdated,
            HookEvent::ItemRemoved(_) => HookKind::ItemRemoved,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HookOutcome {
    Done,
    Synced(SyncOutcome),
    Item(LocalItem),
}

/// Call the hook matching `event` on `hooks`.
pub async fn dispatch(hooks: &dyn ProviderHooks, event: HookEvent) -> GdataResult<HookOutcome> {
    match event {
        HookEvent::Init => hooks.on_init().await.map(|_| HookOutcome::Done),
        HookEvent::Sync => hooks.on_sync().await.map(HookOutcome::Synced),
        HookEvent::ResetSync => hooks.on_reset_sync().await.map(|_| HookOutcome::Done),
        HookEvent::ItemCreated(item) => hooks.on_item_created(&item).await.map(HookOutcome::Item),
        HookEvent::ItemUpdated { item, old } => hooks
            .on_item_updated(&item, &old)
            .await
            .map(HookOutcome::Item),
        HookEvent::ItemRemoved(item) => hooks.on_item_removed(&item).await.map(|_| HookOutcome::Done),
    }
}

#[async_trait]
pub trait HookListener: Send + Sync {
    async fn handle(
        &self,
        calendar: &CalendarRegistration,
        event: HookEvent,
    ) -> GdataResult<HookOutcome>;
}

/// Where providers register their listeners.
pub trait EventBus: Send + Sync {
    fn add_listener(&self, kind: HookKind, listener: Arc<dyn HookListener>);
}

/// Event bus for hosts living in the same process as the engine.
#[derive(Default)]
pub struct LocalBus {
    listeners: Mutex<HashMap<HookKind, Vec<Arc<dyn HookListener>>>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self, kind: HookKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// The map is only touched by single pushes and lookups, so it stays
    /// consistent even when the lock is poisoned.
    fn lock(&self) -> MutexGuard<'_, HashMap<HookKind, Vec<Arc<dyn HookListener>>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an event to every listener of its kind, in registration order.
    /// Stops at the first listener error.
    pub async fn emit(
        &self,
        calendar: &CalendarRegistration,
        event: HookEvent,
    ) -> GdataResult<Vec<HookOutcome>> {
        let listeners = self.lock().get(&event.kind()).cloned().unwrap_or_default();
        tracing::debug!(calendar = %calendar.id, kind = ?event.kind(), listeners = listeners.len(), "emit");

        let mut outcomes = Vec::with_capacity(listeners.len());
        for listener in listeners {
            outcomes.push(listener.handle(calendar, event.clone()).await?);
        }
        Ok(outcomes)
    }
}

impl EventBus for LocalBus {
    fn add_listener(&self, kind: HookKind, listener: Arc<dyn HookListener>) {
        self.lock().entry(kind).or_default().push(listener);
    }
}

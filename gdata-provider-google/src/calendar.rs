//! Per-calendar sync object and its single-item write path.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gdata_core::host::{CalendarHost, CalendarRegistration, CalendarUpdate, IdleMonitor, PreferenceStore};
use gdata_core::prefs::{
    self, CalendarPrefs, DEFAULT_REMINDERS, EVENT_SYNC_TOKEN, TASKS_LAST_UPDATED, TIME_ZONE,
};
use gdata_core::{GdataError, GdataResult, ItemKind, LocalItem, ProviderHooks, SyncOutcome};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::concurrency::{Precondition, WriteOp, interpret_write, with_notifications};
use crate::locator::{CalendarNames, Endpoints, parse_locator};
use crate::request::{ApiClient, ApiRequest, Method};
use crate::sync;
use crate::translate::{TranslateContext, to_local, to_remote};
use crate::types::ReminderOverride;

/// Collaborators shared by every calendar of a process.
#[derive(Clone)]
pub struct EngineContext {
    pub host: Arc<dyn CalendarHost>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub idle: Arc<dyn IdleMonitor>,
    pub client: ApiClient,
    pub endpoints: Endpoints,
}

pub struct GoogleCalendar {
    pub id: String,
    pub cache_id: String,
    locator: String,
    names: RwLock<Option<CalendarNames>>,
    pub(crate) prefs: CalendarPrefs,
    pub(crate) ctx: EngineContext,
}

impl GoogleCalendar {
    pub fn new(registration: &CalendarRegistration, ctx: EngineContext) -> Self {
        GoogleCalendar {
            id: registration.id.clone(),
            cache_id: registration.cache_id.clone(),
            locator: registration.url.clone(),
            names: RwLock::new(None),
            prefs: CalendarPrefs::new(ctx.prefs.clone(), &registration.id),
            ctx,
        }
    }

    pub fn prefs(&self) -> &CalendarPrefs {
        &self.prefs
    }

    /// Remote names of this calendar, resolved from the locator on first use.
    pub async fn names(&self) -> GdataResult<CalendarNames> {
        if let Some(ref names) = *self.names.read().await {
            return Ok(names.clone());
        }

        let parsed = parse_locator(&self.locator);
        let user_known = match parsed.known_user_key() {
            Some(key) => self.ctx.prefs.get(&key).await?.is_some(),
            None => false,
        };
        let names = parsed.resolve(user_known);

        *self.names.write().await = Some(names.clone());
        Ok(names)
    }

    pub async fn calendar_name(&self) -> GdataResult<Option<String>> {
        Ok(self.names().await?.calendar)
    }

    pub async fn tasklist_name(&self) -> GdataResult<Option<String>> {
        Ok(self.names().await?.tasklist)
    }

    pub async fn events_uri(&self, parts: &[&str]) -> GdataResult<Option<String>> {
        Ok(self.names().await?.events_uri(&self.ctx.endpoints, parts))
    }

    pub async fn tasks_uri(&self, parts: &[&str]) -> GdataResult<Option<String>> {
        Ok(self.names().await?.tasks_uri(&self.ctx.endpoints, parts))
    }

    pub fn users_uri(&self, parts: &[&str]) -> String {
        CalendarNames::users_uri(&self.ctx.endpoints, parts)
    }

    pub(crate) async fn session_id(&self) -> GdataResult<String> {
        Ok(self.names().await?.session_id.unwrap_or_else(|| self.id.clone()))
    }

    fn unresolved(&self) -> GdataError {
        GdataError::UnresolvedAddress(self.id.clone())
    }

    /// The stored tasks floor, or `None` when there is none.
    ///
    /// A floor past the freshness horizon is evicted together with the event
    /// sync token and the local cache, so the next fetches run in full.
    pub async fn updated_min(&self) -> GdataResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.prefs.get::<String>(TASKS_LAST_UPDATED).await? else {
            return Ok(None);
        };
        match prefs::check_updated_min(&raw, Utc::now()) {
            Ok(floor) => Ok(Some(floor)),
            Err(e) if e.is_recoverable() => {
                info!(calendar = %self.id, floor = %raw, "Last update floor expired, resetting cache");
                self.prefs.clear(TASKS_LAST_UPDATED).await?;
                self.prefs.clear(EVENT_SYNC_TOKEN).await?;
                self.ctx.host.clear_items(&self.cache_id).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop sync state and the local cache.
    pub(crate) async fn reset_cache(&self) -> GdataResult<()> {
        self.prefs.clear(EVENT_SYNC_TOKEN).await?;
        self.prefs.clear(TASKS_LAST_UPDATED).await?;
        self.ctx.host.clear_items(&self.cache_id).await
    }

    /// Translation defaults mirrored from the calendar metadata.
    pub(crate) async fn translate_context(&self) -> GdataResult<TranslateContext> {
        let default_reminders = self
            .prefs
            .get::<String>(DEFAULT_REMINDERS)
            .await?
            .and_then(|raw| serde_json::from_str::<Vec<ReminderOverride>>(&raw).ok())
            .unwrap_or_default();
        let default_timezone = self.prefs.get::<String>(TIME_ZONE).await?;
        Ok(TranslateContext {
            default_reminders,
            default_timezone,
        })
    }

    /// Collection URI for writes of this kind, or `UnresolvedAddress`.
    async fn collection_uri(&self, kind: ItemKind, parts: &[&str]) -> GdataResult<String> {
        let uri = match kind {
            ItemKind::Event => self.events_uri(parts).await?,
            ItemKind::Task => self.tasks_uri(parts).await?,
        };
        uri.ok_or_else(|| self.unresolved())
    }

    async fn send_notifications(&self, kind: ItemKind) -> GdataResult<bool> {
        Ok(kind == ItemKind::Event && prefs::send_event_notifications(self.ctx.prefs.as_ref()).await?)
    }

    async fn write(
        &self,
        op: WriteOp,
        kind: ItemKind,
        resource: &str,
        request: ApiRequest,
    ) -> GdataResult<Option<Value>> {
        let session = self.session_id().await?;
        let url = request.url.clone();
        let response = self.ctx.client.send(&session, request).await?;
        interpret_write(op, resource, &url, &response).inspect_err(|e| {
            warn!(calendar = %self.id, kind = %kind, resource, error = %e, "Write failed");
        })
    }

    async fn item_from_response(
        &self,
        response: Option<Value>,
        kind: ItemKind,
        fallback: &LocalItem,
    ) -> GdataResult<LocalItem> {
        match response {
            Some(resource) => to_local(resource, kind, &self.translate_context().await?),
            None => Ok(fallback.clone()),
        }
    }
}

#[async_trait]
impl ProviderHooks for GoogleCalendar {
    async fn on_init(&self) -> GdataResult<()> {
        let names = self.names().await?;
        match names.calendar {
            Some(calendar) => {
                debug!(calendar = %self.id, remote = %calendar, tasklist = ?names.tasklist, "Resolved remote names");
                self.ctx
                    .host
                    .update_calendar(&self.id, CalendarUpdate::organizer(Some(calendar)))
                    .await
            }
            None => {
                warn!(calendar = %self.id, locator = %self.locator, "Calendar has no resolvable remote address");
                Ok(())
            }
        }
    }

    async fn on_sync(&self) -> GdataResult<SyncOutcome> {
        sync::run(self).await
    }

    async fn on_reset_sync(&self) -> GdataResult<()> {
        info!(calendar = %self.id, "Resetting sync state");
        self.reset_cache().await
    }

    async fn on_item_created(&self, item: &LocalItem) -> GdataResult<LocalItem> {
        let kind = item.kind()?;
        let uri = self.collection_uri(kind, &[kind_collection(kind)]).await?;
        let body = to_remote(item, None)?;

        let mut request = ApiRequest::new(Method::Post, &uri).with_json(&Value::Object(body));
        request = with_notifications(request, self.send_notifications(kind).await?);
        if kind == ItemKind::Task {
            if let Some(parent) = item.parent_id() {
                request = request.with_query("parent", parent);
            }
        }

        let response = self.write(WriteOp::Create, kind, &item.id, request).await?;
        self.item_from_response(response, kind, item).await
    }

    async fn on_item_updated(&self, item: &LocalItem, old: &LocalItem) -> GdataResult<LocalItem> {
        let kind = item.kind()?;
        let uri = self
            .collection_uri(kind, &[kind_collection(kind), old.remote_id()])
            .await?;
        let patch = to_remote(item, Some(old))?;

        let mut request = ApiRequest::new(Method::Patch, &uri).with_json(&Value::Object(patch));
        request = Precondition::for_existing(old.etag()).apply(request);
        request = with_notifications(request, self.send_notifications(kind).await?);

        let response = self.write(WriteOp::Update, kind, old.remote_id(), request).await?;
        self.item_from_response(response, kind, item).await
    }

    async fn on_item_removed(&self, item: &LocalItem) -> GdataResult<()> {
        let kind = item.kind()?;
        let uri = self
            .collection_uri(kind, &[kind_collection(kind), item.remote_id()])
            .await?;

        let mut request = ApiRequest::new(Method::Delete, &uri);
        request = Precondition::for_existing(item.etag()).apply(request);
        request = with_notifications(request, self.send_notifications(kind).await?);

        self.write(WriteOp::Delete, kind, item.remote_id(), request).await?;
        Ok(())
    }
}

fn kind_collection(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Event => "events",
        ItemKind::Task => "tasks",
    }
}

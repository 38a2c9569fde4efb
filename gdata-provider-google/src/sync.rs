//! One sync pass for a calendar.
//!
//! idle check → calendar metadata → event pages → task pages. Each page is
//! applied to the host before the next one is requested, and the event sync
//! token and the tasks floor are only persisted once every page of their
//! fetch has been applied. A failed pass leaves both at their last good value.

use chrono::{DateTime, SecondsFormat, Utc};
use gdata_core::hooks::{SyncOutcome, SyncStats};
use gdata_core::host::{CalendarUpdate, IdleState};
use gdata_core::prefs::{EVENT_SYNC_TOKEN, TASKS_LAST_UPDATED};
use gdata_core::{GdataError, GdataResult};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::calendar::GoogleCalendar;
use crate::occurrences::{merge_master, merge_occurrence};
use crate::request::{ApiRequest, ApiResponse, decode_body};
use crate::translate::{FromGoogle, TranslateContext};
use crate::types::{
    CalendarListEntry, EventList, FREE_BUSY_READER, GoogleEvent, MIRRORED_CALENDAR_KEYS, TaskList,
};

const EVENTS_PAGE_SIZE: &str = "1000";
const TASKS_PAGE_SIZE: &str = "100";

pub(crate) async fn run(calendar: &GoogleCalendar) -> GdataResult<SyncOutcome> {
    if calendar.ctx.idle.query_state().await != IdleState::Active {
        info!(calendar = %calendar.id, "Skipping refresh since user is idle");
        return Ok(SyncOutcome::SkippedIdle);
    }

    let names = calendar.names().await?;
    let Some(remote_calendar) = names.calendar.clone() else {
        return Err(GdataError::UnresolvedAddress(calendar.id.clone()));
    };

    let mut stats = SyncStats::default();

    // Expired floors are evicted before anything is fetched
    let mut updated_min = calendar.updated_min().await?;

    sync_metadata(calendar, &remote_calendar).await?;
    let ctx = calendar.translate_context().await?;

    if sync_events(calendar, &ctx, &mut stats).await? {
        // The recovery cleared the shared cache, tasks included
        updated_min = None;
    }
    if names.tasklist.is_some() {
        sync_tasks(calendar, &ctx, updated_min, &mut stats).await?;
    }

    info!(
        calendar = %calendar.id,
        events = stats.events_applied,
        tasks = stats.tasks_applied,
        removed = stats.events_removed + stats.tasks_removed,
        "Sync complete"
    );
    Ok(SyncOutcome::Completed(stats))
}

async fn get(calendar: &GoogleCalendar, request: ApiRequest) -> GdataResult<ApiResponse> {
    let session = calendar.session_id().await?;
    calendar.ctx.client.send(&session, request).await
}

/// Mirror the calendar-list entry into `settings.*` and demote free/busy
/// calendars to read-only.
async fn sync_metadata(calendar: &GoogleCalendar, remote_calendar: &str) -> GdataResult<()> {
    let uri = calendar.users_uri(&["calendarList", remote_calendar]);
    let response = get(calendar, ApiRequest::get(&uri)).await?;
    let body = decode_body(&uri, &response)?.unwrap_or_else(|| Value::Object(Default::default()));

    for key in MIRRORED_CALENDAR_KEYS {
        let pref = format!("settings.{}", key);
        match body.get(*key) {
            Some(value) if !value.is_null() => {
                let value = if *key == "defaultReminders" {
                    Value::String(value.to_string())
                } else {
                    value.clone()
                };
                calendar.prefs.set(&pref, &value).await?;
            }
            _ => calendar.prefs.clear(&pref).await?,
        }
    }

    let entry: CalendarListEntry =
        serde_json::from_value(body).map_err(|e| GdataError::Decode(e.to_string()))?;
    if entry.access_role.as_deref() == Some(FREE_BUSY_READER) {
        info!(calendar = %calendar.id, "Free/busy access only, marking read-only");
        calendar
            .ctx
            .host
            .update_calendar(&calendar.id, CalendarUpdate::read_only())
            .await?;
    }
    Ok(())
}

/// Fetch events, recovering once from a gone sync token. Returns whether
/// the local cache was cleared along the way.
async fn sync_events(
    calendar: &GoogleCalendar,
    ctx: &TranslateContext,
    stats: &mut SyncStats,
) -> GdataResult<bool> {
    let token: Option<String> = calendar.prefs.get(EVENT_SYNC_TOKEN).await?;

    match fetch_events(calendar, ctx, token.as_deref(), stats).await {
        Err(GdataError::StaleSyncToken(_)) => {
            warn!(calendar = %calendar.id, "Sync token no longer valid, clearing cache for a full resync");
            calendar.reset_cache().await?;
            stats.cache_cleared = true;
            // A second gone response here is not retried
            fetch_events(calendar, ctx, None, stats).await?;
            Ok(true)
        }
        other => other.map(|_| false),
    }
}

async fn fetch_events(
    calendar: &GoogleCalendar,
    ctx: &TranslateContext,
    sync_token: Option<&str>,
    stats: &mut SyncStats,
) -> GdataResult<()> {
    let uri = calendar
        .events_uri(&["events"])
        .await?
        .ok_or_else(|| GdataError::UnresolvedAddress(calendar.id.clone()))?;

    let mut page_token: Option<String> = None;
    let mut next_sync_token: Option<String> = None;
    let mut page = 0;

    loop {
        let mut request = ApiRequest::get(&uri).with_query("maxResults", EVENTS_PAGE_SIZE);
        if let Some(token) = sync_token {
            request = request.with_query("syncToken", token);
        }
        if let Some(ref token) = page_token {
            request = request.with_query("pageToken", token.clone());
        }

        let response = get(calendar, request).await?;
        if response.status == 410 {
            return Err(GdataError::StaleSyncToken(calendar.id.clone()));
        }
        let body = decode_body(&uri, &response)?.unwrap_or_else(|| Value::Object(Default::default()));
        let list: EventList =
            serde_json::from_value(body).map_err(|e| GdataError::Decode(e.to_string()))?;

        page += 1;
        debug!(calendar = %calendar.id, page, items = list.items.len(), incremental = sync_token.is_some(), "Applying event page");
        for event in list.items {
            apply_event(calendar, ctx, event, stats).await?;
        }

        if list.next_sync_token.is_some() {
            next_sync_token = list.next_sync_token;
        }
        match list.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    if let Some(token) = next_sync_token {
        calendar.prefs.set(EVENT_SYNC_TOKEN, &token).await?;
    }
    Ok(())
}

async fn apply_event(
    calendar: &GoogleCalendar,
    ctx: &TranslateContext,
    event: GoogleEvent,
    stats: &mut SyncStats,
) -> GdataResult<()> {
    let host = &calendar.ctx.host;
    let cancelled = event.status.as_deref() == Some("cancelled");
    let is_occurrence = event.recurring_event_id.is_some() && event.original_start_time.is_some();

    // Deletions often carry only the id; cancelled occurrences only point at
    // their series.
    let uid = match event.ical_uid.clone() {
        Some(uid) => Some(uid),
        None if is_occurrence => {
            cached_uid(calendar, event.recurring_event_id.as_deref()).await?
        }
        None => cached_uid(calendar, event.id.as_deref()).await?,
    };
    let Some(uid) = uid else {
        debug!(calendar = %calendar.id, id = ?event.id, "Skipping event without a resolvable UID");
        return Ok(());
    };

    if !is_occurrence {
        if cancelled {
            if host.item(&calendar.cache_id, &uid).await?.is_some() {
                host.remove_item(&calendar.cache_id, &uid).await?;
                stats.events_removed += 1;
            }
            return Ok(());
        }
        let master = event.from_google(ctx)?;
        let existing = host.item(&calendar.cache_id, &uid).await?;
        host.create_item(&calendar.cache_id, merge_master(existing, master))
            .await?;
        stats.events_applied += 1;
        return Ok(());
    }

    let series_id = event.recurring_event_id.clone();
    let mut occurrence = event.from_google(ctx)?;
    occurrence.id = uid.clone();
    occurrence.metadata.path = series_id;

    let existing = host.item(&calendar.cache_id, &uid).await?;
    let Some(item) = merge_occurrence(existing, occurrence, cancelled) else {
        return Ok(());
    };
    host.create_item(&calendar.cache_id, item).await?;
    if cancelled {
        stats.events_removed += 1;
    } else {
        stats.events_applied += 1;
    }
    Ok(())
}

/// Cache id for a remote event id that came without an iCalUID. Events
/// created on the remote get `<id>@google.com` as their UID.
async fn cached_uid(calendar: &GoogleCalendar, remote_id: Option<&str>) -> GdataResult<Option<String>> {
    let Some(remote_id) = remote_id else {
        return Ok(None);
    };
    let derived = format!("{}@google.com", remote_id);
    for candidate in [derived.as_str(), remote_id] {
        if calendar.ctx.host.item(&calendar.cache_id, candidate).await?.is_some() {
            return Ok(Some(candidate.to_string()));
        }
    }
    Ok(Some(derived))
}

async fn sync_tasks(
    calendar: &GoogleCalendar,
    ctx: &TranslateContext,
    updated_min: Option<DateTime<Utc>>,
    stats: &mut SyncStats,
) -> GdataResult<()> {
    let Some(uri) = calendar.tasks_uri(&["tasks"]).await? else {
        return Ok(());
    };

    let mut page_token: Option<String> = None;
    let mut server_time: Option<DateTime<Utc>> = None;

    loop {
        let mut request = ApiRequest::get(&uri)
            .with_query("maxResults", TASKS_PAGE_SIZE)
            .with_query("showCompleted", "true")
            .with_query("showDeleted", "true")
            .with_query("showHidden", "true");
        if let Some(floor) = updated_min {
            request = request.with_query("updatedMin", floor.to_rfc3339_opts(SecondsFormat::Millis, true));
        }
        if let Some(ref token) = page_token {
            request = request.with_query("pageToken", token.clone());
        }

        let response = get(calendar, request).await?;
        if server_time.is_none() {
            server_time = response_date(&response);
        }
        let body = decode_body(&uri, &response)?.unwrap_or_else(|| Value::Object(Default::default()));
        let list: TaskList =
            serde_json::from_value(body).map_err(|e| GdataError::Decode(e.to_string()))?;

        debug!(calendar = %calendar.id, items = list.items.len(), incremental = updated_min.is_some(), "Applying task page");
        for task in list.items {
            if task.deleted == Some(true) {
                if let Some(ref id) = task.id {
                    calendar.ctx.host.remove_item(&calendar.cache_id, id).await?;
                    stats.tasks_removed += 1;
                }
                continue;
            }
            let item = task.from_google(ctx)?;
            calendar.ctx.host.create_item(&calendar.cache_id, item).await?;
            stats.tasks_applied += 1;
        }

        match list.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    let floor = server_time.unwrap_or_else(Utc::now);
    calendar
        .prefs
        .set(TASKS_LAST_UPDATED, &floor.to_rfc3339_opts(SecondsFormat::Millis, true))
        .await
}

/// Server clock from the `Date` header.
fn response_date(response: &ApiResponse) -> Option<DateTime<Utc>> {
    response
        .header("date")
        .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
        .map(|d| d.with_timezone(&Utc))
}

//! Mapping between local items and remote JSON resources.
//!
//! Translation is pure: no I/O, and missing optional fields are simply left
//! out. The only failure modes are an unknown item kind tag and a resource
//! that doesn't decode at all.

mod diff;
mod from_google;
mod to_google;

pub use diff::diff_patch;
pub use from_google::FromGoogle;
pub use to_google::ToGoogle;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;
use gdata_core::time::ItemTime;
use gdata_core::{GdataError, GdataResult, ItemKind, LocalItem};
use serde_json::{Map, Value};

use crate::types::{EventDateTime, GoogleEvent, GoogleTask, ReminderOverride};

/// Calendar-level defaults that shape remote→local translation.
#[derive(Debug, Clone, Default)]
pub struct TranslateContext {
    /// Reminders applied to events with `reminders.useDefault`
    pub default_reminders: Vec<ReminderOverride>,
    /// Zone for event times the remote sends without one
    pub default_timezone: Option<String>,
}

/// Translate a remote resource of the given kind into a local item.
pub fn to_local(resource: Value, kind: ItemKind, ctx: &TranslateContext) -> GdataResult<LocalItem> {
    match kind {
        ItemKind::Event => {
            let event: GoogleEvent =
                serde_json::from_value(resource).map_err(|e| GdataError::Decode(e.to_string()))?;
            event.from_google(ctx)
        }
        ItemKind::Task => {
            let task: GoogleTask =
                serde_json::from_value(resource).map_err(|e| GdataError::Decode(e.to_string()))?;
            task.from_google(ctx)
        }
    }
}

/// Build the write payload for `item`.
///
/// Without a previous snapshot this is the full resource; with one it is a
/// diff-only patch holding just the fields that changed.
pub fn to_remote(item: &LocalItem, previous: Option<&LocalItem>) -> GdataResult<Map<String, Value>> {
    let resource = item.to_google()?;
    match previous {
        Some(old) => Ok(diff_patch(&resource, &old.to_google()?)),
        None => Ok(resource),
    }
}

// =============================================================================
// Time helpers shared by both directions
// =============================================================================

/// Format used by the Tasks API for `due`, `completed` and `updated`.
const TASK_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

fn is_utc_zone(tzid: &str) -> bool {
    matches!(tzid, "UTC" | "Etc/UTC" | "GMT" | "Etc/GMT" | "Z")
}

/// Read an event start/end. Zoned times keep their zone (the resource's own
/// or the calendar default); without any zone they land as UTC.
fn event_time_from_google(time: &EventDateTime, default_tz: Option<&str>) -> Option<ItemTime> {
    if let Some(ref date) = time.date {
        return NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .ok()
            .map(ItemTime::Date);
    }

    let raw = time.date_time.as_deref()?;
    let tzid = time.time_zone.as_deref().or(default_tz);

    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => match tzid.filter(|id| !is_utc_zone(id)) {
            Some(id) => match id.parse::<Tz>() {
                Ok(tz) => Some(ItemTime::DateTimeZoned {
                    datetime: dt.with_timezone(&tz).naive_local(),
                    tzid: id.to_string(),
                }),
                Err(_) => Some(ItemTime::DateTimeUtc(dt.with_timezone(&Utc))),
            },
            None => Some(ItemTime::DateTimeUtc(dt.with_timezone(&Utc))),
        },
        Err(_) => {
            let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()?;
            Some(match tzid {
                Some(id) => ItemTime::DateTimeZoned {
                    datetime: naive,
                    tzid: id.to_string(),
                },
                None => ItemTime::DateTimeFloating(naive),
            })
        }
    }
}

fn event_time_to_google(time: &ItemTime) -> Value {
    let mut out = Map::new();
    match time {
        ItemTime::Date(d) => {
            out.insert("date".into(), Value::String(d.format("%Y-%m-%d").to_string()));
        }
        ItemTime::DateTimeUtc(dt) => {
            out.insert(
                "dateTime".into(),
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        ItemTime::DateTimeFloating(naive) => {
            out.insert(
                "dateTime".into(),
                Value::String(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
            );
        }
        ItemTime::DateTimeZoned { datetime, tzid } => {
            let resolved = tzid
                .parse::<Tz>()
                .ok()
                .and_then(|tz| tz.from_local_datetime(datetime).earliest());
            let formatted = match resolved {
                Some(dt) => dt
                    .fixed_offset()
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
                // Unknown zone: let the remote resolve the wall time itself
                None => datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
            };
            out.insert("dateTime".into(), Value::String(formatted));
            out.insert("timeZone".into(), Value::String(tzid.clone()));
        }
    }
    Value::Object(out)
}

/// Read a Tasks API timestamp as floating local time.
///
/// The remote sends a UTC instant; its clock reading is kept without any
/// zone. Round-trips through [`task_time_to_google`] are exact.
fn task_time_from_google(raw: &str) -> Option<ItemTime> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(ItemTime::DateTimeFloating(dt.naive_utc())),
        Err(_) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(ItemTime::Date),
    }
}

fn task_time_to_google(time: &ItemTime) -> String {
    let naive = match time {
        ItemTime::Date(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default(),
        ItemTime::DateTimeUtc(dt) => dt.naive_utc(),
        ItemTime::DateTimeFloating(naive) => *naive,
        ItemTime::DateTimeZoned { datetime, tzid } => tzid
            .parse::<Tz>()
            .ok()
            .and_then(|tz| tz.from_local_datetime(datetime).earliest())
            .map(|dt| dt.naive_utc())
            .unwrap_or(*datetime),
    };
    naive.format(TASK_TIME_FORMAT).to_string()
}

fn utc_stamp_from_google(raw: &str) -> Option<ItemTime> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| ItemTime::DateTimeUtc(dt.with_timezone(&Utc)))
}

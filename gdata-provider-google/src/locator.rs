//! Remote collection addresses derived from a calendar's source locator.
//!
//! Locators come in several historical shapes:
//! - `googleapi://<session>/?calendar=<cal>&tasks=<list>`
//! - `googleapi://<session>/` (the account's own calendar and default list)
//! - `googleapi://<name>@group.calendar.google.com/`
//! - `https://www.google.com/calendar/ical/<cal>/private/full`
//! - `https://www.google.com/calendar/feeds/<cal>/private/full`
//!
//! Anything else leaves the calendar without a remote address.

use serde::{Deserialize, Serialize};
use url::Url;

pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const TASKS_API_BASE: &str = "https://www.googleapis.com/tasks/v1";

/// The account's default task list.
pub const DEFAULT_TASKLIST: &str = "@default";

const GROUP_CALENDAR_SUFFIX: &str = "@group.calendar.google.com";

/// API base addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub calendar_base: String,
    pub tasks_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            calendar_base: CALENDAR_API_BASE.to_string(),
            tasks_base: TASKS_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListRef {
    None,
    Named(String),
    /// Legacy feed locators: the default list, but only for accounts this
    /// host has signed into before
    DefaultForKnownUser,
}

/// Result of parsing a locator, before any preference lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocator {
    pub session_id: Option<String>,
    pub calendar: Option<String>,
    pub tasklist: TaskListRef,
}

impl ParsedLocator {
    fn unresolved() -> Self {
        ParsedLocator {
            session_id: None,
            calendar: None,
            tasklist: TaskListRef::None,
        }
    }

    /// Key of the global preference recording a signed-in account.
    pub fn known_user_key(&self) -> Option<String> {
        self.calendar.as_ref().map(|c| format!("googleUser.{}", c))
    }

    pub fn resolve(self, user_known: bool) -> CalendarNames {
        let tasklist = match self.tasklist {
            TaskListRef::None => None,
            TaskListRef::Named(name) => Some(name),
            TaskListRef::DefaultForKnownUser if user_known => Some(DEFAULT_TASKLIST.to_string()),
            TaskListRef::DefaultForKnownUser => None,
        };
        CalendarNames {
            session_id: self.session_id,
            calendar: self.calendar,
            tasklist,
        }
    }
}

pub fn parse_locator(locator: &str) -> ParsedLocator {
    if let Some(rest) = locator.strip_prefix("googleapi://") {
        return parse_googleapi(rest);
    }
    match Url::parse(locator) {
        Ok(url) => parse_legacy_feed(&url),
        Err(_) => ParsedLocator::unresolved(),
    }
}

fn parse_googleapi(rest: &str) -> ParsedLocator {
    let (authority, tail) = rest.split_once('/').unwrap_or((rest, ""));
    let authority = decode(authority);
    if authority.is_empty() {
        return ParsedLocator::unresolved();
    }

    let query = tail.split_once('?').map(|(_, q)| q).unwrap_or("");
    let mut calendar = None;
    let mut tasks = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "calendar" if !value.is_empty() => calendar = Some(value.into_owned()),
            "tasks" if !value.is_empty() => tasks = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(calendar) = calendar {
        return ParsedLocator {
            session_id: Some(authority),
            calendar: Some(calendar),
            tasklist: tasks.map_or(TaskListRef::None, TaskListRef::Named),
        };
    }

    if authority.ends_with(GROUP_CALENDAR_SUFFIX) {
        return ParsedLocator {
            session_id: Some(authority.clone()),
            calendar: Some(authority),
            tasklist: TaskListRef::None,
        };
    }

    ParsedLocator {
        session_id: Some(authority.clone()),
        calendar: Some(authority),
        tasklist: TaskListRef::Named(DEFAULT_TASKLIST.to_string()),
    }
}

fn parse_legacy_feed(url: &Url) -> ParsedLocator {
    if !matches!(url.host_str(), Some("www.google.com") | Some("google.com")) {
        return ParsedLocator::unresolved();
    }
    let Some(segments) = url.path_segments() else {
        return ParsedLocator::unresolved();
    };
    let segments: Vec<&str> = segments.collect();

    match segments.as_slice() {
        ["calendar", "ical", calendar, visibility, ..]
            if !calendar.is_empty() && is_feed_visibility(visibility) =>
        {
            let calendar = decode(calendar);
            ParsedLocator {
                session_id: Some(calendar.clone()),
                calendar: Some(calendar),
                tasklist: TaskListRef::None,
            }
        }
        ["calendar", "feeds", calendar, visibility, ..]
            if !calendar.is_empty() && is_feed_visibility(visibility) =>
        {
            let calendar = decode(calendar);
            ParsedLocator {
                session_id: Some(calendar.clone()),
                calendar: Some(calendar),
                tasklist: TaskListRef::DefaultForKnownUser,
            }
        }
        _ => ParsedLocator::unresolved(),
    }
}

fn is_feed_visibility(segment: &str) -> bool {
    segment.starts_with("private") || segment.starts_with("public")
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Resolved remote names of one calendar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarNames {
    /// Key the token provider knows this calendar's credentials under
    pub session_id: Option<String>,
    pub calendar: Option<String>,
    pub tasklist: Option<String>,
}

impl CalendarNames {
    pub fn is_resolved(&self) -> bool {
        self.calendar.is_some()
    }

    /// `<calendar base>/calendars/<calendar>/<parts...>`, or `None` without a
    /// calendar address.
    pub fn events_uri(&self, endpoints: &Endpoints, parts: &[&str]) -> Option<String> {
        let calendar = self.calendar.as_deref()?;
        Some(join(
            &endpoints.calendar_base,
            ["calendars", calendar].into_iter().chain(parts.iter().copied()),
        ))
    }

    /// `<tasks base>/lists/<tasklist>/<parts...>`, or `None` without a task
    /// list.
    pub fn tasks_uri(&self, endpoints: &Endpoints, parts: &[&str]) -> Option<String> {
        if !self.is_resolved() {
            return None;
        }
        let tasklist = self.tasklist.as_deref()?;
        Some(join(
            &endpoints.tasks_base,
            ["lists", tasklist].into_iter().chain(parts.iter().copied()),
        ))
    }

    pub fn users_uri(endpoints: &Endpoints, parts: &[&str]) -> String {
        join(
            &endpoints.calendar_base,
            ["users", "me"].into_iter().chain(parts.iter().copied()),
        )
    }
}

/// Join segments onto a base, percent-encoding each one on its own.
fn join<'a>(base: &str, segments: impl Iterator<Item = &'a str>) -> String {
    let mut uri = base.trim_end_matches('/').to_string();
    for segment in segments {
        uri.push('/');
        uri.push_str(&urlencoding::encode(segment));
    }
    uri
}

//! Calendar host backed by the data directory.
//!
//! ```text
//! <data_dir>/
//!   calendars.json          registration state the engine changed
//!   items/<cache_id>/*.ics  one file per cached item
//! ```
//!
//! Item files are plain VCALENDARs; the item's id, kind and remote metadata
//! ride along as `X-GDATA-*` properties on the calendar object.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gdata_core::host::{CalendarHost, CalendarRegistration, CalendarUpdate};
use gdata_core::ics::{Component, Property, generate_ics, parse_calendar};
use gdata_core::{GdataError, GdataResult, LocalItem};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::prefs::write_atomic;

const PROP_ID: &str = "X-GDATA-ID";
const PROP_TYPE: &str = "X-GDATA-TYPE";
const PROP_ETAG: &str = "X-GDATA-ETAG";
const PROP_PATH: &str = "X-GDATA-PATH";
/// Set when the item body was a bare VEVENT/VTODO
const PROP_BARE: &str = "X-GDATA-BARE";

const HOST_PROPS: [&str; 5] = [PROP_ID, PROP_TYPE, PROP_ETAG, PROP_PATH, PROP_BARE];

pub struct FileCalendarHost {
    data_dir: PathBuf,
    calendars: Mutex<HashMap<String, CalendarRegistration>>,
}

impl FileCalendarHost {
    /// Registrations come from the configuration; engine-made changes
    /// (read-only flag, capabilities) are restored from `calendars.json`.
    pub async fn open(
        data_dir: &Path,
        registrations: impl IntoIterator<Item = CalendarRegistration>,
    ) -> GdataResult<Self> {
        let saved = load_saved_state(&data_dir.join("calendars.json")).await?;

        let calendars = registrations
            .into_iter()
            .map(|mut registration| {
                if let Some(state) = saved.get(&registration.id) {
                    registration.read_only = state.read_only;
                    registration.capabilities = state.capabilities.clone();
                }
                (registration.id.clone(), registration)
            })
            .collect();

        Ok(FileCalendarHost {
            data_dir: data_dir.to_path_buf(),
            calendars: Mutex::new(calendars),
        })
    }

    pub async fn registrations(&self) -> Vec<CalendarRegistration> {
        let mut registrations: Vec<_> = self.calendars.lock().await.values().cloned().collect();
        registrations.sort_by(|a, b| a.id.cmp(&b.id));
        registrations
    }

    fn cache_dir(&self, cache_id: &str) -> PathBuf {
        self.data_dir.join("items").join(file_stem(cache_id))
    }

    fn item_path(&self, cache_id: &str, item_id: &str) -> PathBuf {
        self.cache_dir(cache_id)
            .join(format!("{}.ics", file_stem(item_id)))
    }

    /// Every readable item of a cache. Unreadable files are skipped.
    pub async fn items(&self, cache_id: &str) -> GdataResult<Vec<LocalItem>> {
        let dir = self.cache_dir(cache_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&dir, e)),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("ics") {
                continue;
            }
            match read_item(&path).await {
                Ok(item) => items.push(item),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable item"),
            }
        }
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn save_state(&self, calendars: &HashMap<String, CalendarRegistration>) -> GdataResult<()> {
        let state: HashMap<&str, SavedState> = calendars
            .values()
            .map(|c| {
                (
                    c.id.as_str(),
                    SavedState {
                        read_only: c.read_only,
                        capabilities: c.capabilities.clone(),
                    },
                )
            })
            .collect();
        write_atomic(
            &self.data_dir.join("calendars.json"),
            &serde_json::to_string_pretty(&state)?,
        )
        .await
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SavedState {
    read_only: bool,
    capabilities: gdata_core::host::Capabilities,
}

async fn load_saved_state(path: &Path) -> GdataResult<HashMap<String, SavedState>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(io_error(path, e)),
    }
}

#[async_trait]
impl CalendarHost for FileCalendarHost {
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
        if let Some(capabilities) = update.capabilities {
            calendar.capabilities = capabilities;
        }
        self.save_state(&calendars).await
    }

    async fn item(&self, cache_id: &str, item_id: &str) -> GdataResult<Option<LocalItem>> {
        let path = self.item_path(cache_id, item_id);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => read_item(&path).await.map(Some),
            Ok(false) => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn clear_items(&self, cache_id: &str) -> GdataResult<()> {
        let dir = self.cache_dir(cache_id);
        debug!(cache = cache_id, dir = %dir.display(), "Clearing item cache");
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&dir, e)),
        }
    }

    async fn create_item(&self, cache_id: &str, item: LocalItem) -> GdataResult<()> {
        let path = self.item_path(cache_id, &item.id);
        write_atomic(&path, &generate_ics(&item_to_calendar(item))).await
    }

    async fn remove_item(&self, cache_id: &str, item_id: &str) -> GdataResult<()> {
        let path = self.item_path(cache_id, item_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

fn io_error(path: &Path, e: std::io::Error) -> GdataError {
    GdataError::Host(format!("{}: {}", path.display(), e))
}

/// File name for an id, keeping only characters that are safe everywhere.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '@' => c,
            _ => '_',
        })
        .collect()
}

fn item_to_calendar(item: LocalItem) -> Component {
    let bare = !item.body.is("VCALENDAR");
    let mut calendar = if bare {
        let mut calendar = Component::new("VCALENDAR");
        calendar.push_property(Property::new("VERSION", "2.0"));
        calendar.push_property(Property::new("PRODID", "-//gdata-sync//EN"));
        calendar.push_component(item.body);
        calendar.push_property(Property::new(PROP_BARE, "TRUE"));
        calendar
    } else {
        item.body
    };

    calendar.set_property(Property::new(PROP_ID, &item.id));
    calendar.set_property(Property::new(PROP_TYPE, item.item_type));
    if let Some(etag) = item.metadata.etag {
        calendar.set_property(Property::new(PROP_ETAG, &etag));
    }
    if let Some(path) = item.metadata.path {
        calendar.set_property(Property::new(PROP_PATH, &path));
    }
    calendar
}

async fn read_item(path: &Path) -> GdataResult<LocalItem> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| io_error(path, e))?;
    calendar_to_item(parse_calendar(&contents)?)
}

fn calendar_to_item(mut calendar: Component) -> GdataResult<LocalItem> {
    let id = calendar
        .value(PROP_ID)
        .map(str::to_string)
        .ok_or_else(|| GdataError::IcsParse(format!("missing {}", PROP_ID)))?;
    let item_type = calendar
        .value(PROP_TYPE)
        .map(str::to_string)
        .ok_or_else(|| GdataError::IcsParse(format!("missing {}", PROP_TYPE)))?;
    let etag = calendar.value(PROP_ETAG).map(str::to_string);
    let remote_path = calendar.value(PROP_PATH).map(str::to_string);
    let bare = calendar.value(PROP_BARE).is_some();

    for name in HOST_PROPS {
        calendar.remove_properties(name);
    }
    let body = if bare && calendar.components.len() == 1 {
        calendar.components.remove(0)
    } else {
        calendar
    };

    let mut item = LocalItem {
        id,
        item_type,
        title: None,
        metadata: Default::default(),
        body,
    };
    item.title = item.primary_component().and_then(|c| c.value("SUMMARY").map(str::to_string));
    item.metadata.etag = etag;
    item.metadata.path = remote_path;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdata_core::ItemKind;
    use gdata_core::host::Capabilities;

    fn registration() -> CalendarRegistration {
        CalendarRegistration {
            id: "id1".into(),
            cache_id: "cached-id1".into(),
            calendar_type: "gdata".into(),
            url: "googleapi://sessionId/".into(),
            read_only: false,
            capabilities: Capabilities::default(),
        }
    }

    fn event(uid: &str, summary: &str) -> LocalItem {
        let mut vevent = Component::new("VEVENT");
        vevent.push_property(Property::new("UID", uid));
        vevent.push_property(Property::new("SUMMARY", summary));
        vevent.push_property(Property::new("DTSTART", "20250320T150000Z"));
        let mut item = LocalItem::new(uid, ItemKind::Event, vevent);
        item.metadata.etag = Some("\"2299601498276000\"".into());
        item.metadata.path = Some("go6ijb0b46hlpbu4eeu92njevo".into());
        item
    }

    #[tokio::test]
    async fn test_items_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileCalendarHost::open(dir.path(), [registration()]).await.unwrap();

        let mut item = event("go6ijb0b46hlpbu4eeu92njevo@google.com", "Planning, Q3");
        item.body
            .push_property(Property::new("DESCRIPTION", "Agenda:\nbudget; hiring\\n"));
        host.create_item("cached-id1", item.clone()).await.unwrap();

        let path = dir
            .path()
            .join("items/cached-id1/go6ijb0b46hlpbu4eeu92njevo@google.com.ics");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("SUMMARY:Planning\\, Q3\r\n"), "{}", contents);

        let stored = host
            .item("cached-id1", "go6ijb0b46hlpbu4eeu92njevo@google.com")
            .await
            .unwrap()
            .expect("Item should be stored");
        assert_eq!(stored.id, item.id);
        assert_eq!(stored.title.as_deref(), Some("Planning, Q3"));
        assert_eq!(stored.metadata, item.metadata);
        for name in ["UID", "SUMMARY", "DTSTART", "DESCRIPTION"] {
            assert_eq!(stored.body.value(name), item.body.value(name), "{}", name);
        }

        host.create_item("cached-id1", stored.clone()).await.unwrap();
        let again = host
            .item("cached-id1", "go6ijb0b46hlpbu4eeu92njevo@google.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again, stored);
    }

    #[tokio::test]
    async fn test_series_bodies_keep_every_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileCalendarHost::open(dir.path(), [registration()]).await.unwrap();

        let master = event("series@google.com", "Weekly");
        let mut exception = event("series@google.com", "Weekly (moved)").body;
        exception.push_property(Property::new("RECURRENCE-ID", "20250327T150000Z"));
        let mut body = Component::new("VCALENDAR");
        body.push_component(master.body.clone());
        body.push_component(exception);
        let item = LocalItem { body, ..master };

        host.create_item("cached-id1", item.clone()).await.unwrap();
        let stored = host.item("cached-id1", "series@google.com").await.unwrap().unwrap();

        assert_eq!(stored.body.components.len(), 2);
        assert_eq!(stored.title.as_deref(), Some("Weekly"));
        assert!(stored.body.property(PROP_ID).is_none());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileCalendarHost::open(dir.path(), [registration()]).await.unwrap();

        host.create_item("cached-id1", event("a", "A")).await.unwrap();
        host.create_item("cached-id1", event("b", "B")).await.unwrap();
        host.remove_item("cached-id1", "a").await.unwrap();
        host.remove_item("cached-id1", "missing").await.unwrap();
        assert_eq!(host.items("cached-id1").await.unwrap().len(), 1);

        host.clear_items("cached-id1").await.unwrap();
        assert!(host.items("cached-id1").await.unwrap().is_empty());
        host.clear_items("cached-id1").await.unwrap();
    }

    #[tokio::test]
    async fn test_registration_changes_persist() {
        let dir = tempfile::tempdir().unwrap();
        let host = FileCalendarHost::open(dir.path(), [registration()]).await.unwrap();
        host.update_calendar("id1", CalendarUpdate::read_only()).await.unwrap();
        host.update_calendar("id1", CalendarUpdate::organizer(Some("me@example.com".into())))
            .await
            .unwrap();

        let reopened = FileCalendarHost::open(dir.path(), [registration()]).await.unwrap();
        let calendar = reopened.calendar("id1").await.unwrap().unwrap();
        assert!(calendar.read_only);
        assert_eq!(calendar.capabilities.organizer.as_deref(), Some("me@example.com"));

        let err = reopened
            .update_calendar("nope", CalendarUpdate::read_only())
            .await
            .unwrap_err();
        assert!(matches!(err, GdataError::CalendarNotFound(_)));
    }

    #[test]
    fn test_file_stem_replaces_separators() {
        assert_eq!(file_stem("a/b\\c d"), "a_b_c_d");
        assert_eq!(file_stem("uid@google.com"), "uid@google.com");
    }
}

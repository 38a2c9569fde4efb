//! Folding recurring-event exceptions into cached items.
//!
//! The remote delivers a series master and each modified or cancelled
//! occurrence as separate resources sharing one iCalendar UID, while the
//! local cache keeps them together as one item whose body is a VCALENDAR.

use gdata_core::LocalItem;
use gdata_core::ics::{Component, Property};

const RECURRENCE_ID: &str = "RECURRENCE-ID";

fn is_occurrence(component: &Component) -> bool {
    component.property(RECURRENCE_ID).is_some()
}

fn same_recurrence_id(component: &Component, rid: &Property) -> bool {
    component
        .property(RECURRENCE_ID)
        .is_some_and(|p| p.value == rid.value)
}

/// Body as a VCALENDAR, wrapping a bare component.
fn into_vcalendar(body: Component) -> Component {
    if body.is("VCALENDAR") {
        return body;
    }
    let mut vcalendar = Component::new("VCALENDAR");
    vcalendar.push_component(body);
    vcalendar
}

/// Replace the master of a cached item, keeping the exceptions it holds.
pub fn merge_master(existing: Option<LocalItem>, master: LocalItem) -> LocalItem {
    let exceptions: Vec<Component> = existing
        .map(|item| into_vcalendar(item.body).components)
        .unwrap_or_default()
        .into_iter()
        .filter(is_occurrence)
        .collect();
    if exceptions.is_empty() {
        return master;
    }

    let mut body = Component::new("VCALENDAR");
    body.push_component(master.body);
    body.components.extend(exceptions);
    LocalItem { body, ..master }
}

/// Fold one occurrence into the cached item of its series.
///
/// A cancelled occurrence turns into an EXDATE on the master. Returns `None`
/// when there is nothing to store (a cancellation for a series not cached).
pub fn merge_occurrence(
    existing: Option<LocalItem>,
    occurrence: LocalItem,
    cancelled: bool,
) -> Option<LocalItem> {
    let Some(rid) = occurrence.body.property(RECURRENCE_ID).cloned() else {
        return Some(occurrence);
    };

    let mut item = match existing {
        Some(item) => item,
        None if cancelled => return None,
        None => LocalItem {
            body: Component::new("VCALENDAR"),
            ..occurrence.clone()
        },
    };
    item.body = into_vcalendar(item.body);
    item.body
        .components
        .retain(|c| !same_recurrence_id(c, &rid));

    if cancelled {
        if let Some(master) = item.body.components.iter_mut().find(|c| !is_occurrence(c)) {
            let mut exdate = Property::new("EXDATE", rid.value.clone());
            exdate.params = rid.params.clone();
            master.push_property(exdate);
        }
    } else {
        item.body.push_component(occurrence.body);
    }
    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdata_core::ItemKind;

    fn vevent(summary: &str, rid: Option<&str>) -> Component {
        let mut vevent = Component::new("VEVENT");
        vevent.push_property(Property::new("UID", "series@google.com"));
        vevent.push_property(Property::new("SUMMARY", summary));
        if let Some(rid) = rid {
            vevent.push_property(Property::new(RECURRENCE_ID, rid));
        } else {
            vevent.push_property(Property::new("RRULE", "FREQ=DAILY"));
        }
        vevent
    }

    fn item(body: Component) -> LocalItem {
        LocalItem::new("series@google.com", ItemKind::Event, body)
    }

    #[test]
    fn occurrence_joins_master() {
        let master = item(vevent("Standup", None));
        let moved = item(vevent("Standup (moved)", Some("20240109T090000Z")));

        let merged = merge_occurrence(Some(master), moved, false).unwrap();
        assert!(merged.body.is("VCALENDAR"));
        assert_eq!(merged.body.components.len(), 2);
        assert_eq!(
            merged.primary_component().unwrap().value("SUMMARY"),
            Some("Standup")
        );
    }

    #[test]
    fn cancelled_occurrence_becomes_exdate() {
        let master = item(vevent("Standup", None));
        let cancelled = item(vevent("", Some("20240110T090000Z")));

        let merged = merge_occurrence(Some(master), cancelled.clone(), true).unwrap();
        assert_eq!(merged.body.components.len(), 1);
        assert_eq!(merged.body.components[0].value("EXDATE"), Some("20240110T090000Z"));

        assert_eq!(merge_occurrence(None, cancelled, true), None);
    }

    #[test]
    fn master_update_keeps_exceptions() {
        let master = item(vevent("Standup", None));
        let moved = item(vevent("Standup (moved)", Some("20240109T090000Z")));
        let cached = merge_occurrence(Some(master), moved, false).unwrap();

        let renamed = item(vevent("Daily", None));
        let merged = merge_master(Some(cached), renamed);
        assert_eq!(merged.body.components.len(), 2);
        assert_eq!(merged.title.as_deref(), Some("Daily"));

        let plain = merge_master(None, item(vevent("Solo", None)));
        assert!(plain.body.is("VEVENT"));
    }
}

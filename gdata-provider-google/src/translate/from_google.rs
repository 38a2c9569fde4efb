use gdata_core::alarm::{Alarm, AlarmAction};
use gdata_core::ics::{Component, Property};
use gdata_core::time::ItemTime;
use gdata_core::{GdataResult, ItemKind, LocalItem};

use super::{
    TranslateContext, event_time_from_google, task_time_from_google, utc_stamp_from_google,
};
use crate::types::{EventPerson, GoogleEvent, GoogleTask, ReminderOverride};

pub trait FromGoogle {
    fn from_google(self, ctx: &TranslateContext) -> GdataResult<LocalItem>
    where
        Self: Sized;
}

impl FromGoogle for GoogleEvent {
    fn from_google(self, ctx: &TranslateContext) -> GdataResult<LocalItem> {
        let uid = self
            .ical_uid
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_default();
        let default_tz = ctx.default_timezone.as_deref();

        let mut vevent = Component::new("VEVENT");
        vevent.push_property(Property::new("UID", uid.clone()));

        push_text(&mut vevent, "SUMMARY", &self.summary);
        push_text(&mut vevent, "DESCRIPTION", &self.description);
        push_text(&mut vevent, "LOCATION", &self.location);

        if let Some(start) = self.start.as_ref().and_then(|t| event_time_from_google(t, default_tz)) {
            vevent.push_property(start.to_property("DTSTART"));
        }
        if let Some(end) = self.end.as_ref().and_then(|t| event_time_from_google(t, default_tz)) {
            vevent.push_property(end.to_property("DTEND"));
        }
        if let Some(rid) = self
            .original_start_time
            .as_ref()
            .and_then(|t| event_time_from_google(t, default_tz))
        {
            vevent.push_property(rid.to_property("RECURRENCE-ID"));
        }

        for line in self.recurrence.iter().flatten() {
            if let Some(prop) = parse_recurrence_line(line) {
                vevent.push_property(prop);
            }
        }

        if let Some(status) = self.status.as_deref().and_then(status_from_google) {
            vevent.push_property(Property::new("STATUS", status));
        }
        match self.transparency.as_deref() {
            Some("transparent") => vevent.push_property(Property::new("TRANSP", "TRANSPARENT")),
            Some("opaque") => vevent.push_property(Property::new("TRANSP", "OPAQUE")),
            _ => {}
        }
        if let Some(class) = self.visibility.as_deref().and_then(class_from_visibility) {
            vevent.push_property(Property::new("CLASS", class));
        }
        if let Some(sequence) = self.sequence {
            vevent.push_property(Property::new("SEQUENCE", sequence.to_string()));
        }
        if let Some(ref link) = self.html_link {
            vevent.push_property(Property::new("URL", link.clone()));
        }

        if let Some(created) = self.created.as_deref().and_then(utc_stamp_from_google) {
            vevent.push_property(created.to_property("CREATED"));
        }
        if let Some(updated) = self.updated.as_deref().and_then(utc_stamp_from_google) {
            vevent.push_property(updated.to_property("LAST-MODIFIED"));
            vevent.push_property(updated.to_property("DTSTAMP"));
        }

        if let Some(prop) = self.organizer.as_ref().and_then(|o| person_property("ORGANIZER", o)) {
            vevent.push_property(prop);
        }
        for attendee in self.attendees.iter().flatten() {
            if let Some(mut prop) = person_property("ATTENDEE", attendee) {
                if let Some(partstat) = attendee.response_status.as_deref().and_then(partstat_from_google) {
                    prop.set_param("PARTSTAT", partstat);
                }
                let role = if attendee.optional == Some(true) {
                    "OPT-PARTICIPANT"
                } else {
                    "REQ-PARTICIPANT"
                };
                prop.set_param("ROLE", role);
                let cutype = if attendee.resource == Some(true) {
                    "RESOURCE"
                } else {
                    "INDIVIDUAL"
                };
                prop.set_param("CUTYPE", cutype);
                vevent.push_property(prop);
            }
        }

        // Video entry point of a conference, if any
        let conference_url = self.conference_data.as_ref().and_then(|cd| {
            cd.entry_points
                .iter()
                .find(|ep| ep.entry_point_type == "video")
                .map(|ep| ep.uri.clone())
        });
        if let Some(url) = conference_url {
            vevent.push_property(Property::new("X-GOOGLE-CONFERENCE", url));
        }

        for attachment in self.attachments.iter().flatten() {
            let mut prop = Property::new("ATTACH", attachment.file_url.clone());
            if let Some(ref title) = attachment.title {
                prop.set_param("FILENAME", title.clone());
            }
            if let Some(ref mime) = attachment.mime_type {
                prop.set_param("FMTTYPE", mime.clone());
            }
            if let Some(ref file_id) = attachment.file_id {
                prop.set_param("X-GOOGLE-FILE-ID", file_id.clone());
            }
            vevent.push_property(prop);
        }

        let alarms: Vec<Alarm> = match self.reminders {
            Some(ref reminders) if reminders.use_default => ctx
                .default_reminders
                .iter()
                .map(|r| alarm_from_reminder(r, true))
                .collect(),
            Some(ref reminders) => reminders
                .overrides
                .iter()
                .flatten()
                .map(|r| alarm_from_reminder(r, false))
                .collect(),
            None => Vec::new(),
        };
        for alarm in alarms {
            vevent.push_component(alarm.to_component());
        }

        let mut item = LocalItem::new(&uid, ItemKind::Event, vevent);
        item.metadata.etag = self.etag;
        item.metadata.path = self.id;
        Ok(item)
    }
}

impl FromGoogle for GoogleTask {
    fn from_google(self, _ctx: &TranslateContext) -> GdataResult<LocalItem> {
        let id = self.id.clone().unwrap_or_default();

        let mut vtodo = Component::new("VTODO");
        vtodo.push_property(Property::new("UID", id.clone()));
        push_text(&mut vtodo, "SUMMARY", &self.title);
        push_text(&mut vtodo, "DESCRIPTION", &self.notes);

        if let Some(updated) = self.updated.as_deref().and_then(task_time_from_google) {
            vtodo.push_property(updated.to_property("LAST-MODIFIED"));
            vtodo.push_property(updated.to_property("DTSTAMP"));
        }

        if self.deleted == Some(true) {
            vtodo.push_property(Property::new("STATUS", "CANCELLED"));
        } else if self.status.as_deref() == Some("completed") {
            vtodo.push_property(Property::new("STATUS", "COMPLETED"));
            vtodo.push_property(Property::new("PERCENT-COMPLETE", "100"));
        } else {
            vtodo.push_property(Property::new("STATUS", "NEEDS-ACTION"));
        }

        if let Some(due) = self.due.as_deref().and_then(task_time_from_google) {
            vtodo.push_property(due.to_property("DUE"));
        }
        if let Some(completed) = self.completed.as_deref().and_then(task_time_from_google) {
            // COMPLETED must be a date-time even when the remote sent a bare date
            let completed = match completed {
                ItemTime::Date(d) => ItemTime::DateTimeFloating(d.and_hms_opt(0, 0, 0).unwrap_or_default()),
                other => other,
            };
            vtodo.push_property(completed.to_property("COMPLETED"));
        }

        if let Some(ref link) = self.web_view_link {
            vtodo.push_property(Property::new("URL", link.clone()));
        }

        let links = self.links.unwrap_or_default();
        let parent = self.parent.clone().or_else(|| {
            links
                .iter()
                .find(|l| l.link_type.as_deref() == Some("parent"))
                .map(|l| l.link.clone())
        });
        if let Some(parent) = parent {
            vtodo.push_property(Property::new("RELATED-TO", &parent).with_param("RELTYPE", "PARENT"));
        }

        if let Some(position) = self.position.as_deref().and_then(|p| p.trim().parse::<i64>().ok()) {
            vtodo.push_property(Property::new("X-GOOGLE-SORTKEY", position.to_string()));
        }

        for link in links.iter().filter(|l| l.link_type.as_deref() != Some("parent")) {
            let mut prop = Property::new("ATTACH", link.link.clone());
            if let Some(ref description) = link.description {
                prop.set_param("FILENAME", description.clone());
            }
            if let Some(ref link_type) = link.link_type {
                prop.set_param("X-GOOGLE-TYPE", link_type.clone());
            }
            vtodo.push_property(prop);
        }

        let mut item = LocalItem::new(&id, ItemKind::Task, vtodo);
        item.metadata.etag = self.etag;
        item.metadata.path = self.id;
        Ok(item)
    }
}

fn push_text(component: &mut Component, name: &str, value: &Option<String>) {
    if let Some(value) = value {
        component.push_property(Property::new(name, value));
    }
}

/// Split a recurrence line such as `EXDATE;TZID=Europe/Berlin:20240108T100000`
/// into a property.
fn parse_recurrence_line(line: &str) -> Option<Property> {
    let (head, value) = line.split_once(':')?;
    let mut parts = head.split(';');
    let name = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }

    let mut prop = Property::new(name, value.trim());
    for param in parts {
        if let Some((key, val)) = param.split_once('=') {
            prop.set_param(key, val.trim_matches('"'));
        }
    }
    Some(prop)
}

fn status_from_google(status: &str) -> Option<&'static str> {
    match status {
        "confirmed" => Some("CONFIRMED"),
        "tentative" => Some("TENTATIVE"),
        "cancelled" => Some("CANCELLED"),
        _ => None,
    }
}

fn class_from_visibility(visibility: &str) -> Option<&'static str> {
    match visibility {
        "public" => Some("PUBLIC"),
        "private" => Some("PRIVATE"),
        "confidential" => Some("CONFIDENTIAL"),
        _ => None,
    }
}

fn partstat_from_google(status: &str) -> Option<&'static str> {
    match status {
        "accepted" => Some("ACCEPTED"),
        "declined" => Some("DECLINED"),
        "tentative" => Some("TENTATIVE"),
        "needsAction" => Some("NEEDS-ACTION"),
        _ => None,
    }
}

fn person_property(name: &str, person: &EventPerson) -> Option<Property> {
    let email = person.email.as_deref()?;
    let mut prop = Property::new(name, format!("mailto:{}", email));
    if let Some(ref cn) = person.display_name {
        prop.set_param("CN", cn.clone());
    }
    Some(prop)
}

fn alarm_from_reminder(reminder: &ReminderOverride, is_default: bool) -> Alarm {
    let action = match reminder.method.as_str() {
        "email" => AlarmAction::Email,
        _ => AlarmAction::Display,
    };
    Alarm {
        action,
        minutes_before: reminder.minutes,
        is_default,
    }
}

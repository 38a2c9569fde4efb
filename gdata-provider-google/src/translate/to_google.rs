use gdata_core::alarm::{AlarmAction, alarms_of};
use gdata_core::ics::{Component, Property};
use gdata_core::time::ItemTime;
use gdata_core::{GdataResult, ItemKind, LocalItem};
use serde_json::{Map, Value, json};

use super::{event_time_to_google, task_time_to_google};

pub trait ToGoogle {
    /// Full remote resource for this item.
    fn to_google(&self) -> GdataResult<Map<String, Value>>;
}

impl ToGoogle for LocalItem {
    fn to_google(&self) -> GdataResult<Map<String, Value>> {
        let kind = self.kind()?;
        let Some(component) = self.primary_component() else {
            return Ok(Map::new());
        };
        Ok(match kind {
            ItemKind::Event => event_to_google(component),
            ItemKind::Task => task_to_google(component),
        })
    }
}

fn event_to_google(vevent: &Component) -> Map<String, Value> {
    let mut out = Map::new();

    if let Some(uid) = vevent.value("UID") {
        out.insert("iCalUID".into(), json!(uid));
    }
    insert_text(&mut out, "summary", vevent, "SUMMARY");
    insert_text(&mut out, "description", vevent, "DESCRIPTION");
    insert_text(&mut out, "location", vevent, "LOCATION");

    let start = time_of(vevent, "DTSTART");
    let end = time_of(vevent, "DTEND").or_else(|| {
        // All-day events without DTEND last one day; timed ones are instants
        start.as_ref().map(|s| match s {
            ItemTime::Date(d) => ItemTime::Date(d.succ_opt().unwrap_or(*d)),
            other => other.clone(),
        })
    });
    if let Some(ref start) = start {
        out.insert("start".into(), event_time_to_google(start));
    }
    if let Some(ref end) = end {
        out.insert("end".into(), event_time_to_google(end));
    }
    if let Some(rid) = time_of(vevent, "RECURRENCE-ID") {
        out.insert("originalStartTime".into(), event_time_to_google(&rid));
    }

    let recurrence: Vec<Value> = vevent
        .properties
        .iter()
        .filter(|p| matches!(p.name.as_str(), "RRULE" | "EXRULE" | "RDATE" | "EXDATE"))
        .map(|p| Value::String(format_recurrence_line(p)))
        .collect();
    if !recurrence.is_empty() {
        out.insert("recurrence".into(), Value::Array(recurrence));
    }

    if let Some(status) = vevent.value("STATUS").and_then(status_to_google) {
        out.insert("status".into(), json!(status));
    }
    match vevent.value("TRANSP") {
        Some(t) if t.eq_ignore_ascii_case("TRANSPARENT") => {
            out.insert("transparency".into(), json!("transparent"));
        }
        Some(t) if t.eq_ignore_ascii_case("OPAQUE") => {
            out.insert("transparency".into(), json!("opaque"));
        }
        _ => {}
    }
    if let Some(visibility) = vevent.value("CLASS").and_then(visibility_from_class) {
        out.insert("visibility".into(), json!(visibility));
    }
    if let Some(sequence) = vevent.value("SEQUENCE").and_then(|s| s.trim().parse::<i64>().ok()) {
        out.insert("sequence".into(), json!(sequence));
    }

    out.insert("reminders".into(), reminders_to_google(vevent));

    let attendees: Vec<Value> = vevent
        .properties_named("ATTENDEE")
        .filter_map(attendee_to_google)
        .collect();
    if !attendees.is_empty() {
        out.insert("attendees".into(), Value::Array(attendees));
    }

    let attachments: Vec<Value> = vevent
        .properties_named("ATTACH")
        .map(|p| {
            let mut attachment = Map::new();
            attachment.insert("fileUrl".into(), json!(p.value));
            if let Some(title) = p.param("FILENAME") {
                attachment.insert("title".into(), json!(title));
            }
            if let Some(mime) = p.param("FMTTYPE") {
                attachment.insert("mimeType".into(), json!(mime));
            }
            if let Some(file_id) = p.param("X-GOOGLE-FILE-ID") {
                attachment.insert("fileId".into(), json!(file_id));
            }
            Value::Object(attachment)
        })
        .collect();
    if !attachments.is_empty() {
        out.insert("attachments".into(), Value::Array(attachments));
    }

    out
}

/// Tasks carry no parent or position here: the remote only changes those
/// through its move operation, and creation takes the parent as a query
/// parameter.
fn task_to_google(vtodo: &Component) -> Map<String, Value> {
    let mut out = Map::new();

    insert_text(&mut out, "title", vtodo, "SUMMARY");
    insert_text(&mut out, "notes", vtodo, "DESCRIPTION");

    let status = vtodo.value("STATUS").map(str::to_ascii_uppercase);
    let completed = status.as_deref() == Some("COMPLETED");
    out.insert(
        "status".into(),
        json!(if completed { "completed" } else { "needsAction" }),
    );
    if status.as_deref() == Some("CANCELLED") {
        out.insert("deleted".into(), json!(true));
    }

    if let Some(due) = time_of(vtodo, "DUE") {
        out.insert("due".into(), json!(task_time_to_google(&due)));
    }
    if let Some(done) = time_of(vtodo, "COMPLETED") {
        out.insert("completed".into(), json!(task_time_to_google(&done)));
    }

    out
}

fn insert_text(out: &mut Map<String, Value>, key: &str, component: &Component, name: &str) {
    if let Some(text) = component.value(name) {
        out.insert(key.into(), Value::String(text.to_string()));
    }
}

fn time_of(component: &Component, name: &str) -> Option<ItemTime> {
    component.property(name).and_then(ItemTime::from_property)
}

fn format_recurrence_line(prop: &Property) -> String {
    let mut line = prop.name.clone();
    for (key, value) in &prop.params {
        line.push(';');
        line.push_str(key);
        line.push('=');
        line.push_str(value);
    }
    line.push(':');
    line.push_str(&prop.value);
    line
}

fn status_to_google(status: &str) -> Option<&'static str> {
    match status.to_ascii_uppercase().as_str() {
        "CONFIRMED" => Some("confirmed"),
        "TENTATIVE" => Some("tentative"),
        "CANCELLED" => Some("cancelled"),
        _ => None,
    }
}

fn visibility_from_class(class: &str) -> Option<&'static str> {
    match class.to_ascii_uppercase().as_str() {
        "PUBLIC" => Some("public"),
        "PRIVATE" => Some("private"),
        "CONFIDENTIAL" => Some("confidential"),
        _ => None,
    }
}

/// Alarms tagged as default reminders collapse back into `useDefault`.
fn reminders_to_google(component: &Component) -> Value {
    let alarms = alarms_of(component);
    if alarms.iter().any(|a| a.is_default) {
        return json!({ "useDefault": true });
    }
    if alarms.is_empty() {
        return json!({ "useDefault": false });
    }

    let overrides: Vec<Value> = alarms
        .iter()
        .map(|a| {
            let method = match a.action {
                AlarmAction::Email => "email",
                AlarmAction::Display | AlarmAction::Audio => "popup",
            };
            json!({ "method": method, "minutes": a.minutes_before })
        })
        .collect();
    json!({ "useDefault": false, "overrides": overrides })
}

fn attendee_to_google(prop: &Property) -> Option<Value> {
    let email = prop
        .value
        .strip_prefix("mailto:")
        .or_else(|| prop.value.strip_prefix("MAILTO:"))
        .unwrap_or(&prop.value);
    if email.is_empty() {
        return None;
    }

    let mut attendee = Map::new();
    attendee.insert("email".into(), json!(email));
    if let Some(cn) = prop.param("CN") {
        attendee.insert("displayName".into(), json!(cn));
    }
    let response = match prop.param("PARTSTAT").map(str::to_ascii_uppercase).as_deref() {
        Some("ACCEPTED") => "accepted",
        Some("DECLINED") => "declined",
        Some("TENTATIVE") => "tentative",
        _ => "needsAction",
    };
    attendee.insert("responseStatus".into(), json!(response));
    if prop
        .param("ROLE")
        .is_some_and(|r| r.eq_ignore_ascii_case("OPT-PARTICIPANT"))
    {
        attendee.insert("optional".into(), json!(true));
    }
    if prop
        .param("CUTYPE")
        .is_some_and(|c| c.eq_ignore_ascii_case("RESOURCE"))
    {
        attendee.insert("resource".into(), json!(true));
    }
    Some(Value::Object(attendee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdata_core::alarm::Alarm;

    fn make_test_vtodo() -> Component {
        let mut vtodo = Component::new("VTODO");
        vtodo.push_property(Property::new("UID", "lqohjsbhqoztdkusnpruvooacn"));
        vtodo.push_property(Property::new("SUMMARY", "New Task"));
        vtodo.push_property(Property::new("DESCRIPTION", "description"));
        vtodo.push_property(Property::new("STATUS", "COMPLETED"));
        vtodo.push_property(Property::new("DUE", "20060610T180000"));
        vtodo.push_property(Property::new("COMPLETED", "20060611T180000"));
        vtodo.push_property(Property::new("RELATED-TO", "parentId").with_param("RELTYPE", "PARENT"));
        vtodo
    }

    #[test]
    fn test_task_to_google() {
        let resource = task_to_google(&make_test_vtodo());
        assert_eq!(
            Value::Object(resource),
            json!({
                "title": "New Task",
                "notes": "description",
                "status": "completed",
                "due": "2006-06-10T18:00:00.000Z",
                "completed": "2006-06-11T18:00:00.000Z",
            })
        );
    }

    #[test]
    fn test_task_item_in_vcalendar_wrapper() {
        let mut vcalendar = Component::new("VCALENDAR");
        vcalendar.push_component(make_test_vtodo());
        let item = LocalItem::new("lqohjsbhqoztdkusnpruvooacn", ItemKind::Task, vcalendar);

        let resource = item.to_google().unwrap();
        assert_eq!(resource["title"], json!("New Task"));
    }

    #[test]
    fn test_reminders_to_google() {
        let mut vevent = Component::new("VEVENT");
        assert_eq!(reminders_to_google(&vevent), json!({ "useDefault": false }));

        vevent.push_component(
            Alarm {
                action: AlarmAction::Email,
                minutes_before: 30,
                is_default: false,
            }
            .to_component(),
        );
        assert_eq!(
            reminders_to_google(&vevent),
            json!({ "useDefault": false, "overrides": [{ "method": "email", "minutes": 30 }] })
        );

        vevent.push_component(
            Alarm {
                action: AlarmAction::Display,
                minutes_before: 120,
                is_default: true,
            }
            .to_component(),
        );
        assert_eq!(reminders_to_google(&vevent), json!({ "useDefault": true }));
    }

    #[test]
    fn test_event_to_google_fields() {
        let mut vevent = Component::new("VEVENT");
        vevent.push_property(Property::new("UID", "abc@google.com"));
        vevent.push_property(Property::new("DTSTART", "20240108").with_param("VALUE", "DATE"));
        vevent.push_property(Property::new("RRULE", "FREQ=WEEKLY;BYDAY=MO"));
        vevent.push_property(
            Property::new("EXDATE", "20240115").with_param("VALUE", "DATE"),
        );
        vevent.push_property(Property::new("TRANSP", "TRANSPARENT"));
        vevent.push_property(Property::new("CLASS", "PRIVATE"));
        vevent.push_property(
            Property::new("ATTENDEE", "mailto:a@example.com")
                .with_param("CN", "Ann")
                .with_param("PARTSTAT", "TENTATIVE"),
        );

        let resource = event_to_google(&vevent);
        assert_eq!(resource["iCalUID"], json!("abc@google.com"));
        assert_eq!(resource["start"], json!({ "date": "2024-01-08" }));
        assert_eq!(resource["end"], json!({ "date": "2024-01-09" }));
        assert_eq!(
            resource["recurrence"],
            json!(["RRULE:FREQ=WEEKLY;BYDAY=MO", "EXDATE;VALUE=DATE:20240115"])
        );
        assert_eq!(resource["transparency"], json!("transparent"));
        assert_eq!(resource["visibility"], json!("private"));
        assert_eq!(
            resource["attendees"],
            json!([{ "email": "a@example.com", "displayName": "Ann", "responseStatus": "tentative" }])
        );
    }
}

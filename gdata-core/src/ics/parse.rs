//! ICS parsing using the icalendar crate's parser.

use crate::error::{GdataError, GdataResult};
use crate::ics::component::{Component, Property};
use icalendar::parser::{read_calendar, unfold};

/// Parse ICS content into a VCALENDAR component tree.
///
/// Content holding a bare VEVENT/VTODO (no VCALENDAR wrapper) is accepted and
/// wrapped.
pub fn parse_calendar(content: &str) -> GdataResult<Component> {
    let trimmed = content.trim_start();
    let wrapped;
    let source = if trimmed
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        trimmed
    } else {
        wrapped = format!("BEGIN:VCALENDAR\r\n{}\r\nEND:VCALENDAR\r\n", trimmed.trim_end());
        &wrapped
    };

    let unfolded = unfold(source);
    let calendar = read_calendar(&unfolded).map_err(|e| GdataError::IcsParse(e.to_string()))?;

    let mut root = Component::new("VCALENDAR");
    root.properties = calendar.properties.iter().map(convert_property).collect();
    root.components = calendar.components.iter().map(convert_component).collect();
    Ok(root)
}

/// Parse ICS content and return its first VEVENT or VTODO.
pub fn parse_item_component(content: &str) -> GdataResult<Component> {
    let calendar = parse_calendar(content)?;
    calendar
        .components
        .into_iter()
        .find(|c| c.is("VEVENT") || c.is("VTODO"))
        .ok_or_else(|| GdataError::IcsParse("no VEVENT or VTODO component".into()))
}

fn convert_component(component: &icalendar::parser::Component) -> Component {
    let mut out = Component::new(component.name.as_ref());
    out.properties = component.properties.iter().map(convert_property).collect();
    out.components = component.components.iter().map(convert_component).collect();
    out
}

fn convert_property(property: &icalendar::parser::Property) -> Property {
    let mut out = Property::new(property.name.as_ref(), property.val.as_ref());
    for param in &property.params {
        let value = param
            .val
            .as_ref()
            .map(|v| v.as_ref().trim_matches('"').to_string())
            .unwrap_or_default();
        out.set_param(param.key.as_ref(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_alarm_and_params() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:abc-123\r\n\
SUMMARY:Planning\\, round two\r\n\
DTSTART;TZID=Europe/Berlin:20240108T100000\r\n\
DTEND;TZID=Europe/Berlin:20240108T110000\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
TRIGGER:-PT15M\r\n\
DESCRIPTION:Reminder\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let calendar = parse_calendar(ics).expect("Should parse");
        assert_eq!(calendar.value("PRODID"), Some("TEST"));
        let vevent = calendar.first_subcomponent("VEVENT").expect("VEVENT");

        assert_eq!(vevent.value("UID"), Some("abc-123"));
        assert_eq!(vevent.value("SUMMARY"), Some("Planning, round two"));
        assert_eq!(
            vevent.property("DTSTART").and_then(|p| p.param("TZID")),
            Some("Europe/Berlin")
        );
        let alarm = vevent.first_subcomponent("VALARM").expect("VALARM");
        assert_eq!(alarm.value("TRIGGER"), Some("-PT15M"));
    }

    #[test]
    fn bare_todo_is_wrapped() {
        let ics = "BEGIN:VTODO\r\nUID:task-1\r\nSUMMARY:Buy milk\r\nEND:VTODO\r\n";

        let vtodo = parse_item_component(ics).expect("Should parse");
        assert!(vtodo.is("VTODO"));
        assert_eq!(vtodo.value("SUMMARY"), Some("Buy milk"));
    }

    #[test]
    fn line_folding_is_undone() {
        let ics = "BEGIN:VCALENDAR\r\n\
BEGIN:VEVENT\r\n\
UID:test-123\r\n\
DESCRIPTION:Hello \r\n world and \r\n more text\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let vevent = parse_item_component(ics).expect("Should parse");
        assert_eq!(
            vevent.value("DESCRIPTION"),
            Some("Hello world and more text")
        );
    }
}

//! ICS file generation.

use crate::ics::component::{Component, Property};
use icalendar::{Calendar, Component as _, Event, Todo};

const PRODID: &str = "-//gdata-sync//EN";

/// Generate .ics content for a component.
///
/// A VCALENDAR is written as is; any other component is wrapped in a minimal
/// VCALENDAR (VERSION + PRODID).
pub fn generate_ics(component: &Component) -> String {
    let mut cal = Calendar::empty();

    let wrapper;
    let root = if component.is("VCALENDAR") {
        component
    } else {
        wrapper = {
            let mut calendar = Component::new("VCALENDAR");
            calendar.push_property(Property::new("VERSION", "2.0"));
            calendar.push_property(Property::new("PRODID", PRODID));
            calendar.push_component(component.clone());
            calendar
        };
        &wrapper
    };

    for property in &root.properties {
        cal.append_property(ical_property(property));
    }

    for child in &root.components {
        if child.is("VEVENT") {
            let mut event = Event::new();
            fill(&mut event, child);
            cal.push(event.done());
        } else if child.is("VTODO") {
            let mut todo = Todo::new();
            fill(&mut todo, child);
            cal.push(todo.done());
        } else {
            cal.push(parsed_component(child));
        }
    }

    strip_injected(&cal.done().to_string(), root)
}

/// Copy properties and subcomponents; repeated names go in as multi-properties
/// so none of them collapse.
fn fill<C: icalendar::Component>(target: &mut C, source: &Component) {
    for property in &source.properties {
        if source.properties_named(&property.name).count() > 1 {
            target.append_multi_property(ical_property(property));
        } else {
            target.append_property(ical_property(property));
        }
    }
    for child in &source.components {
        target.append_component(parsed_component(child));
    }
}

fn ical_property(property: &Property) -> icalendar::Property {
    let mut out = icalendar::Property::new(&property.name, &property.value);
    for (key, value) in &property.params {
        out.add_parameter(key, value);
    }
    out
}

fn parsed_component(component: &Component) -> icalendar::parser::Component<'static> {
    icalendar::parser::Component {
        name: component.name.clone().into(),
        properties: component
            .properties
            .iter()
            .map(|p| ical_property(p).into())
            .collect(),
        components: component.components.iter().map(parsed_component).collect(),
    }
}

/// The icalendar crate adds DTSTAMP and UID to every component that lacks
/// them (VALARM included). Drop the ones the source tree did not have.
fn strip_injected(ics: &str, root: &Component) -> String {
    let mut present = Vec::new();
    for child in &root.components {
        collect_presence(child, &mut present);
    }
    let mut pending = present.into_iter();
    let mut stack: Vec<(bool, bool)> = Vec::new();

    let mut result = String::with_capacity(ics.len());
    for line in ics.lines() {
        if line.starts_with("BEGIN:") && line != "BEGIN:VCALENDAR" {
            stack.push(pending.next().unwrap_or((true, true)));
        } else if line.starts_with("END:") && line != "END:VCALENDAR" {
            stack.pop();
        } else if let Some(&(has_dtstamp, has_uid)) = stack.last() {
            if (!has_dtstamp && line.starts_with("DTSTAMP:"))
                || (!has_uid && line.starts_with("UID:"))
            {
                continue;
            }
        }
        result.push_str(line);
        result.push_str("\r\n");
    }
    result
}

fn collect_presence(component: &Component, out: &mut Vec<(bool, bool)>) {
    out.push((
        component.property("DTSTAMP").is_some(),
        component.property("UID").is_some(),
    ));
    for child in &component.components {
        collect_presence(child, out);
    }
}

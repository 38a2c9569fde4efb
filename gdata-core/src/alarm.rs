//! Typed view over VALARM sub-components.

use crate::ics::{Component, Property};

/// Marks alarms that stand in for the calendar's default reminders.
pub const DEFAULT_ALARM_PROP: &str = "X-DEFAULT-ALARM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    Display,
    Email,
    Audio,
}

impl AlarmAction {
    pub fn as_ics_str(&self) -> &'static str {
        match self {
            AlarmAction::Display => "DISPLAY",
            AlarmAction::Email => "EMAIL",
            AlarmAction::Audio => "AUDIO",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DISPLAY" => Some(AlarmAction::Display),
            "EMAIL" => Some(AlarmAction::Email),
            "AUDIO" => Some(AlarmAction::Audio),
            _ => None,
        }
    }
}

/// A reminder relative to the item start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub action: AlarmAction,
    /// Minutes before start; negative values trigger after start
    pub minutes_before: i64,
    /// Derived from the calendar's default reminders rather than set on the item
    pub is_default: bool,
}

impl Alarm {
    pub fn from_component(valarm: &Component) -> Option<Alarm> {
        let trigger = valarm.property("TRIGGER")?;
        // Absolute triggers have no remote counterpart
        if trigger
            .param("VALUE")
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE-TIME"))
        {
            return None;
        }
        let minutes_before = parse_trigger_minutes(&trigger.value)?;
        let action = valarm
            .value("ACTION")
            .and_then(AlarmAction::from_ics_str)
            .unwrap_or(AlarmAction::Display);
        let is_default = valarm
            .value(DEFAULT_ALARM_PROP)
            .is_some_and(|v| v.eq_ignore_ascii_case("TRUE"));

        Some(Alarm {
            action,
            minutes_before,
            is_default,
        })
    }

    pub fn to_component(&self) -> Component {
        let mut valarm = Component::new("VALARM");
        valarm.push_property(Property::new("ACTION", self.action.as_ics_str()));
        valarm.push_property(Property::new(
            "TRIGGER",
            format_trigger_minutes(self.minutes_before),
        ));
        valarm.push_property(Property::new("DESCRIPTION", "Reminder"));
        if self.is_default {
            valarm.push_property(Property::new(DEFAULT_ALARM_PROP, "TRUE"));
        }
        valarm
    }
}

/// All alarms of an item component, skipping ones that can't be expressed
/// as a relative reminder.
pub fn alarms_of(component: &Component) -> Vec<Alarm> {
    component
        .subcomponents("VALARM")
        .filter_map(Alarm::from_component)
        .collect()
}

/// Parse TRIGGER value to minutes before start (-PT30M, -P1D, etc.)
pub fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let value = value.trim();
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let minutes = (std_duration.as_secs() / 60) as i64;

    Some(if is_before { minutes } else { -minutes })
}

/// Format minutes-before-start as a TRIGGER duration, preferring whole
/// weeks, days or hours when they divide evenly.
pub fn format_trigger_minutes(minutes_before: i64) -> String {
    let sign = if minutes_before >= 0 { "-" } else { "" };
    let m = minutes_before.abs();

    if m == 0 {
        "PT0S".to_string()
    } else if m % (7 * 24 * 60) == 0 {
        format!("{}P{}W", sign, m / (7 * 24 * 60))
    } else if m % (24 * 60) == 0 {
        format!("{}P{}D", sign, m / (24 * 60))
    } else if m % 60 == 0 {
        format!("{}PT{}H", sign, m / 60)
    } else {
        format!("{}PT{}M", sign, m)
    }
}

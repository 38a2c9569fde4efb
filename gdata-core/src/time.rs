//! Typed date/time values as they appear on DTSTART, DUE, COMPLETED and friends.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ics::Property;

const ICS_DATE: &str = "%Y%m%d";
const ICS_DATE_TIME: &str = "%Y%m%dT%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    /// Wall-clock time with no zone attached
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

impl ItemTime {
    /// Read a date/time property, honouring `VALUE=DATE` and `TZID`.
    pub fn from_property(prop: &Property) -> Option<ItemTime> {
        let value = prop.value.trim();
        let is_date = prop
            .param("VALUE")
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
            || (value.len() == 8 && !value.contains('T'));

        if is_date {
            NaiveDate::parse_from_str(value, ICS_DATE)
                .ok()
                .map(ItemTime::Date)
        } else if let Some(tzid) = prop.param("TZID") {
            NaiveDateTime::parse_from_str(value, ICS_DATE_TIME)
                .ok()
                .map(|datetime| ItemTime::DateTimeZoned {
                    datetime,
                    tzid: tzid.to_string(),
                })
        } else if let Some(utc) = value.strip_suffix('Z') {
            NaiveDateTime::parse_from_str(utc, ICS_DATE_TIME)
                .ok()
                .map(|dt| ItemTime::DateTimeUtc(dt.and_utc()))
        } else {
            NaiveDateTime::parse_from_str(value, ICS_DATE_TIME)
                .ok()
                .map(ItemTime::DateTimeFloating)
        }
    }

    pub fn to_property(&self, name: &str) -> Property {
        match self {
            ItemTime::Date(d) => {
                Property::new(name, d.format(ICS_DATE).to_string()).with_param("VALUE", "DATE")
            }
            ItemTime::DateTimeUtc(dt) => {
                Property::new(name, format!("{}Z", dt.format(ICS_DATE_TIME)))
            }
            ItemTime::DateTimeFloating(dt) => {
                Property::new(name, dt.format(ICS_DATE_TIME).to_string())
            }
            ItemTime::DateTimeZoned { datetime, tzid } => {
                Property::new(name, datetime.format(ICS_DATE_TIME).to_string())
                    .with_param("TZID", tzid.clone())
            }
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, ItemTime::Date(_))
    }
}

impl fmt::Display for ItemTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemTime::Date(d) => write!(f, "{}", d),
            ItemTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S UTC")),
            ItemTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            ItemTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} {}", datetime.format("%Y-%m-%d %H:%M:%S"), tzid)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reads_each_shape() {
        let date = Property::new("DTSTART", "20240108").with_param("VALUE", "DATE");
        assert_eq!(
            ItemTime::from_property(&date),
            Some(ItemTime::Date(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()))
        );

        let utc = Property::new("DTSTART", "20240108T100000Z");
        assert_eq!(
            ItemTime::from_property(&utc),
            Some(ItemTime::DateTimeUtc(
                Utc.with_ymd_and_hms(2024, 1, 8, 10, 0, 0).unwrap()
            ))
        );

        let zoned = Property::new("DTSTART", "20240108T100000").with_param("TZID", "America/New_York");
        match ItemTime::from_property(&zoned) {
            Some(ItemTime::DateTimeZoned { tzid, .. }) => assert_eq!(tzid, "America/New_York"),
            other => panic!("Expected DateTimeZoned, got {:?}", other),
        }

        let floating = Property::new("DUE", "20060610T180000");
        assert!(matches!(
            ItemTime::from_property(&floating),
            Some(ItemTime::DateTimeFloating(_))
        ));
    }

    #[test]
    fn property_round_trip_preserves_value_and_params() {
        let zoned = Property::new("DTEND", "20240108T110000").with_param("TZID", "Europe/Berlin");
        let time = ItemTime::from_property(&zoned).expect("Should parse");
        assert_eq!(time.to_property("DTEND"), zoned);

        let date = ItemTime::Date(NaiveDate::from_ymd_opt(2025, 3, 20).unwrap());
        let prop = date.to_property("DTSTART");
        assert_eq!(prop.value, "20250320");
        assert_eq!(prop.param("VALUE"), Some("DATE"));
    }
}

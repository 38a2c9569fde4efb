//! iCalendar component tree plus reading and writing of .ics text (RFC 5545).

mod component;
mod generate;
mod parse;

pub use component::{Component, Property};
pub use generate::generate_ics;
pub use parse::{parse_calendar, parse_item_component};

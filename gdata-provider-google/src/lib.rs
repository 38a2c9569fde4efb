//! gdata-provider-google - Google Calendar and Tasks sync engine.
//!
//! Keeps a host's local calendar/task store in step with the Calendar v3 and
//! Tasks v1 APIs:
//! - `translate`: local items ↔ remote JSON resources, diff-only patches
//! - `locator`: remote collection addresses from a calendar's source locator
//! - `request`: authenticated requests over an injected HTTP transport
//! - `concurrency`: `If-Match` preconditions and write-result interpretation
//! - `sync`: the incremental sync pass
//! - `registry`: one sync object per calendar, wired to the host event bus

pub mod calendar;
pub mod concurrency;
pub mod locator;
mod occurrences;
pub mod registry;
pub mod request;
mod sync;
pub mod translate;
pub mod types;

pub use calendar::{EngineContext, GoogleCalendar};
pub use locator::Endpoints;
pub use registry::CalendarRegistry;
pub use request::{ApiClient, HttpTransport, ReqwestTransport, TokenProvider};

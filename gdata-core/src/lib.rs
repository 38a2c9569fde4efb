//! Core types for gdata-sync.
//!
//! This crate provides the provider-neutral pieces shared by the sync engine
//! and its hosts:
//! - `LocalItem` and the iCalendar component tree it carries
//! - ICS text parsing and generation
//! - host collaborator traits (calendar host, idle monitor, preference store)
//! - lifecycle hooks and the in-process event bus

pub mod alarm;
pub mod error;
pub mod hooks;
pub mod host;
pub mod ics;
pub mod item;
pub mod memory;
pub mod prefs;
pub mod time;

pub use error::{GdataError, GdataResult};
pub use hooks::{HookEvent, HookKind, HookOutcome, ProviderHooks, SyncOutcome, SyncStats};
pub use host::{CalendarHost, CalendarRegistration, CalendarUpdate, IdleMonitor, IdleState, PreferenceStore};
pub use item::{ItemKind, ItemMetadata, LocalItem};

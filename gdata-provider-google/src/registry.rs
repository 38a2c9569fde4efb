//! Process-wide registry of calendar sync objects.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gdata_core::hooks::{EventBus, HookEvent, HookKind, HookListener, HookOutcome, dispatch};
use gdata_core::host::{CalendarRegistration, GDATA_CALENDAR_TYPE};
use gdata_core::{GdataError, GdataResult};
use tokio::sync::Mutex;
use tracing::debug;

use crate::calendar::{EngineContext, GoogleCalendar};

/// Owns exactly one [`GoogleCalendar`] per calendar id for the lifetime of
/// the process.
pub struct CalendarRegistry {
    ctx: EngineContext,
    calendars: Mutex<HashMap<String, Arc<GoogleCalendar>>>,
}

impl CalendarRegistry {
    pub fn new(ctx: EngineContext) -> Self {
        CalendarRegistry {
            ctx,
            calendars: Mutex::new(HashMap::new()),
        }
    }

    /// Sync object for a calendar, built on first lookup.
    pub async fn get(&self, id: &str) -> GdataResult<Arc<GoogleCalendar>> {
        let mut calendars = self.calendars.lock().await;
        if let Some(calendar) = calendars.get(id) {
            return Ok(calendar.clone());
        }

        let registration = self
            .ctx
            .host
            .calendar(id)
            .await?
            .ok_or_else(|| GdataError::CalendarNotFound(id.to_string()))?;
        let calendar = Arc::new(self.build(&registration)?);
        calendars.insert(id.to_string(), calendar.clone());
        Ok(calendar)
    }

    fn build(&self, registration: &CalendarRegistration) -> GdataResult<GoogleCalendar> {
        if registration.calendar_type != GDATA_CALENDAR_TYPE {
            return Err(GdataError::UnsupportedCalendarKind(
                registration.calendar_type.clone(),
            ));
        }
        debug!(calendar = %registration.id, cache = %registration.cache_id, "Creating calendar sync object");
        Ok(GoogleCalendar::new(registration, self.ctx.clone()))
    }

    /// Register this registry for every lifecycle hook on `bus`.
    pub fn init_listeners(self: &Arc<Self>, bus: &dyn EventBus) {
        for kind in HookKind::ALL {
            bus.add_listener(kind, self.clone());
        }
    }
}

#[async_trait]
impl HookListener for CalendarRegistry {
    async fn handle(
        &self,
        calendar: &CalendarRegistration,
        event: HookEvent,
    ) -> GdataResult<HookOutcome> {
        let target = self.get(&calendar.id).await?;
        dispatch(target.as_ref(), event).await
    }
}

use anyhow::Result;
use gdata_core::hooks::HookEvent;
use gdata_core::host::CalendarRegistration;
use owo_colors::OwoColorize;

use super::{Host, finish};

/// Forget sync state so the next sync fetches everything again.
pub async fn run(host: &Host, calendars: Vec<CalendarRegistration>) -> Result<()> {
    let mut failed = 0;

    for calendar in &calendars {
        match host.emit(calendar, HookEvent::ResetSync).await {
            Ok(_) => println!("{} {}", calendar.id.bold(), "reset".green()),
            Err(e) => {
                failed += 1;
                println!("{} {}", calendar.id.bold(), e.to_string().red());
            }
        }
    }

    finish(failed)
}

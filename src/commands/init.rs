use anyhow::Result;
use gdata_core::hooks::HookEvent;
use gdata_core::host::CalendarRegistration;
use owo_colors::OwoColorize;

use super::{Host, finish};

pub async fn run(host: &Host, calendars: Vec<CalendarRegistration>) -> Result<()> {
    let mut failed = 0;

    for calendar in &calendars {
        print!("{} ", calendar.id.bold());

        match host.emit(calendar, HookEvent::Init).await {
            Ok(_) => {
                let organizer = host
                    .calendars
                    .registrations()
                    .await
                    .into_iter()
                    .find(|c| c.id == calendar.id)
                    .and_then(|c| c.capabilities.organizer);
                match organizer {
                    Some(address) => println!("{}", address.green()),
                    None => println!("{}", "no remote address".yellow()),
                }
            }
            Err(e) => {
                failed += 1;
                println!("{}", e.to_string().red());
            }
        }
    }

    finish(failed)
}

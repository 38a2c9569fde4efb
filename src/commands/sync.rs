use anyhow::Result;
use gdata_core::hooks::{HookEvent, HookOutcome, SyncOutcome, SyncStats};
use gdata_core::host::CalendarRegistration;
use owo_colors::OwoColorize;

use super::{Host, finish};

pub async fn run(host: &Host, calendars: Vec<CalendarRegistration>) -> Result<()> {
    let mut failed = 0;
    let mut totals = SyncStats::default();

    for (i, calendar) in calendars.iter().enumerate() {
        println!("{}", calendar.id.bold());

        match host.emit(calendar, HookEvent::Sync).await {
            Ok(Some(HookOutcome::Synced(SyncOutcome::Completed(stats)))) => {
                let cached = host.calendars.items(&calendar.cache_id).await?.len();
                println!("   {} {}", render_stats(&stats), format!("({} cached)", cached).dimmed());
                if stats.cache_cleared {
                    println!("   {}", "Local cache was reset".yellow());
                }
                totals.events_applied += stats.events_applied;
                totals.events_removed += stats.events_removed;
                totals.tasks_applied += stats.tasks_applied;
                totals.tasks_removed += stats.tasks_removed;
            }
            Ok(Some(HookOutcome::Synced(SyncOutcome::SkippedIdle))) => {
                println!("   {}", "Skipped (idle)".dimmed());
            }
            Ok(_) => println!("   {}", "Nothing to do".dimmed()),
            Err(e) => {
                failed += 1;
                println!("   {}", e.to_string().red());
            }
        }

        if i < calendars.len() - 1 {
            println!();
        }
    }

    if calendars.len() > 1 && totals.total() > 0 {
        println!("\nTotal: {}", render_stats(&totals));
    }

    finish(failed)
}

fn render_stats(stats: &SyncStats) -> String {
    if stats.total() == 0 {
        return "Up to date".dimmed().to_string();
    }
    format!(
        "Events: {} updated, {} removed. Tasks: {} updated, {} removed",
        stats.events_applied.green(),
        stats.events_removed.red(),
        stats.tasks_applied.green(),
        stats.tasks_removed.red()
    )
}

pub mod init;
pub mod reset;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use gdata_core::hooks::{HookEvent, HookOutcome, LocalBus};
use gdata_core::host::CalendarRegistration;
use gdata_core::memory::FixedIdleMonitor;
use gdata_core::GdataResult;
use gdata_provider_google::{ApiClient, CalendarRegistry, EngineContext, ReqwestTransport};

use crate::config::GdataConfig;
use crate::session::FileTokenProvider;
use crate::store::{FileCalendarHost, FilePreferenceStore};

/// The host side of the engine: file stores plus the event bus every
/// command talks through.
pub struct Host {
    pub calendars: Arc<FileCalendarHost>,
    bus: LocalBus,
}

impl Host {
    pub async fn open(config: &GdataConfig) -> Result<Self> {
        let data_dir = config.data_path();

        let calendars = Arc::new(
            FileCalendarHost::open(&data_dir, config.registrations())
                .await
                .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?,
        );
        let prefs = Arc::new(
            FilePreferenceStore::open(&data_dir.join("prefs.json"))
                .await
                .context("Failed to load preferences")?,
        );
        let tokens = Arc::new(FileTokenProvider::new(&config.session_path()));

        let ctx = EngineContext {
            host: calendars.clone(),
            prefs,
            // A command run is always user initiated
            idle: Arc::new(FixedIdleMonitor::default()),
            client: ApiClient::new(Arc::new(ReqwestTransport::default()), tokens),
            endpoints: config.api.endpoints(),
        };

        let registry = Arc::new(CalendarRegistry::new(ctx));
        let bus = LocalBus::new();
        registry.init_listeners(&bus);

        Ok(Host { calendars, bus })
    }

    /// Configured calendars, or just the one named by `filter`.
    pub async fn select(&self, filter: Option<&str>) -> Result<Vec<CalendarRegistration>> {
        let all = self.calendars.registrations().await;

        if all.is_empty() {
            anyhow::bail!(
                "No calendars configured.\n\n\
                Add one to {}:\n\n  \
                [[calendars]]\n  \
                id = \"personal\"\n  \
                url = \"googleapi://you%40gmail.com/?calendar=you%40gmail.com&tasks=%40default\"",
                GdataConfig::config_path()?.display()
            );
        }

        match filter {
            Some(id) => match all.iter().find(|c| c.id == id) {
                Some(calendar) => Ok(vec![calendar.clone()]),
                None => {
                    let available: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
                    anyhow::bail!(
                        "Calendar '{}' not found. Available: {}",
                        id,
                        available.join(", ")
                    );
                }
            },
            None => Ok(all),
        }
    }

    /// Deliver one hook event for a calendar and return the listener's result.
    pub async fn emit(
        &self,
        calendar: &CalendarRegistration,
        event: HookEvent,
    ) -> GdataResult<Option<HookOutcome>> {
        Ok(self.bus.emit(calendar, event).await?.pop())
    }
}

/// Fail the command when any calendar failed, after all were attempted.
fn finish(failed: usize) -> Result<()> {
    if failed > 0 {
        anyhow::bail!(
            "{} calendar{} failed",
            failed,
            if failed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

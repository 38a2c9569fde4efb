//! Error types for gdata-sync.

use thiserror::Error;

/// Errors that can occur while translating or synchronizing calendar items.
#[derive(Error, Debug)]
pub enum GdataError {
    #[error("Invalid calendar type: {0}")]
    UnsupportedCalendarKind(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Calendar '{0}' has no resolvable remote address")]
    UnresolvedAddress(String),

    #[error("Unknown item type: {0}")]
    UnknownItemKind(String),

    #[error("Sync token for {0} is no longer valid")]
    StaleSyncToken(String),

    #[error("Last update floor {0} is older than the freshness horizon")]
    StalePreferenceWindow(String),

    #[error("Write conflict on {resource} (HTTP {status})")]
    WriteConflict { status: u16, resource: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Received invalid json response: {0}")]
    Decode(String),

    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Host error: {0}")]
    Host(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GdataError {
    /// Conditions the sync orchestrator resolves on its own by falling back
    /// to a full resync.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GdataError::StaleSyncToken(_) | GdataError::StalePreferenceWindow(_)
        )
    }
}

impl From<serde_json::Error> for GdataError {
    fn from(e: serde_json::Error) -> Self {
        GdataError::Serialization(e.to_string())
    }
}

/// Result type alias for gdata operations.
pub type GdataResult<T> = Result<T, GdataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_conditions_are_recoverable() {
        assert!(GdataError::StaleSyncToken("events".into()).is_recoverable());
        assert!(GdataError::StalePreferenceWindow("2020-01-01".into()).is_recoverable());
        assert!(
            !GdataError::WriteConflict {
                status: 412,
                resource: "x".into()
            }
            .is_recoverable()
        );
        assert!(!GdataError::Decode("blergh".into()).is_recoverable());
    }

    #[test]
    fn unknown_kind_message_names_the_type() {
        let err = GdataError::UnknownItemKind("wat".into());
        assert_eq!(err.to_string(), "Unknown item type: wat");
    }
}

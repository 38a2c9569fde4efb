//! Write preconditions and write-result interpretation.

use gdata_core::{GdataError, GdataResult};
use serde_json::Value;

use crate::request::{ApiRequest, ApiResponse, decode_body};

pub const IF_MATCH: &str = "If-Match";

/// Concurrency precondition attached to a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Creates carry none
    None,
    /// Only apply if the remote is still at this version tag
    Match(String),
    /// Apply regardless of the remote's current state
    Any,
}

impl Precondition {
    /// Precondition for an update or delete of an item with this version tag.
    pub fn for_existing(etag: Option<&str>) -> Self {
        match etag {
            Some(etag) if !etag.is_empty() => Precondition::Match(etag.to_string()),
            _ => Precondition::Any,
        }
    }

    pub fn header_value(&self) -> Option<&str> {
        match self {
            Precondition::None => None,
            Precondition::Match(etag) => Some(etag),
            Precondition::Any => Some("*"),
        }
    }

    pub fn apply(&self, request: ApiRequest) -> ApiRequest {
        match self.header_value() {
            Some(value) => request.with_header(IF_MATCH, value),
            None => request,
        }
    }
}

/// Ask the remote to notify other attendees about this write.
pub fn with_notifications(request: ApiRequest, send: bool) -> ApiRequest {
    if send {
        request.with_query("sendUpdates", "all")
    } else {
        request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

/// Turn the response of a write into its resource, if any.
///
/// 409/412 mean the remote moved on since our version tag and surface as
/// [`GdataError::WriteConflict`]. Deleting something already gone counts as
/// success.
pub fn interpret_write(
    op: WriteOp,
    resource: &str,
    url: &str,
    response: &ApiResponse,
) -> GdataResult<Option<Value>> {
    match response.status {
        409 | 412 => Err(GdataError::WriteConflict {
            status: response.status,
            resource: resource.to_string(),
        }),
        404 | 410 if op == WriteOp::Delete => Ok(None),
        _ => decode_body(url, response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn precondition_uses_etag_or_wildcard() {
        let tagged = Precondition::for_existing(Some("\"V1\""));
        assert_eq!(tagged.header_value(), Some("\"V1\""));

        let untagged = Precondition::for_existing(None);
        assert_eq!(untagged.header_value(), Some("*"));

        let request = untagged.apply(ApiRequest::get("https://example.com"));
        assert_eq!(request.header("if-match"), Some("*"));

        let request = Precondition::None.apply(ApiRequest::get("https://example.com"));
        assert_eq!(request.header(IF_MATCH), None);
    }

    #[test]
    fn notifications_toggle_adds_send_updates() {
        let request = with_notifications(ApiRequest::get("https://example.com/events"), true);
        assert_eq!(request.full_url(), "https://example.com/events?sendUpdates=all");

        let request = with_notifications(ApiRequest::get("https://example.com/events"), false);
        assert_eq!(request.full_url(), "https://example.com/events");
    }

    #[test]
    fn conflicts_are_typed() {
        for status in [409, 412] {
            let err = interpret_write(WriteOp::Update, "abc", "u", &response(status, "")).unwrap_err();
            assert!(matches!(err, GdataError::WriteConflict { .. }));
            assert!(!err.is_recoverable());
        }
    }

    #[test]
    fn deleting_a_gone_resource_succeeds() {
        assert_eq!(
            interpret_write(WriteOp::Delete, "abc", "u", &response(410, "")).unwrap(),
            None
        );
        assert!(interpret_write(WriteOp::Update, "abc", "u", &response(404, "")).is_err());
    }

    #[test]
    fn no_content_write_is_success() {
        assert_eq!(
            interpret_write(WriteOp::Delete, "abc", "u", &response(204, "")).unwrap(),
            None
        );
    }
}

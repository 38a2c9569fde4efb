//! Local items as held by the host calendar store.
//!
//! A local item is a thin envelope (id, type tag, title, sync metadata) around
//! an iCalendar component tree. The body is either a VCALENDAR holding one
//! VEVENT/VTODO per occurrence, or a bare VEVENT/VTODO.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GdataError, GdataResult};
use crate::ics::Component;
use crate::time::ItemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Event,
    Task,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Event => "event",
            ItemKind::Task => "task",
        }
    }

    /// Name of the iCalendar component carrying items of this kind.
    pub fn component_name(&self) -> &'static str {
        match self {
            ItemKind::Event => "VEVENT",
            ItemKind::Task => "VTODO",
        }
    }
}

impl FromStr for ItemKind {
    type Err = GdataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "event" => Ok(ItemKind::Event),
            "task" => Ok(ItemKind::Task),
            other => Err(GdataError::UnknownItemKind(other.to_string())),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync bookkeeping attached to an item by this engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Version tag of the remote revision this item was last synced with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Remote resource id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalItem {
    pub id: String,
    /// Kind tag as given by the host ("event" or "task")
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: ItemMetadata,
    pub body: Component,
}

impl LocalItem {
    pub fn new(id: &str, kind: ItemKind, body: Component) -> Self {
        let title = body.value("SUMMARY").map(str::to_string);
        LocalItem {
            id: id.to_string(),
            item_type: kind.as_str().to_string(),
            title,
            metadata: ItemMetadata::default(),
            body,
        }
    }

    pub fn kind(&self) -> GdataResult<ItemKind> {
        self.item_type.parse()
    }

    /// Remote id used for addressing the resource.
    pub fn remote_id(&self) -> &str {
        self.metadata.path.as_deref().unwrap_or(&self.id)
    }

    pub fn etag(&self) -> Option<&str> {
        self.metadata.etag.as_deref()
    }

    /// The main VEVENT/VTODO: the body itself when it is one, otherwise the
    /// first occurrence without a RECURRENCE-ID (falling back to the first
    /// occurrence at all).
    pub fn primary_component(&self) -> Option<&Component> {
        if self.body.is("VEVENT") || self.body.is("VTODO") {
            return Some(&self.body);
        }
        let mut occurrences = self
            .body
            .components
            .iter()
            .filter(|c| c.is("VEVENT") || c.is("VTODO"));
        let first = occurrences.clone().next();
        occurrences
            .find(|c| c.property("RECURRENCE-ID").is_none())
            .or(first)
    }

    pub fn due(&self) -> Option<ItemTime> {
        self.time_property("DUE")
    }

    pub fn completed(&self) -> Option<ItemTime> {
        self.time_property("COMPLETED")
    }

    /// Sort key of a task within its list.
    pub fn sort_key(&self) -> Option<i64> {
        self.primary_component()?
            .value("X-GOOGLE-SORTKEY")?
            .trim()
            .parse()
            .ok()
    }

    /// Id of the parent task, if this task is nested.
    pub fn parent_id(&self) -> Option<String> {
        self.primary_component()?
            .properties_named("RELATED-TO")
            .find(|p| {
                p.param("RELTYPE")
                    .is_none_or(|r| r.eq_ignore_ascii_case("PARENT"))
            })
            .map(|p| p.value.clone())
    }

    fn time_property(&self, name: &str) -> Option<ItemTime> {
        self.primary_component()?
            .property(name)
            .and_then(ItemTime::from_property)
    }
}

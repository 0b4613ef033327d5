//! Recent change events.
//!
//! Typed view of the `mediawiki/recentchange` schema carried by the
//! `recentchange` stream. Fields that only appear for some change types are
//! optional; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a recent change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Edit to an existing page.
    Edit,
    /// Page creation.
    New,
    /// Log action (block, delete, move, ...).
    Log,
    /// Category membership change.
    Categorize,
    /// Change imported from an external source (e.g. Wikidata).
    External,
    /// Any type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ChangeType {
    /// Returns the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::New => "new",
            Self::Log => "log",
            Self::Categorize => "categorize",
            Self::External => "external",
            Self::Unknown => "unknown",
        }
    }
}

/// Event envelope metadata shared by all EventStreams schemas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMeta {
    /// Unique URI identifying the event or entity.
    #[serde(default)]
    pub uri: Option<String>,
    /// Unique id of the request that caused the event.
    #[serde(default)]
    pub request_id: Option<String>,
    /// Unique id of this event.
    #[serde(default)]
    pub id: Option<String>,
    /// Event datetime, ISO-8601.
    #[serde(default)]
    pub dt: Option<String>,
    /// Domain the event pertains to.
    #[serde(default)]
    pub domain: Option<String>,
    /// Name of the stream the event belongs to.
    #[serde(default)]
    pub stream: Option<String>,
}

/// Old and new values of a changed quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OldNew {
    /// Value before the change.
    #[serde(default)]
    pub old: Option<u64>,
    /// Value after the change.
    #[serde(default)]
    pub new: Option<u64>,
}

/// One event from the `recentchange` stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentChange {
    /// Envelope metadata.
    #[serde(default)]
    pub meta: EventMeta,
    /// Recent changes id; absent for some external changes.
    #[serde(default)]
    pub id: Option<u64>,
    /// Change type.
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Namespace number of the affected page.
    pub namespace: i64,
    /// Full page title, with namespace prefix.
    pub title: String,
    /// Edit summary or log comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Comment rendered to HTML.
    #[serde(default)]
    pub parsedcomment: Option<String>,
    /// Unix timestamp of the change.
    pub timestamp: i64,
    /// Name of the acting user.
    pub user: String,
    /// Whether the user has the bot flag.
    pub bot: bool,
    /// Whether the edit was marked minor (edits only).
    #[serde(default)]
    pub minor: Option<bool>,
    /// Whether the change is patrolled (only where patrolling is enabled).
    #[serde(default)]
    pub patrolled: Option<bool>,
    /// Page length before and after (edits and creations).
    #[serde(default)]
    pub length: Option<OldNew>,
    /// Revision ids before and after (edits and creations).
    #[serde(default)]
    pub revision: Option<OldNew>,
    /// Canonical server URL.
    #[serde(default)]
    pub server_url: Option<String>,
    /// Server host name.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Script path on the server.
    #[serde(default)]
    pub server_script_path: Option<String>,
    /// Wiki database name, e.g. `enwiki`.
    pub wiki: String,
    /// Log id (log entries only).
    #[serde(default)]
    pub log_id: Option<u64>,
    /// Log type (log entries only).
    #[serde(default)]
    pub log_type: Option<String>,
    /// Log action (log entries only).
    #[serde(default)]
    pub log_action: Option<String>,
    /// Log parameters; shape depends on the log type.
    #[serde(default)]
    pub log_params: Option<Value>,
    /// Rendered log action text.
    #[serde(default)]
    pub log_action_comment: Option<String>,
}

impl RecentChange {
    /// Returns `true` for edits and page creations.
    pub fn is_edit_or_new(&self) -> bool {
        matches!(self.change_type, ChangeType::Edit | ChangeType::New)
    }

    /// Returns the size difference in bytes, when both lengths are known.
    pub fn size_delta(&self) -> Option<i64> {
        let length = self.length?;
        Some(length.new? as i64 - length.old.unwrap_or(0) as i64)
    }

    /// Returns the page URL, when the server URL is known.
    pub fn page_url(&self) -> Option<String> {
        let server = self.server_url.as_deref()?;
        Some(format!("{server}/wiki/{}", self.title.replace(' ', "_")))
    }
}

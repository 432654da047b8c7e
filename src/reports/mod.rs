/// Content report model and moderation workflow
///
/// Reports are created by members against a question or answer and then
/// driven through a one-step status machine by moderators. See
/// [`ReportLifecycle`] for the transitions and [`ReportFeed`] for live
/// snapshots.

pub mod feed;
pub mod lifecycle;

pub use feed::{ReportChange, ReportFeed, ReportSubscription};
pub use lifecycle::ReportLifecycle;

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of content a report points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Question,
    Answer,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Question => "question",
            ItemType::Answer => "answer",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "question" => Ok(ItemType::Question),
            "answer" => Ok(ItemType::Answer),
            _ => Err(AppError::Validation(format!("Invalid item type: {}", s))),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report reason types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportReason {
    Spam,
    Inappropriate,
    Harassment,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportReason::Spam => "spam",
            ReportReason::Inappropriate => "inappropriate",
            ReportReason::Harassment => "harassment",
            ReportReason::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "spam" => Ok(ReportReason::Spam),
            "inappropriate" => Ok(ReportReason::Inappropriate),
            "harassment" => Ok(ReportReason::Harassment),
            "other" => Ok(ReportReason::Other),
            _ => Err(AppError::Validation(format!("Invalid report reason: {}", s))),
        }
    }
}

/// Report status. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Resolved,
    Dismissed,
    Removed,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 4] = [
        ReportStatus::Pending,
        ReportStatus::Resolved,
        ReportStatus::Dismissed,
        ReportStatus::Removed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Dismissed => "dismissed",
            ReportStatus::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "resolved" => Ok(ReportStatus::Resolved),
            "dismissed" => Ok(ReportStatus::Dismissed),
            "removed" => Ok(ReportStatus::Removed),
            _ => Err(AppError::Validation(format!("Invalid report status: {}", s))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Pending)
    }

    /// Whether the state machine allows `self -> next`
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        *self == ReportStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing filter: every report, or one status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ReportStatus),
}

impl StatusFilter {
    /// Parse `all` or a status name
    pub fn parse(s: &str) -> AppResult<Self> {
        if s == "all" {
            Ok(StatusFilter::All)
        } else {
            ReportStatus::from_str(s).map(StatusFilter::Only)
        }
    }

    pub fn matches(&self, status: ReportStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

/// Coordinates of a question or answer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub item_type: ItemType,
    pub item_id: String,
}

impl ContentRef {
    pub fn question(id: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Question,
            item_id: id.into(),
        }
    }

    pub fn answer(id: impl Into<String>) -> Self {
        Self {
            item_type: ItemType::Answer,
            item_id: id.into(),
        }
    }
}

/// Report record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub reporter_id: String,
    pub reporter_name: Option<String>,
    pub reason: ReportReason,
    pub details: String,
    pub content_preview: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

impl Report {
    pub fn item(&self) -> ContentRef {
        ContentRef {
            item_type: self.item_type,
            item_id: self.item_id.clone(),
        }
    }
}

/// User-submitted report before validation
#[derive(Debug, Clone)]
pub struct ReportDraft {
    pub item: ContentRef,
    pub reason: Option<ReportReason>,
    pub details: String,
    pub content_preview: Option<String>,
}

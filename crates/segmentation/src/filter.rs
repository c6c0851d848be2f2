//! Segment filters — the declarative description of a campaign audience.
//!
//! On the wire a filter is a JSON object with a `type` discriminator and
//! type-specific fields:
//!
//! ```json
//! {"type": "all"}
//! {"type": "manual", "selectedUserIds": ["7f1c..."]}
//! {"type": "csv", "csvEmails": ["a@example.com"]}
//! {"type": "attribute", "attribute": "inactive", "days": 30}
//! ```
//!
//! Decoding goes through [`RawSegmentFilter`] and fails closed: a missing or
//! unknown `type`, or a missing field for the declared type, is rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::predicates::AttributePredicate;

/// Structural validation failure with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct InvalidFilter {
    reason: String,
}

impl InvalidFilter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSegmentFilter", into = "RawSegmentFilter")]
pub enum SegmentFilter {
    /// Every registered user.
    All,
    /// Explicit user ids, passed through as given.
    Manual { user_ids: Vec<Uuid> },
    /// Emails imported from a spreadsheet. They need not belong to
    /// registered users.
    Csv { emails: Vec<String> },
    Attribute(AttributePredicate),
}

impl SegmentFilter {
    /// Decode a filter from its JSON wire form.
    pub fn parse(value: &serde_json::Value) -> Result<Self, InvalidFilter> {
        Self::deserialize(value).map_err(|e| InvalidFilter::new(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Manual { .. } => "manual",
            Self::Csv { .. } => "csv",
            Self::Attribute(_) => "attribute",
        }
    }
}

/// Returns true when `value` decodes into a [`SegmentFilter`].
pub fn validate(value: &serde_json::Value) -> bool {
    SegmentFilter::parse(value).is_ok()
}

/// Loosely-typed wire record. Only the fields belonging to the declared
/// `type` are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSegmentFilter {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_user_ids: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_emails: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u32>,
}

impl TryFrom<RawSegmentFilter> for SegmentFilter {
    type Error = InvalidFilter;

    fn try_from(raw: RawSegmentFilter) -> Result<Self, Self::Error> {
        let kind = raw
            .kind
            .ok_or_else(|| InvalidFilter::new("segment filter is missing its `type`"))?;

        match kind.as_str() {
            "all" => Ok(Self::All),
            "manual" => raw
                .selected_user_ids
                .map(|user_ids| Self::Manual { user_ids })
                .ok_or_else(|| {
                    InvalidFilter::new("`manual` segment filter requires `selectedUserIds`")
                }),
            "csv" => raw
                .csv_emails
                .map(|emails| Self::Csv { emails })
                .ok_or_else(|| InvalidFilter::new("`csv` segment filter requires `csvEmails`")),
            "attribute" => {
                let name = raw.attribute.ok_or_else(|| {
                    InvalidFilter::new("`attribute` segment filter requires `attribute`")
                })?;
                AttributePredicate::from_parts(&name, raw.days).map(Self::Attribute)
            }
            other => Err(InvalidFilter::new(format!(
                "unknown segment filter type `{other}`"
            ))),
        }
    }
}

impl From<SegmentFilter> for RawSegmentFilter {
    fn from(filter: SegmentFilter) -> Self {
        let kind = Some(filter.kind().to_string());
        match filter {
            SegmentFilter::All => Self {
                kind,
                ..Self::default()
            },
            SegmentFilter::Manual { user_ids } => Self {
                kind,
                selected_user_ids: Some(user_ids),
                ..Self::default()
            },
            SegmentFilter::Csv { emails } => Self {
                kind,
                csv_emails: Some(emails),
                ..Self::default()
            },
            SegmentFilter::Attribute(predicate) => Self {
                kind,
                attribute: Some(predicate.name().to_string()),
                days: predicate.days(),
                ..Self::default()
            },
        }
    }
}

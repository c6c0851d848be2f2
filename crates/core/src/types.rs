//! Types shared between the segmentation, channel, and management crates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user selected to receive a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub user_id: Uuid,
    pub email: String,
}

impl Recipient {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

//! Audience store — the persistence seam the evaluator queries.

use async_trait::async_trait;
use campaign_core::Recipient;
use chrono::{DateTime, Utc};
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::predicates::AttributePredicate;

/// One read-only selection over user rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudienceQuery {
    All,
    Attribute(AttributePredicate),
    /// Users whose id is in the list.
    Ids(Vec<Uuid>),
    /// Users whose email matches one in the list, ignoring case.
    Emails(Vec<String>),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQL/storage error.
    #[error("storage error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("audience store unavailable: {0}")]
    Unavailable(String),
}

#[automock]
#[async_trait]
/// Read access to user and activity rows.
pub trait AudienceStore: Send + Sync {
    /// Number of users matching `query`, evaluated at `as_of`.
    async fn count(&self, query: &AudienceQuery, as_of: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Users matching `query`, ordered by email.
    async fn fetch(
        &self,
        query: &AudienceQuery,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Recipient>, StoreError>;
}

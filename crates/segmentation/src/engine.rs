//! Segment evaluator — validates filters and turns them into audience
//! counts or recipient lists.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use campaign_core::Recipient;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error};

use crate::csv_import::normalize_email;
use crate::filter::{InvalidFilter, SegmentFilter};
use crate::store::{AudienceQuery, AudienceStore, StoreError};

#[derive(Debug, Error)]
pub enum SegmentError {
    /// The filter is structurally invalid.
    #[error("invalid segment filter: {0}")]
    InvalidFilter(#[from] InvalidFilter),

    /// The audience store failed to answer.
    #[error("audience query failed: {0}")]
    QueryFailure(#[from] StoreError),
}

/// Evaluates segment filters against an [`AudienceStore`].
///
/// Stateless apart from the store handle; every call is a single read-only
/// query at most, so repeated calls over unchanged data agree.
#[derive(Clone)]
pub struct SegmentEvaluator {
    store: Arc<dyn AudienceStore>,
}

impl SegmentEvaluator {
    pub fn new(store: Arc<dyn AudienceStore>) -> Self {
        Self { store }
    }

    /// Returns true when `raw` is a structurally valid filter.
    pub fn validate(&self, raw: &serde_json::Value) -> bool {
        crate::filter::validate(raw)
    }

    /// Parse `raw` and count its audience.
    pub async fn preview(&self, raw: &serde_json::Value) -> Result<u64, SegmentError> {
        let filter = SegmentFilter::parse(raw)?;
        self.count(&filter).await
    }

    /// Audience size for a preview.
    ///
    /// `manual` and `csv` filters are counted from their lists as given,
    /// without touching the store: csv emails may exceed the registered users
    /// they resolve to. `all` and `attribute` filters run one count query.
    pub async fn count(&self, filter: &SegmentFilter) -> Result<u64, SegmentError> {
        self.count_as_of(filter, Utc::now()).await
    }

    pub async fn count_as_of(
        &self,
        filter: &SegmentFilter,
        as_of: DateTime<Utc>,
    ) -> Result<u64, SegmentError> {
        let count = match filter {
            SegmentFilter::Manual { user_ids } => user_ids.len() as u64,
            SegmentFilter::Csv { emails } => emails.len() as u64,
            SegmentFilter::All => self.store_count(&AudienceQuery::All, as_of).await?,
            SegmentFilter::Attribute(predicate) => {
                self.store_count(&AudienceQuery::Attribute(*predicate), as_of)
                    .await?
            }
        };

        debug!(kind = filter.kind(), count, "Counted segment");
        Ok(count)
    }

    /// Authoritative recipient list for a send.
    ///
    /// Only registered users are returned, each once, ordered by email.
    /// Unknown manual ids and csv emails without an account are dropped.
    pub async fn resolve(&self, filter: &SegmentFilter) -> Result<Vec<Recipient>, SegmentError> {
        self.resolve_as_of(filter, Utc::now()).await
    }

    pub async fn resolve_as_of(
        &self,
        filter: &SegmentFilter,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Recipient>, SegmentError> {
        let query = match filter {
            SegmentFilter::All => AudienceQuery::All,
            SegmentFilter::Attribute(predicate) => AudienceQuery::Attribute(*predicate),
            SegmentFilter::Manual { user_ids } => {
                let ids: BTreeSet<_> = user_ids.iter().copied().collect();
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                AudienceQuery::Ids(ids.into_iter().collect())
            }
            SegmentFilter::Csv { emails } => {
                let emails: BTreeSet<String> = emails
                    .iter()
                    .map(|e| normalize_email(e))
                    .filter(|e| !e.is_empty())
                    .collect();
                if emails.is_empty() {
                    return Ok(Vec::new());
                }
                AudienceQuery::Emails(emails.into_iter().collect())
            }
        };

        let recipients = self.store.fetch(&query, as_of).await.map_err(|e| {
            error!(error = %e, kind = filter.kind(), "Audience resolve failed");
            metrics::counter!("segments.query_failures").increment(1);
            SegmentError::QueryFailure(e)
        })?;

        let mut seen = HashSet::new();
        let mut recipients: Vec<Recipient> = recipients
            .into_iter()
            .filter(|r| seen.insert(r.user_id))
            .collect();
        recipients.sort_by(|a, b| a.email.cmp(&b.email).then(a.user_id.cmp(&b.user_id)));

        debug!(
            kind = filter.kind(),
            recipients = recipients.len(),
            "Resolved segment"
        );
        Ok(recipients)
    }

    async fn store_count(
        &self,
        query: &AudienceQuery,
        as_of: DateTime<Utc>,
    ) -> Result<u64, SegmentError> {
        self.store.count(query, as_of).await.map_err(|e| {
            error!(error = %e, ?query, "Audience count failed");
            metrics::counter!("segments.query_failures").increment(1);
            SegmentError::QueryFailure(e)
        })
    }
}

//! In-memory audience store backed by DashMap.
//!
//! Development and tests only; production reads the relational store
//! through [`crate::postgres::PgAudienceStore`].

use std::collections::HashSet;

use async_trait::async_trait;
use campaign_core::Recipient;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::csv_import::normalize_email;
use crate::predicates::AttributePredicate;
use crate::store::{AudienceQuery, AudienceStore, StoreError};

/// A user row joined with the activity summary the predicates need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudienceMember {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub onboarding_completed_at: Option<DateTime<Utc>>,
    pub last_transaction_at: Option<DateTime<Utc>>,
    pub asset_count: u32,
    pub liability_count: u32,
}

impl AudienceMember {
    pub fn new(email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            created_at,
            onboarding_completed_at: None,
            last_transaction_at: None,
            asset_count: 0,
            liability_count: 0,
        }
    }

    fn recipient(&self) -> Recipient {
        Recipient::new(self.id, self.email.clone())
    }

    fn satisfies(&self, predicate: &AttributePredicate, as_of: DateTime<Utc>) -> bool {
        let window_start = predicate.window_start(as_of);
        match predicate {
            AttributePredicate::Inactive { .. } => match (self.last_transaction_at, window_start) {
                (Some(last), Some(start)) => last < start,
                _ => true,
            },
            AttributePredicate::NewSignups { .. } => {
                window_start.is_some_and(|start| self.created_at >= start)
            }
            AttributePredicate::CompletedOnboarding => self.onboarding_completed_at.is_some(),
            AttributePredicate::IncompleteOnboarding => self.onboarding_completed_at.is_none(),
            AttributePredicate::NoAssets => self.asset_count == 0,
            AttributePredicate::HasLiabilities => self.liability_count > 0,
        }
    }
}

/// Thread-safe in-memory audience store.
pub struct InMemoryAudienceStore {
    members: DashMap<Uuid, AudienceMember>,
}

impl InMemoryAudienceStore {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
        }
    }

    /// Store seeded with a handful of demo users covering every predicate.
    pub fn with_demo_data() -> Self {
        info!("Audience store initialized (in-memory, development mode)");
        let store = Self::new();
        store.seed_demo_data();
        store
    }

    pub fn insert(&self, member: AudienceMember) {
        self.members.insert(member.id, member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn select(&self, query: &AudienceQuery, as_of: DateTime<Utc>) -> Vec<Recipient> {
        let mut selected: Vec<Recipient> = match query {
            AudienceQuery::All => self.members.iter().map(|m| m.recipient()).collect(),
            AudienceQuery::Attribute(predicate) => self
                .members
                .iter()
                .filter(|m| m.satisfies(predicate, as_of))
                .map(|m| m.recipient())
                .collect(),
            AudienceQuery::Ids(ids) => {
                let ids: HashSet<&Uuid> = ids.iter().collect();
                self.members
                    .iter()
                    .filter(|m| ids.contains(m.key()))
                    .map(|m| m.recipient())
                    .collect()
            }
            AudienceQuery::Emails(emails) => {
                let emails: HashSet<String> = emails.iter().map(|e| normalize_email(e)).collect();
                self.members
                    .iter()
                    .filter(|m| emails.contains(&normalize_email(&m.email)))
                    .map(|m| m.recipient())
                    .collect()
            }
        };
        selected.sort_by(|a, b| a.email.cmp(&b.email).then(a.user_id.cmp(&b.user_id)));
        selected
    }

    fn seed_demo_data(&self) {
        let now = Utc::now();

        let mut active = AudienceMember::new("maya.patel@example.com", now - Duration::days(400));
        active.onboarding_completed_at = Some(now - Duration::days(398));
        active.last_transaction_at = Some(now - Duration::days(2));
        active.asset_count = 4;
        active.liability_count = 1;
        self.insert(active);

        let mut lapsed = AudienceMember::new("tom.okafor@example.com", now - Duration::days(200));
        lapsed.onboarding_completed_at = Some(now - Duration::days(199));
        lapsed.last_transaction_at = Some(now - Duration::days(75));
        lapsed.asset_count = 2;
        self.insert(lapsed);

        let mut newcomer = AudienceMember::new("li.wei@example.com", now - Duration::days(3));
        newcomer.last_transaction_at = Some(now - Duration::days(1));
        self.insert(newcomer);

        let stalled = AudienceMember::new("sara.lind@example.com", now - Duration::days(45));
        self.insert(stalled);

        let mut indebted = AudienceMember::new("jon.reyes@example.com", now - Duration::days(90));
        indebted.onboarding_completed_at = Some(now - Duration::days(88));
        indebted.last_transaction_at = Some(now - Duration::days(10));
        indebted.liability_count = 3;
        self.insert(indebted);
    }
}

impl Default for InMemoryAudienceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudienceStore for InMemoryAudienceStore {
    async fn count(&self, query: &AudienceQuery, as_of: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.select(query, as_of).len() as u64)
    }

    async fn fetch(
        &self,
        query: &AudienceQuery,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Recipient>, StoreError> {
        Ok(self.select(query, as_of))
    }
}

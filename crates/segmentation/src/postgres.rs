//! PostgreSQL audience store.
//!
//! Reads the finance application's tables:
//!
//! - `users(id uuid, email text, created_at timestamptz, onboarding_completed_at timestamptz null)`
//! - `transactions(user_id uuid, occurred_at timestamptz)`
//! - `assets(user_id uuid)`
//! - `liabilities(user_id uuid)`
//!
//! Every query is a single read-only statement with all values bound.

use std::time::Duration;

use async_trait::async_trait;
use campaign_core::config::DatabaseConfig;
use campaign_core::Recipient;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::csv_import::normalize_email;
use crate::predicates::AttributePredicate;
use crate::store::{AudienceQuery, AudienceStore, StoreError};

const COUNT_USERS_SQL: &str = "SELECT COUNT(*) FROM users u";
const SELECT_USERS_SQL: &str = "SELECT u.id, u.email FROM users u";
const ORDER_BY_SQL: &str = " ORDER BY u.email, u.id";

#[derive(Debug, Clone)]
pub struct PgAudienceStore {
    pool: PgPool,
}

impl PgAudienceStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool for `url`.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .connect(url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Audience store connected to PostgreSQL"
        );

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl AudienceStore for PgAudienceStore {
    async fn count(&self, query: &AudienceQuery, as_of: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut builder = count_query(query, as_of);
        debug!(sql = builder.sql(), "Counting audience");

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn fetch(
        &self,
        query: &AudienceQuery,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<Recipient>, StoreError> {
        let mut builder = fetch_query(query, as_of);
        debug!(sql = builder.sql(), "Fetching audience");

        let rows = builder
            .build_query_as::<(Uuid, String)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(user_id, email)| Recipient::new(user_id, email))
            .collect())
    }
}

pub(crate) fn count_query(
    query: &AudienceQuery,
    as_of: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(COUNT_USERS_SQL);
    push_conditions(&mut builder, query, as_of);
    builder
}

pub(crate) fn fetch_query(
    query: &AudienceQuery,
    as_of: DateTime<Utc>,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_USERS_SQL);
    push_conditions(&mut builder, query, as_of);
    builder.push(ORDER_BY_SQL);
    builder
}

fn push_conditions(
    builder: &mut QueryBuilder<'static, Postgres>,
    query: &AudienceQuery,
    as_of: DateTime<Utc>,
) {
    match query {
        AudienceQuery::All => {}
        AudienceQuery::Ids(ids) => {
            builder.push(" WHERE u.id = ANY(");
            builder.push_bind(ids.clone());
            builder.push(")");
        }
        AudienceQuery::Emails(emails) => {
            let emails: Vec<String> = emails.iter().map(|e| normalize_email(e)).collect();
            builder.push(" WHERE lower(u.email) = ANY(");
            builder.push_bind(emails);
            builder.push(")");
        }
        AudienceQuery::Attribute(predicate) => push_predicate(builder, predicate, as_of),
    }
}

fn push_predicate(
    builder: &mut QueryBuilder<'static, Postgres>,
    predicate: &AttributePredicate,
    as_of: DateTime<Utc>,
) {
    let window_start = predicate.window_start(as_of).unwrap_or(as_of);
    match predicate {
        AttributePredicate::Inactive { .. } => {
            builder.push(
                " WHERE NOT EXISTS (SELECT 1 FROM transactions t \
                 WHERE t.user_id = u.id AND t.occurred_at >= ",
            );
            builder.push_bind(window_start);
            builder.push(")");
        }
        AttributePredicate::NewSignups { .. } => {
            builder.push(" WHERE u.created_at >= ");
            builder.push_bind(window_start);
        }
        AttributePredicate::CompletedOnboarding => {
            builder.push(" WHERE u.onboarding_completed_at IS NOT NULL");
        }
        AttributePredicate::IncompleteOnboarding => {
            builder.push(" WHERE u.onboarding_completed_at IS NULL");
        }
        AttributePredicate::NoAssets => {
            builder.push(" WHERE NOT EXISTS (SELECT 1 FROM assets a WHERE a.user_id = u.id)");
        }
        AttributePredicate::HasLiabilities => {
            builder.push(" WHERE EXISTS (SELECT 1 FROM liabilities l WHERE l.user_id = u.id)");
        }
    }
}

//! Campaign service — ties the campaign registry, the segment evaluator and
//! the email sender together behind the management API.

use std::sync::Arc;

use campaign_channels::EmailSender;
use campaign_core::Recipient;
use campaign_segmentation::predicates::{DEFAULT_INACTIVE_DAYS, DEFAULT_NEW_SIGNUP_DAYS};
use campaign_segmentation::{
    parse_email_csv, AttributePredicate, EmailImport, InvalidFilter, SegmentError,
    SegmentEvaluator, SegmentFilter,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::dispatch::dispatch;
use crate::error::{ManagementError, ManagementResult};
use crate::models::*;
use crate::store::CampaignStore;

pub struct CampaignService {
    store: Arc<CampaignStore>,
    evaluator: SegmentEvaluator,
    sender: Arc<dyn EmailSender>,
}

impl CampaignService {
    pub fn new(
        store: Arc<CampaignStore>,
        evaluator: SegmentEvaluator,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            store,
            evaluator,
            sender,
        }
    }

    pub fn store(&self) -> &CampaignStore {
        &self.store
    }

    // ─── Segments ──────────────────────────────────────────────────────────

    pub fn validate_filter(&self, raw: &serde_json::Value) -> ValidateResponse {
        match SegmentFilter::parse(raw) {
            Ok(_) => ValidateResponse {
                valid: true,
                reason: None,
            },
            Err(invalid) => ValidateResponse {
                valid: false,
                reason: Some(invalid.reason().to_string()),
            },
        }
    }

    pub async fn preview_filter(&self, raw: &serde_json::Value) -> ManagementResult<u64> {
        let count = self.evaluator.preview(raw).await?;
        metrics::counter!("segments.previews").increment(1);
        Ok(count)
    }

    pub async fn resolve_filter(&self, raw: &serde_json::Value) -> ManagementResult<Vec<Uuid>> {
        let filter = SegmentFilter::parse(raw).map_err(SegmentError::from)?;
        let recipients = self.evaluator.resolve(&filter).await?;
        Ok(recipients.into_iter().map(|r| r.user_id).collect())
    }

    pub fn import_csv(&self, body: &str) -> ManagementResult<EmailImport> {
        Ok(parse_email_csv(body)?)
    }

    /// Headline counts shown on the admin console dashboard.
    pub async fn audience_stats(&self) -> ManagementResult<AudienceStats> {
        let inactive = SegmentFilter::Attribute(AttributePredicate::Inactive {
            days: DEFAULT_INACTIVE_DAYS,
        });
        let new_signups = SegmentFilter::Attribute(AttributePredicate::NewSignups {
            days: DEFAULT_NEW_SIGNUP_DAYS,
        });
        let onboarded = SegmentFilter::Attribute(AttributePredicate::CompletedOnboarding);

        let (total_users, completed_onboarding, inactive_30_days, new_signups_7_days) = tokio::try_join!(
            self.evaluator.count(&SegmentFilter::All),
            self.evaluator.count(&onboarded),
            self.evaluator.count(&inactive),
            self.evaluator.count(&new_signups),
        )?;

        Ok(AudienceStats {
            total_users,
            completed_onboarding,
            inactive_30_days,
            new_signups_7_days,
        })
    }

    /// Round-trips the audience store; used by the readiness check.
    pub async fn check_audience_store(&self) -> bool {
        self.evaluator.count(&SegmentFilter::All).await.is_ok()
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    /// Validate and store a draft. The filter is stored in its canonical
    /// form, without fields that belong to other filter types.
    pub fn create_campaign(
        &self,
        mut req: CreateCampaignRequest,
        user: &str,
    ) -> ManagementResult<MarketingCampaign> {
        if req.name.trim().is_empty() {
            return Err(ManagementError::InvalidRequest("name must not be empty".into()));
        }
        if req.subject.trim().is_empty() {
            return Err(ManagementError::InvalidRequest("subject must not be empty".into()));
        }
        if req.segment_filter.is_null() {
            return Err(SegmentError::from(InvalidFilter::new(
                "campaign requires a `segmentFilter`",
            ))
            .into());
        }
        let filter = SegmentFilter::parse(&req.segment_filter)
            .map_err(SegmentError::from)?;
        req.segment_filter =
            serde_json::to_value(&filter).map_err(|e| ManagementError::Internal(e.to_string()))?;

        let campaign = self.store.create_campaign(req, user);
        metrics::counter!("campaigns.created").increment(1);
        info!(campaign_id = %campaign.id, kind = filter.kind(), "Campaign created");
        Ok(campaign)
    }

    pub fn get_campaign(&self, id: Uuid) -> ManagementResult<MarketingCampaign> {
        self.store
            .get_campaign(id)
            .ok_or(ManagementError::NotFound(id))
    }

    pub fn delete_campaign(&self, id: Uuid, user: &str) -> ManagementResult<()> {
        self.store.delete_campaign(id, user)
    }

    pub async fn preview_campaign(&self, id: Uuid, user: &str) -> ManagementResult<u64> {
        let campaign = self.get_campaign(id)?;
        let count = self.preview_filter(&campaign.segment_filter).await?;
        self.store.log_audit(
            user,
            AuditAction::Preview,
            "campaign",
            &id.to_string(),
            serde_json::json!({"userCount": count}),
        );
        Ok(count)
    }

    /// Resolve the campaign's audience and send to it once.
    ///
    /// The campaign leaves draft before resolving, so a concurrent or repeated
    /// send is rejected. The send itself runs on its own task: it settles to
    /// `sent` or `partially_sent` with a report even if the caller goes away.
    pub async fn send_campaign(&self, id: Uuid, user: &str) -> ManagementResult<SendReport> {
        let campaign = self.store.begin_send(id)?;
        let run = SendRun {
            store: self.store.clone(),
            evaluator: self.evaluator.clone(),
            sender: self.sender.clone(),
            user: user.to_string(),
        };

        tokio::spawn(run.execute(campaign)).await.map_err(|e| {
            error!(campaign_id = %id, error = %e, "Campaign send task failed");
            ManagementError::Internal(e.to_string())
        })?
    }

    pub fn campaign_report(&self, id: Uuid) -> ManagementResult<SendReport> {
        self.store
            .get_report(id)
            .ok_or(ManagementError::NotFound(id))
    }
}

/// Everything a detached send needs, owned.
struct SendRun {
    store: Arc<CampaignStore>,
    evaluator: SegmentEvaluator,
    sender: Arc<dyn EmailSender>,
    user: String,
}

impl SendRun {
    async fn execute(self, campaign: MarketingCampaign) -> ManagementResult<SendReport> {
        let id = campaign.id;

        // Nothing has been sent yet, so a failed resolve returns to draft.
        let recipients = match self.resolve(&campaign).await {
            Ok(recipients) => recipients,
            Err(e) => {
                warn!(campaign_id = %id, error = %e, "Campaign send aborted before dispatch");
                self.store.abort_send(id);
                return Err(e);
            }
        };

        info!(campaign_id = %id, recipients = recipients.len(), "Dispatching campaign");
        let report = dispatch(self.sender.as_ref(), &campaign, recipients).await;
        metrics::counter!("campaigns.sent").increment(1);
        self.store.finish_send(report.clone(), &self.user);
        Ok(report)
    }

    async fn resolve(&self, campaign: &MarketingCampaign) -> ManagementResult<Vec<Recipient>> {
        let filter = SegmentFilter::parse(&campaign.segment_filter)
            .map_err(SegmentError::from)?;
        Ok(self.evaluator.resolve(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use campaign_channels::{DeliveryError, DeliveryReceipt, MockEmailSender, OutboundEmail};
    use campaign_segmentation::{InMemoryAudienceStore, MockAudienceStore, StoreError};
    use serde_json::json;

    /// Accepts every message after a fixed delay.
    struct SlowSender(Duration);

    #[async_trait]
    impl EmailSender for SlowSender {
        async fn send(&self, _email: &OutboundEmail) -> Result<DeliveryReceipt, DeliveryError> {
            tokio::time::sleep(self.0).await;
            Ok(DeliveryReceipt {
                provider_message_id: "slow".into(),
            })
        }
    }

    fn accepting_sender() -> MockEmailSender {
        let mut sender = MockEmailSender::new();
        sender.expect_send().returning(|_| {
            Ok(DeliveryReceipt {
                provider_message_id: "ok".into(),
            })
        });
        sender
    }

    fn service_with(sender: MockEmailSender) -> CampaignService {
        let audience = Arc::new(InMemoryAudienceStore::with_demo_data());
        CampaignService::new(
            Arc::new(CampaignStore::new()),
            SegmentEvaluator::new(audience),
            Arc::new(sender),
        )
    }

    fn request(filter: serde_json::Value) -> CreateCampaignRequest {
        CreateCampaignRequest {
            name: "Onboarding reminder".into(),
            subject: "Finish setting up".into(),
            body: "<p>Two minutes left</p>".into(),
            segment_filter: filter,
        }
    }

    #[test]
    fn test_create_rejects_invalid_filter() {
        let service = service_with(MockEmailSender::new());
        let err = service
            .create_campaign(request(json!({"type": "manual"})), "admin")
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(service.store().list_campaigns().is_empty());
    }

    #[test]
    fn test_create_requires_filter() {
        let service = service_with(MockEmailSender::new());
        let err = service
            .create_campaign(request(serde_json::Value::Null), "admin")
            .unwrap_err();
        assert!(matches!(
            err,
            ManagementError::Segment(SegmentError::InvalidFilter(_))
        ));
        assert!(service.store().list_campaigns().is_empty());
    }

    #[test]
    fn test_create_stores_canonical_filter() {
        let service = service_with(MockEmailSender::new());
        let campaign = service
            .create_campaign(
                request(json!({
                    "type": "attribute",
                    "attribute": "inactive",
                    "selectedUserIds": [],
                    "campaign": "spring"
                })),
                "admin",
            )
            .unwrap();
        assert_eq!(
            campaign.segment_filter,
            json!({"type": "attribute", "attribute": "inactive", "days": 30})
        );
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let service = service_with(MockEmailSender::new());
        let mut req = request(json!({"type": "all"}));
        req.name = "  ".into();
        assert!(matches!(
            service.create_campaign(req, "admin"),
            Err(ManagementError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_reports_reason() {
        let service = service_with(MockEmailSender::new());
        assert!(service.validate_filter(&json!({"type": "all"})).valid);

        let invalid = service.validate_filter(&json!({"type": "unknown"}));
        assert!(!invalid.valid);
        assert!(invalid.reason.is_some());
    }

    #[tokio::test]
    async fn test_audience_stats_over_demo_data() {
        let service = service_with(MockEmailSender::new());
        let stats = service.audience_stats().await.unwrap();
        assert_eq!(
            stats,
            AudienceStats {
                total_users: 5,
                completed_onboarding: 3,
                inactive_30_days: 2,
                new_signups_7_days: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_send_reaches_every_resolved_recipient_once() {
        let mut sender = MockEmailSender::new();
        sender.expect_send().times(3).returning(|_| {
            Ok(DeliveryReceipt {
                provider_message_id: "ok".into(),
            })
        });
        let service = service_with(sender);
        let campaign = service
            .create_campaign(
                request(json!({"type": "attribute", "attribute": "completed_onboarding"})),
                "admin",
            )
            .unwrap();

        let report = service.send_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(
            service.get_campaign(campaign.id).unwrap().status,
            CampaignStatus::Sent
        );
        assert_eq!(service.campaign_report(campaign.id).unwrap().sent, 3);
    }

    #[tokio::test]
    async fn test_second_send_is_rejected() {
        let service = service_with(accepting_sender());
        let campaign = service
            .create_campaign(request(json!({"type": "all"})), "admin")
            .unwrap();

        service.send_campaign(campaign.id, "admin").await.unwrap();
        assert!(matches!(
            service.send_campaign(campaign.id, "admin").await,
            Err(ManagementError::AlreadySent { .. })
        ));
    }

    #[tokio::test]
    async fn test_csv_send_skips_unregistered_emails() {
        let service = service_with(accepting_sender());
        let campaign = service
            .create_campaign(
                request(json!({
                    "type": "csv",
                    "csvEmails": ["Maya.Patel@example.com", "nobody@example.com"]
                })),
                "admin",
            )
            .unwrap();

        assert_eq!(service.preview_campaign(campaign.id, "admin").await.unwrap(), 2);
        let report = service.send_campaign(campaign.id, "admin").await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.outcomes[0].email, "maya.patel@example.com");
    }

    #[tokio::test]
    async fn test_failed_resolve_returns_campaign_to_draft() {
        let mut audience = MockAudienceStore::new();
        audience
            .expect_fetch()
            .returning(|_, _| Err(StoreError::Unavailable("down".into())));
        let mut sender = MockEmailSender::new();
        sender.expect_send().never();

        let service = CampaignService::new(
            Arc::new(CampaignStore::new()),
            SegmentEvaluator::new(Arc::new(audience)),
            Arc::new(sender),
        );
        let campaign = service
            .create_campaign(request(json!({"type": "all"})), "admin")
            .unwrap();

        let err = service.send_campaign(campaign.id, "admin").await.unwrap_err();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            service.get_campaign(campaign.id).unwrap().status,
            CampaignStatus::Draft
        );
        assert!(service.campaign_report(campaign.id).is_err());
    }

    #[tokio::test]
    async fn test_preview_is_audited() {
        let service = service_with(MockEmailSender::new());
        let campaign = service
            .create_campaign(request(json!({"type": "all"})), "admin")
            .unwrap();
        service.preview_campaign(campaign.id, "admin").await.unwrap();

        let log = service.store().get_audit_log();
        assert!(log.iter().any(|e| e.action == AuditAction::Preview));
        assert!(log.iter().any(|e| e.action == AuditAction::Create));
    }

    #[tokio::test]
    async fn test_send_settles_after_caller_gives_up() {
        let audience = Arc::new(InMemoryAudienceStore::with_demo_data());
        let service = CampaignService::new(
            Arc::new(CampaignStore::new()),
            SegmentEvaluator::new(audience),
            Arc::new(SlowSender(Duration::from_millis(40))),
        );
        let campaign = service
            .create_campaign(request(json!({"type": "all"})), "admin")
            .unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(60),
            service.send_campaign(campaign.id, "admin"),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(
            service.get_campaign(campaign.id).unwrap().status,
            CampaignStatus::Sending
        );

        for _ in 0..100 {
            if service.get_campaign(campaign.id).unwrap().status != CampaignStatus::Sending {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(
            service.get_campaign(campaign.id).unwrap().status,
            CampaignStatus::Sent
        );
        let report = service.campaign_report(campaign.id).unwrap();
        assert_eq!(report.attempted, 5);
        assert_eq!(report.sent, 5);
    }
}
